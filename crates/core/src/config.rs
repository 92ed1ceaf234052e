//! TOML-based configuration for the git2cc bridge.
//!
//! The configuration is loaded once by the hook binary and passed by
//! reference into every component; nothing reads it from global state.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level bridge configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// ClearCase view the pushes are mirrored into.
    pub view: ViewConfig,

    /// How to invoke `cleartool`.
    #[serde(default)]
    pub cleartool: ClearToolConfig,

    /// Git-side policy settings.
    pub git: GitConfig,

    /// Path filtering.
    #[serde(default)]
    pub sync: SyncConfig,

    /// ClearCase comment templates.
    #[serde(default)]
    pub comments: CommentConfig,

    /// Logging destinations.
    #[serde(default)]
    pub log: LogConfig,
}

// ---------------------------------------------------------------------------
// View
// ---------------------------------------------------------------------------

/// ClearCase view settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Root of the view working tree (also holds the Git clone used for pulls).
    pub path: PathBuf,

    /// Integration branch new elements are created on (default `main`).
    #[serde(default = "default_main_branch")]
    pub main_branch: String,
}

fn default_main_branch() -> String {
    "main".into()
}

// ---------------------------------------------------------------------------
// cleartool
// ---------------------------------------------------------------------------

/// `cleartool` invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearToolConfig {
    /// Path to the `cleartool` executable. A bare name is looked up on `$PATH`.
    #[serde(default = "default_cleartool")]
    pub path: PathBuf,
}

fn default_cleartool() -> PathBuf {
    PathBuf::from("cleartool")
}

impl Default for ClearToolConfig {
    fn default() -> Self {
        Self {
            path: default_cleartool(),
        }
    }
}

// ---------------------------------------------------------------------------
// Git
// ---------------------------------------------------------------------------

/// Git-side settings used by the sync policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Branches mirrored into ClearCase (default `["master"]`).
    #[serde(default = "default_sync_branches")]
    pub sync_branches: Vec<String>,

    /// Committer name used by pushes that originate from ClearCase. Pushes
    /// committed by this identity are never mirrored back.
    pub mirror_user: String,
}

fn default_sync_branches() -> Vec<String> {
    vec!["master".into()]
}

// ---------------------------------------------------------------------------
// Sync behaviour
// ---------------------------------------------------------------------------

/// Sync behaviour configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Glob patterns (relative to the repository root) that never get a
    /// ClearCase version.
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,
}

fn default_ignore_patterns() -> Vec<String> {
    vec![".gitignore".into(), "**/.gitignore".into()]
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ignore_patterns: default_ignore_patterns(),
        }
    }
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

/// Comment templates passed to `cleartool`.
///
/// `checkout` supports the `{committer}` and `{comments}` placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentConfig {
    #[serde(default = "default_checkout_comment")]
    pub checkout: String,

    #[serde(default = "default_new_directory_comment")]
    pub new_directory: String,

    #[serde(default = "default_directory_change_comment")]
    pub directory_change: String,

    #[serde(default = "default_new_file_comment")]
    pub new_file: String,
}

fn default_checkout_comment() -> String {
    "{committer} (git push):\n{comments}".into()
}
fn default_new_directory_comment() -> String {
    "Directory created from git push".into()
}
fn default_directory_change_comment() -> String {
    "Directory modified from git push".into()
}
fn default_new_file_comment() -> String {
    "File added from git push".into()
}

impl Default for CommentConfig {
    fn default() -> Self {
        Self {
            checkout: default_checkout_comment(),
            new_directory: default_new_directory_comment(),
            directory_change: default_directory_change_comment(),
            new_file: default_new_file_comment(),
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Minimum level written to stderr: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Optional log file receiving debug-level output (rotated daily).
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl BridgeConfig {
    /// Load a [`BridgeConfig`] from a TOML file at the given path.
    ///
    /// This does **not** validate filesystem references -- call
    /// [`validate`](Self::validate) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: BridgeConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Validate that all required fields are present and point at real things.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.view.path.is_dir() {
            return Err(ConfigError::InvalidValue {
                field: "view.path".into(),
                detail: format!("'{}' is not a directory", self.view.path.display()),
            });
        }
        if self.view.main_branch.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "view.main_branch".into(),
                detail: "main branch must not be empty".into(),
            });
        }
        // Only explicit paths are checked; bare names resolve through $PATH.
        if self.cleartool.path.components().count() > 1 && !self.cleartool.path.is_file() {
            return Err(ConfigError::InvalidValue {
                field: "cleartool.path".into(),
                detail: format!("'{}' does not exist", self.cleartool.path.display()),
            });
        }
        if self.git.mirror_user.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "git.mirror_user".into(),
                detail: "mirror user must not be empty".into(),
            });
        }
        if self.git.sync_branches.iter().any(|b| b.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "git.sync_branches".into(),
                detail: "branch names must not be empty".into(),
            });
        }

        Ok(())
    }

    /// Convenience: load and validate in one call.
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml(view: &Path) -> String {
        format!(
            r#"
[view]
path = "{}"
main_branch = "main"

[cleartool]
path = "cleartool"

[git]
sync_branches = ["master", "release/1.0"]
mirror_user = "ccpusher"

[sync]
ignore_patterns = ["**/.gitignore", "build/**"]

[comments]
checkout = "{{committer}}: {{comments}}"

[log]
level = "debug"
file = "/tmp/git2cc.log"
"#,
            view.display()
        )
    }

    #[test]
    fn test_parse_full_config() {
        let dir = tempfile::tempdir().unwrap();
        let config: BridgeConfig = toml::from_str(&sample_toml(dir.path())).unwrap();
        assert_eq!(config.view.path, dir.path());
        assert_eq!(config.git.sync_branches, vec!["master", "release/1.0"]);
        assert_eq!(config.git.mirror_user, "ccpusher");
        assert_eq!(config.sync.ignore_patterns.len(), 2);
        assert_eq!(config.comments.checkout, "{committer}: {comments}");
        assert_eq!(config.comments.new_file, "File added from git push");
        assert_eq!(config.log.file, Some(PathBuf::from("/tmp/git2cc.log")));
        config.validate().unwrap();
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml(dir.path()).as_bytes()).unwrap();

        let config = BridgeConfig::load_and_validate(&path).unwrap();
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_file_not_found() {
        let result = BridgeConfig::load_from_file("/nonexistent/bridge.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.toml");
        std::fs::write(&path, "[view\npath=").unwrap();
        let result = BridgeConfig::load_from_file(&path);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_defaults() {
        let minimal = r#"
[view]
path = "/view/bridge"
[git]
mirror_user = "ccpusher"
"#;
        let config: BridgeConfig = toml::from_str(minimal).unwrap();
        assert_eq!(config.view.main_branch, "main");
        assert_eq!(config.cleartool.path, PathBuf::from("cleartool"));
        assert_eq!(config.git.sync_branches, vec!["master"]);
        assert_eq!(
            config.sync.ignore_patterns,
            vec![".gitignore", "**/.gitignore"]
        );
        assert_eq!(config.log.level, "info");
        assert!(config.log.file.is_none());
    }

    #[test]
    fn test_validate_rejects_missing_view() {
        let dir = tempfile::tempdir().unwrap();
        let mut config: BridgeConfig = toml::from_str(&sample_toml(dir.path())).unwrap();
        config.view.path = dir.path().join("missing");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "view.path"
        ));
    }

    #[test]
    fn test_validate_rejects_missing_cleartool_binary() {
        let dir = tempfile::tempdir().unwrap();
        let mut config: BridgeConfig = toml::from_str(&sample_toml(dir.path())).unwrap();
        config.cleartool.path = dir.path().join("bin/cleartool");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "cleartool.path"
        ));
    }

    #[test]
    fn test_validate_rejects_empty_mirror_user() {
        let dir = tempfile::tempdir().unwrap();
        let mut config: BridgeConfig = toml::from_str(&sample_toml(dir.path())).unwrap();
        config.git.mirror_user = "  ".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "git.mirror_user"
        ));
    }
}
