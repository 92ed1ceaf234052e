//! Ignore-list enforcement for pushed paths.
//!
//! Some repository files (`.gitignore` at minimum) must never get a ClearCase
//! version. [`PathPolicy`] matches repository-relative paths against the
//! configured glob patterns before any ClearCase operation is dispatched.

use tracing::debug;

use crate::config::SyncConfig;

/// Evaluates repository-relative paths against ignore patterns.
#[derive(Debug, Clone, Default)]
pub struct PathPolicy {
    ignore_patterns: Vec<String>,
}

impl PathPolicy {
    pub fn new(ignore_patterns: Vec<String>) -> Self {
        Self { ignore_patterns }
    }

    /// The pattern that excludes `rel_path`, if any.
    pub fn ignored_by(&self, rel_path: &str) -> Option<&str> {
        let path = rel_path.replace('\\', "/");
        let path = path.trim_start_matches('/');
        for pattern in &self.ignore_patterns {
            let pat = pattern.replace('\\', "/");
            if glob_match::glob_match(&pat, path) {
                debug!(path, pattern = pattern.as_str(), "path matches ignore pattern");
                return Some(pattern.as_str());
            }
        }
        None
    }

    pub fn is_ignored(&self, rel_path: &str) -> bool {
        self.ignored_by(rel_path).is_some()
    }
}

impl From<&SyncConfig> for PathPolicy {
    fn from(config: &SyncConfig) -> Self {
        Self::new(config.ignore_patterns.clone())
    }
}
