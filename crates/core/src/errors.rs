//! Error types for the git2cc core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use std::path::PathBuf;

use thiserror::Error;

use crate::sync_engine::SyncReport;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    ClearCase(#[from] ClearCaseError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// ClearCase errors
// ---------------------------------------------------------------------------

/// Errors from `cleartool` operations against the view.
#[derive(Debug, Error)]
pub enum ClearCaseError {
    /// The path is not an element known to ClearCase.
    #[error("'{}' is not under ClearCase version control", .0.display())]
    NotVersioned(PathBuf),

    /// The path already has an open checkout in the view.
    #[error("'{}' is already checked out", .0.display())]
    AlreadyCheckedOut(PathBuf),

    /// The selected version is behind LATEST on its branch; checking out now
    /// would branch away from unmerged work.
    #[error("'{}' needs a merge: selected {selected}, latest {latest}", .path.display())]
    MergeRequired {
        path: PathBuf,
        selected: String,
        latest: String,
    },

    /// Checkin requested on a path that is not checked out.
    #[error("'{}' is not checked out", .0.display())]
    NotCheckedOut(PathBuf),

    /// A directory cannot be created under an unversioned parent.
    #[error("parent directory '{}' is not under ClearCase version control", .0.display())]
    ParentNotVersioned(PathBuf),

    /// The path does not exist in the view.
    #[error("'{}' does not exist in the view", .0.display())]
    NotFound(PathBuf),

    /// The path lies outside the configured view root.
    #[error("'{}' is outside the view", .0.display())]
    OutsideView(PathBuf),

    /// A `cleartool` command exited with a non-zero status.
    #[error("cleartool {command} failed (exit {exit_code}): {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    /// The `cleartool` binary could not be started.
    #[error("cleartool binary not found: {0}")]
    BinaryNotFound(String),

    /// A bulk operation finished with some paths still pending.
    #[error("{operation} incomplete for {} path(s): {}", .failed.len(), display_paths(.failed))]
    Incomplete {
        operation: &'static str,
        failed: Vec<PathBuf>,
    },

    /// Generic I/O wrapper (staging files, renames).
    #[error("ClearCase I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ClearCaseError {
    /// `Incomplete` operation name for checkins that did not go through.
    pub const CHECKIN: &'static str = "checkin";
    /// `Incomplete` operation name for versions checked in without every label.
    pub const LABEL: &'static str = "label";

    /// `true` when the new versions exist and only labelling failed.
    pub fn is_label_failure(&self) -> bool {
        matches!(self, Self::Incomplete { operation, .. } if *operation == Self::LABEL)
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Git errors
// ---------------------------------------------------------------------------

/// Errors from the Git side (git2 queries and the `git` CLI).
#[derive(Debug, Error)]
pub enum GitError {
    /// The repository path does not exist or is not a git repo.
    #[error("git repository not found at '{0}'")]
    RepositoryNotFound(String),

    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),

    /// A revision could not be resolved.
    #[error("git revision not found: {0}")]
    RefNotFound(String),

    /// A range query was anchored at the null revision.
    #[error("revision range anchored at the null revision ({0})")]
    NullRevisionRange(String),

    /// The diff contains a change kind the bridge cannot mirror.
    #[error("unsupported change status '{status}' for '{path}'")]
    UnsupportedStatus { status: String, path: String },

    /// `git pull` into the view failed.
    #[error("git pull into '{path}' failed (exit {exit_code}): {stderr}")]
    PullFailed {
        path: String,
        exit_code: i32,
        stderr: String,
    },

    /// Generic I/O wrapper.
    #[error("git I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Sync engine errors
// ---------------------------------------------------------------------------

/// Errors from the synchronization engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The hook received a ref name it cannot interpret.
    #[error("invalid ref name '{0}'")]
    InvalidRef(String),

    /// The update hook found paths ClearCase would refuse.
    #[error("push rejected by ClearCase preflight: {}", .0.join("; "))]
    PreflightRejected(Vec<String>),

    /// Underlying ClearCase error during sync.
    #[error("sync ClearCase error: {0}")]
    ClearCaseError(#[from] ClearCaseError),

    /// Underlying Git error during sync.
    #[error("sync Git error: {0}")]
    GitError(#[from] GitError),

    /// A transaction did not commit cleanly. The report says how far it got.
    #[error("transaction {} {}: {source}", .report.transaction_id, .report.outcome)]
    Transaction {
        report: Box<SyncReport>,
        source: Box<SyncError>,
    },
}

impl SyncError {
    /// The error that ended the transaction, without the report wrapper.
    pub fn cause(&self) -> &SyncError {
        match self {
            Self::Transaction { source, .. } => source.cause(),
            other => other,
        }
    }

    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            Self::Transaction { report, .. } => Some(report.as_ref()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
