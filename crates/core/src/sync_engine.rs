//! Git -> ClearCase synchronization engine.
//!
//! The [`SyncEngine`] mirrors one accepted push into the view as a single
//! transaction:
//!
//! 1. Prepare: check out modified files and create missing directories.
//! 2. Remove: drop deleted names, directories before their contents.
//! 3. Stage: pull the pushed content into the view.
//! 4. Materialize: turn added files into elements.
//! 5. Commit: check in files, then the directories opened on the way.
//!
//! Any failure cancels every checkout the transaction opened, then sweeps
//! the view for leftovers. A label that cannot be attached does not undo
//! versions already checked in: the transaction finishes and is reported
//! as unlabelled. Either way the error carries the [`SyncReport`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::clearcase::{CheckoutLedger, CleanupReport, ClearCase};
use crate::comment::CommentFormatter;
use crate::config::BridgeConfig;
use crate::deletion::DeletionSequencer;
use crate::errors::{ClearCaseError, GitError, SyncError};
use crate::git::{GitClient, ViewPuller};
use crate::labels;
use crate::models::{structural_cmp, ChangeEntry, ChangeStatus, CommitMetadata, PushRef, Revision};
use crate::path_policy::PathPolicy;
use crate::process::CommandRunner;

// ---------------------------------------------------------------------------
// Seams
// ---------------------------------------------------------------------------

/// Supplies the deletion list of a push, directories included.
pub trait DeletionSource {
    fn list_deletions(&self, old: &Revision, new: &Revision) -> Result<Vec<String>, GitError>;
}

impl DeletionSource for GitClient {
    fn list_deletions(&self, old: &Revision, new: &Revision) -> Result<Vec<String>, GitError> {
        GitClient::list_deletions(self, old, new)
    }
}

impl DeletionSource for Vec<String> {
    fn list_deletions(&self, _old: &Revision, _new: &Revision) -> Result<Vec<String>, GitError> {
        Ok(self.clone())
    }
}

/// Writes the pushed file content into the view's working tree.
#[async_trait]
pub trait ContentStager: Send + Sync {
    async fn stage(&self, view: &Path) -> Result<(), GitError>;
}

#[async_trait]
impl<R: CommandRunner> ContentStager for ViewPuller<R> {
    async fn stage(&self, view: &Path) -> Result<(), GitError> {
        self.pull(view).await
    }
}

// ---------------------------------------------------------------------------
// Request and report
// ---------------------------------------------------------------------------

/// One accepted ref update, with everything the engine needs from Git.
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub push_ref: PushRef,
    pub old: Revision,
    pub new: Revision,
    pub metadata: CommitMetadata,
    pub changes: Vec<ChangeEntry>,
}

/// Final state of a transaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionOutcome {
    Committed,
    /// Every version is in, but some lack a label.
    Unlabelled,
    RolledBack,
}

impl std::fmt::Display for TransactionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Committed => write!(f, "committed"),
            Self::Unlabelled => write!(f, "unlabelled"),
            Self::RolledBack => write!(f, "rolled_back"),
        }
    }
}

/// Summary of one transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub transaction_id: Uuid,
    pub branch: String,
    pub old: String,
    pub new: String,
    pub labels: Vec<String>,
    pub modified: Vec<String>,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub ignored: Vec<String>,
    /// Checked-in versions missing at least one label.
    pub unlabelled: Vec<PathBuf>,
    pub outcome: TransactionOutcome,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SyncReport {
    fn new(request: &SyncRequest, labels: Vec<String>) -> Self {
        Self {
            transaction_id: Uuid::new_v4(),
            branch: request.push_ref.name.clone(),
            old: request.old.to_string(),
            new: request.new.to_string(),
            labels,
            modified: Vec::new(),
            added: Vec::new(),
            removed: Vec::new(),
            ignored: Vec::new(),
            unlabelled: Vec::new(),
            // until the commit phase says otherwise
            outcome: TransactionOutcome::RolledBack,
            started_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// Checkouts held by one transaction: files opened for modification and
/// directories opened as a side effect of structural changes.
struct SyncTransaction {
    edits: CheckoutLedger,
    structure: CheckoutLedger,
}

impl SyncTransaction {
    fn new() -> Self {
        Self {
            edits: CheckoutLedger::new("edits"),
            structure: CheckoutLedger::new("structure"),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct SyncEngine<R> {
    cc: ClearCase<R>,
    paths: PathPolicy,
    comments: CommentFormatter,
}

impl<R: CommandRunner> SyncEngine<R> {
    pub fn new(cc: ClearCase<R>, paths: PathPolicy, comments: CommentFormatter) -> Self {
        Self {
            cc,
            paths,
            comments,
        }
    }

    pub fn from_config(runner: R, config: &BridgeConfig) -> Self {
        info!(view = %config.view.path.display(), "initializing sync engine");
        Self::new(
            ClearCase::from_config(runner, config),
            PathPolicy::from(&config.sync),
            CommentFormatter::new(&config.comments),
        )
    }

    pub fn clearcase(&self) -> &ClearCase<R> {
        &self.cc
    }

    /// Mirror `request` into the view.
    #[instrument(skip_all, fields(branch = %request.push_ref.name, old = request.old.short(), new = request.new.short()))]
    pub async fn run<D, S>(
        &self,
        request: &SyncRequest,
        deletions: &D,
        stager: &S,
    ) -> Result<SyncReport, SyncError>
    where
        D: DeletionSource + ?Sized,
        S: ContentStager + ?Sized,
    {
        let scan = labels::extract(&request.metadata.comments);
        let mut report = SyncReport::new(request, scan.labels());
        let comment = self
            .comments
            .checkout_comment(&request.metadata.committer, &scan.stripped_comments);
        info!(
            txn = %report.transaction_id,
            files = request.changes.len(),
            labels = ?report.labels,
            "starting ClearCase transaction"
        );

        let mut txn = SyncTransaction::new();
        let result = self
            .apply(request, &comment, &mut txn, &mut report, deletions, stager)
            .await;

        report.completed_at = Some(Utc::now());
        match result {
            Ok(()) if report.unlabelled.is_empty() => {
                report.outcome = TransactionOutcome::Committed;
                info!(
                    txn = %report.transaction_id,
                    modified = report.modified.len(),
                    added = report.added.len(),
                    removed = report.removed.len(),
                    "transaction committed"
                );
                Ok(report)
            }
            Ok(()) => {
                report.outcome = TransactionOutcome::Unlabelled;
                error!(
                    txn = %report.transaction_id,
                    unlabelled = report.unlabelled.len(),
                    labels = ?report.labels,
                    "transaction committed without every label"
                );
                let cause = ClearCaseError::Incomplete {
                    operation: ClearCaseError::LABEL,
                    failed: report.unlabelled.clone(),
                };
                Err(SyncError::Transaction {
                    report: Box::new(report),
                    source: Box::new(cause.into()),
                })
            }
            Err(e) => {
                error!(txn = %report.transaction_id, error = %e, "transaction failed, rolling back");
                let cleanup = self.rollback(&mut txn).await;
                if !cleanup.is_clean() {
                    warn!(remaining = cleanup.failed.len(), "rollback left checkouts open");
                }
                Err(SyncError::Transaction {
                    report: Box::new(report),
                    source: Box::new(e),
                })
            }
        }
    }

    async fn apply<D, S>(
        &self,
        request: &SyncRequest,
        comment: &str,
        txn: &mut SyncTransaction,
        report: &mut SyncReport,
        deletions: &D,
        stager: &S,
    ) -> Result<(), SyncError>
    where
        D: DeletionSource + ?Sized,
        S: ContentStager + ?Sized,
    {
        let mut entries = request.changes.clone();
        entries.sort_by(|a, b| structural_cmp(&a.path, &b.path));

        // Prepare
        let mut added: Vec<(String, PathBuf)> = Vec::new();
        let mut saw_deletion = false;
        for entry in &entries {
            if let Some(pattern) = self.paths.ignored_by(&entry.path) {
                info!(path = %entry.path, pattern, "not mirroring ignored path");
                report.ignored.push(entry.path.clone());
                continue;
            }
            let full = self.cc.resolve(&entry.path);
            match entry.status {
                ChangeStatus::Modified => {
                    self.cc.checkout(&full, comment, false).await?;
                    txn.edits.record(&full);
                    report.modified.push(entry.path.clone());
                }
                ChangeStatus::Added => {
                    if let Some(parent) = full.parent() {
                        self.cc.create_path(parent).await?;
                    }
                    added.push((entry.path.clone(), full));
                }
                ChangeStatus::Deleted => saw_deletion = true,
            }
        }

        // Remove
        if saw_deletion {
            let list = deletions.list_deletions(&request.old, &request.new)?;
            debug!(count = list.len(), "deletion list");
            let sequencer = DeletionSequencer::new(&self.cc, &self.paths);
            let removal = sequencer.apply(&list, &mut txn.structure).await?;
            report.removed = removal.removed;
        }

        // Stage
        stager.stage(self.cc.view()).await?;

        // Materialize
        for (rel, full) in &added {
            match self
                .cc
                .create_file(full, &report.labels, &mut txn.structure)
                .await
            {
                Ok(()) => {}
                Err(e) if e.is_label_failure() => report.unlabelled.push(full.clone()),
                Err(e) => return Err(e.into()),
            }
            report.added.push(rel.clone());
        }

        // Commit: files first, then the directories holding them
        for ledger in [&mut txn.edits, &mut txn.structure] {
            match ledger.commit(&self.cc, &report.labels).await {
                Ok(_) => {}
                Err(ClearCaseError::Incomplete { operation, failed })
                    if operation == ClearCaseError::LABEL =>
                {
                    report.unlabelled.extend(failed)
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn rollback(&self, txn: &mut SyncTransaction) -> CleanupReport {
        let mut cleanup = txn.edits.rollback(&self.cc).await;
        cleanup.merge(txn.structure.rollback(&self.cc).await);
        match self.cc.uncheckout_all().await {
            Ok(sweep) => cleanup.merge(sweep),
            Err(e) => warn!(error = %e, "view checkout sweep failed"),
        }
        info!(
            cancelled = cleanup.cancelled.len(),
            failed = cleanup.failed.len(),
            "rollback finished"
        );
        cleanup
    }

    /// Read-only check that ClearCase would accept `request`.
    ///
    /// Every problem is collected before the push is rejected.
    #[instrument(skip_all, fields(branch = %request.push_ref.name, new = request.new.short()))]
    pub async fn preflight(&self, request: &SyncRequest) -> Result<(), SyncError> {
        let mut entries = request.changes.clone();
        entries.sort_by(|a, b| structural_cmp(&a.path, &b.path));

        let mut problems = Vec::new();
        for entry in &entries {
            if self.paths.is_ignored(&entry.path) {
                continue;
            }
            let full = self.cc.resolve(&entry.path);
            match entry.status {
                ChangeStatus::Modified => {
                    if !self.cc.is_versioned(&full).await? {
                        problems.push(format!("{}: not under ClearCase control", entry.path));
                    } else if self.cc.is_checked_out(&full).await? {
                        problems.push(format!("{}: already checked out", entry.path));
                    } else if self.cc.needs_merge(&full).await? {
                        problems.push(format!("{}: needs a merge in ClearCase", entry.path));
                    }
                }
                ChangeStatus::Added => {
                    if self.cc.is_versioned(&full).await? {
                        problems.push(format!("{}: already an element", entry.path));
                    }
                }
                ChangeStatus::Deleted => {}
            }
        }

        if problems.is_empty() {
            info!(files = entries.len(), "preflight passed");
            Ok(())
        } else {
            for problem in &problems {
                warn!(%problem, "preflight rejected path");
            }
            Err(SyncError::PreflightRejected(problems))
        }
    }
}
