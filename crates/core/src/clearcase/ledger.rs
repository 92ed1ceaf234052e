//! Transaction-scoped record of open checkouts.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::client::ClearCase;
use crate::errors::ClearCaseError;
use crate::process::CommandRunner;

/// Outcome of a best-effort cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub cancelled: Vec<PathBuf>,
    /// Paths still checked out, with the error that kept them open.
    pub failed: Vec<(PathBuf, String)>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn merge(&mut self, other: CleanupReport) {
        self.cancelled.extend(other.cancelled);
        self.failed.extend(other.failed);
    }
}

/// Ordered, duplicate-free list of checkouts opened by one transaction.
#[derive(Debug, Default)]
pub struct CheckoutLedger {
    name: &'static str,
    entries: Vec<PathBuf>,
}

impl CheckoutLedger {
    /// `name` only appears in log lines.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Vec::new(),
        }
    }

    /// Returns `false` when the path was already recorded.
    pub fn record(&mut self, path: &Path) -> bool {
        if self.contains(path) {
            return false;
        }
        self.entries.push(path.to_path_buf());
        true
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.iter().any(|p| p == path)
    }

    pub fn forget(&mut self, path: &Path) -> bool {
        let before = self.entries.len();
        self.entries.retain(|p| p != path);
        self.entries.len() != before
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check in every entry in recorded order.
    ///
    /// Failures do not stop the loop. Entries whose checkin went through are
    /// drained, labelled or not; the rest stay recorded for rollback. Failed
    /// checkins are reported as [`ClearCaseError::Incomplete`] `checkin`;
    /// with none, missing labels are reported as `label`.
    pub async fn commit<R: CommandRunner>(
        &mut self,
        cc: &ClearCase<R>,
        labels: &[String],
    ) -> Result<usize, ClearCaseError> {
        let mut committed = 0;
        let mut failed = Vec::new();
        let mut unlabelled = Vec::new();
        for path in std::mem::take(&mut self.entries) {
            match cc.checkin(&path, labels).await {
                Ok(()) => committed += 1,
                Err(e) if e.is_label_failure() => {
                    committed += 1;
                    unlabelled.push(path);
                }
                Err(e) => {
                    warn!(ledger = self.name, path = %path.display(), error = %e, "checkin failed");
                    failed.push(path);
                }
            }
        }
        info!(
            ledger = self.name,
            committed,
            failed = failed.len(),
            unlabelled = unlabelled.len(),
            "ledger committed"
        );
        if !failed.is_empty() {
            self.entries = failed.clone();
            return Err(ClearCaseError::Incomplete {
                operation: ClearCaseError::CHECKIN,
                failed,
            });
        }
        if !unlabelled.is_empty() {
            return Err(ClearCaseError::Incomplete {
                operation: ClearCaseError::LABEL,
                failed: unlabelled,
            });
        }
        Ok(committed)
    }

    /// Cancel every entry, newest first. Never fails; the ledger ends empty.
    pub async fn rollback<R: CommandRunner>(&mut self, cc: &ClearCase<R>) -> CleanupReport {
        let mut report = CleanupReport::default();
        while let Some(path) = self.entries.pop() {
            match cc.uncheckout(&path).await {
                Ok(()) => report.cancelled.push(path),
                Err(e) => {
                    warn!(ledger = self.name, path = %path.display(), error = %e, "rollback uncheckout failed");
                    report.failed.push((path, e.to_string()));
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_is_duplicate_free() {
        let mut ledger = CheckoutLedger::new("edits");
        assert!(ledger.record(Path::new("/view/a")));
        assert!(ledger.record(Path::new("/view/b")));
        assert!(!ledger.record(Path::new("/view/a")));
        assert_eq!(
            ledger.paths(),
            &[PathBuf::from("/view/a"), PathBuf::from("/view/b")]
        );
    }

    #[test]
    fn test_forget() {
        let mut ledger = CheckoutLedger::new("structure");
        ledger.record(Path::new("/view/dir"));
        assert!(ledger.forget(Path::new("/view/dir")));
        assert!(!ledger.forget(Path::new("/view/dir")));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_cleanup_report_merge() {
        let mut a = CleanupReport {
            cancelled: vec![PathBuf::from("/view/a")],
            failed: vec![],
        };
        a.merge(CleanupReport {
            cancelled: vec![],
            failed: vec![(PathBuf::from("/view/b"), "boom".into())],
        });
        assert_eq!(a.cancelled.len(), 1);
        assert!(!a.is_clean());
    }
}
