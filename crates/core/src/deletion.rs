//! Applies Git deletions to the view.

use tracing::{debug, info};

use crate::clearcase::{CheckoutLedger, ClearCase};
use crate::errors::ClearCaseError;
use crate::path_policy::PathPolicy;
use crate::process::CommandRunner;

/// What [`DeletionSequencer::apply`] did with each path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionReport {
    pub removed: Vec<String>,
    /// Already gone, usually because an ancestor was removed first.
    pub vanished: Vec<String>,
    pub ignored: Vec<String>,
}

impl DeletionReport {
    /// Number of `rmname` calls issued.
    pub fn removals(&self) -> usize {
        self.removed.len()
    }
}

/// Removes names from the view in the order they are given.
///
/// Deletion lists put a directory before its contents, so removing the
/// directory makes every path below it vanish; each path is looked up on
/// disk right before it is handled.
pub struct DeletionSequencer<'a, R> {
    cc: &'a ClearCase<R>,
    policy: &'a PathPolicy,
}

impl<'a, R: CommandRunner> DeletionSequencer<'a, R> {
    pub fn new(cc: &'a ClearCase<R>, policy: &'a PathPolicy) -> Self {
        Self { cc, policy }
    }

    pub async fn apply<S: AsRef<str>>(
        &self,
        deletions: &[S],
        ledger: &mut CheckoutLedger,
    ) -> Result<DeletionReport, ClearCaseError> {
        let mut report = DeletionReport::default();
        for rel in deletions {
            let rel = rel.as_ref();
            if self.policy.is_ignored(rel) {
                info!(path = rel, "ignored path not removed from ClearCase");
                report.ignored.push(rel.to_string());
                continue;
            }
            let full = self.cc.resolve(rel);
            if full.symlink_metadata().is_err() {
                debug!(path = rel, "already removed");
                report.vanished.push(rel.to_string());
                continue;
            }
            self.cc.remove_name(&full, ledger).await?;
            report.removed.push(rel.to_string());
        }
        info!(
            removed = report.removed.len(),
            vanished = report.vanished.len(),
            "deletions applied"
        );
        Ok(report)
    }
}
