use std::path::PathBuf;

use tracing::warn;

use super::client::ClearCase;
use crate::process::CommandRunner;

/// Undo step registered while a multi-command element operation progresses.
#[derive(Debug, Clone)]
pub(crate) enum Compensation {
    /// Cancel a checkout this operation opened.
    Uncheckout(PathBuf),
    /// Move a file back to where it came from, if it is still there.
    Move { from: PathBuf, to: PathBuf },
}

/// Compensations for one operation, unwound newest first.
#[derive(Debug)]
pub(crate) struct Saga {
    operation: &'static str,
    steps: Vec<Compensation>,
}

impl Saga {
    pub(crate) fn new(operation: &'static str) -> Self {
        Self {
            operation,
            steps: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, step: Compensation) {
        self.steps.push(step);
    }

    /// Best effort: failures are logged and never replace the original error.
    pub(crate) async fn unwind<R: CommandRunner>(mut self, cc: &ClearCase<R>) {
        while let Some(step) = self.steps.pop() {
            match step {
                Compensation::Uncheckout(path) => {
                    if !matches!(cc.is_checked_out(&path).await, Ok(true)) {
                        continue;
                    }
                    if let Err(e) = cc.uncheckout(&path).await {
                        warn!(
                            operation = self.operation,
                            path = %path.display(),
                            error = %e,
                            "compensating uncheckout failed"
                        );
                    }
                }
                Compensation::Move { from, to } => {
                    if !matches!(tokio::fs::try_exists(&from).await, Ok(true)) {
                        continue;
                    }
                    if let Err(e) = tokio::fs::rename(&from, &to).await {
                        warn!(
                            operation = self.operation,
                            from = %from.display(),
                            error = %e,
                            "could not restore staged content"
                        );
                    }
                }
            }
        }
    }
}
