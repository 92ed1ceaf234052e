//! Brings pushed content into the ClearCase view's own Git working tree.

use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use crate::errors::GitError;
use crate::process::{CommandRunner, Invocation};

/// Runs `git pull` inside the view, which is itself a clone of the repository.
#[derive(Debug, Clone)]
pub struct ViewPuller<R> {
    runner: R,
    git: PathBuf,
}

impl<R: CommandRunner> ViewPuller<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            git: PathBuf::from("git"),
        }
    }

    pub fn with_git_binary(mut self, git: impl Into<PathBuf>) -> Self {
        self.git = git.into();
        self
    }

    /// Pull into `view`. The hook's own `GIT_DIR` is overridden so the pull
    /// targets the view clone rather than the pushed repository.
    #[instrument(skip(self), fields(view = %view.display()))]
    pub async fn pull(&self, view: &Path) -> Result<(), GitError> {
        let inv = Invocation::new(&self.git)
            .arg("pull")
            .current_dir(view)
            .env("GIT_DIR", view.join(".git").to_string_lossy())
            .env("GIT_WORK_TREE", view.to_string_lossy());
        let output = self.runner.run(&inv).await?;
        if !output.success() {
            let stderr = output.stderr.trim().to_string();
            warn!(exit_code = output.exit_code, %stderr, "git pull failed");
            return Err(GitError::PullFailed {
                path: view.display().to_string(),
                exit_code: output.exit_code,
                stderr,
            });
        }
        info!("view updated from git");
        Ok(())
    }
}
