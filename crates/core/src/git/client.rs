//! Read-only revision queries on the pushed repository via `git2`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use git2::{Delta, Repository, Sort, Tree};
use tracing::{debug, info, instrument};

use crate::errors::GitError;
use crate::models::{structural_cmp, ChangeEntry, ChangeStatus, CommitMetadata, Revision};

/// High-level Git client wrapping a `git2::Repository`.
pub struct GitClient {
    repo: Repository,
    repo_path: PathBuf,
}

impl GitClient {
    /// Open an existing Git repository (bare or not) at `repo_path`.
    pub fn new<P: AsRef<Path>>(repo_path: P) -> Result<Self, GitError> {
        let path = repo_path.as_ref();
        info!(path = %path.display(), "opening git repository");
        let repo = Repository::open(path)
            .map_err(|_| GitError::RepositoryNotFound(path.display().to_string()))?;
        Ok(Self {
            repo,
            repo_path: path.to_path_buf(),
        })
    }

    /// Open the repository a hook runs in (`GIT_DIR`, or discovery from cwd).
    pub fn open_from_env() -> Result<Self, GitError> {
        let repo = Repository::open_from_env()
            .map_err(|e| GitError::RepositoryNotFound(e.message().to_string()))?;
        let repo_path = repo.path().to_path_buf();
        info!(path = %repo_path.display(), "opened hook repository");
        Ok(Self { repo, repo_path })
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    /// Paths changed between `old` and `new`, in diff order.
    #[instrument(skip(self), fields(old = %old, new = %new))]
    pub fn changes(&self, old: &Revision, new: &Revision) -> Result<Vec<ChangeEntry>, GitError> {
        let (old_tree, new_tree) = self.range_trees(old, new)?;
        let diff = self
            .repo
            .diff_tree_to_tree(Some(&old_tree), Some(&new_tree), None)?;

        let mut entries = Vec::new();
        for delta in diff.deltas() {
            let file = match delta.status() {
                Delta::Deleted => delta.old_file(),
                _ => delta.new_file(),
            };
            let path = file
                .path()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            let status = match delta.status() {
                Delta::Added => ChangeStatus::Added,
                Delta::Modified => ChangeStatus::Modified,
                Delta::Deleted => ChangeStatus::Deleted,
                other => {
                    return Err(GitError::UnsupportedStatus {
                        status: format!("{:?}", other),
                        path,
                    })
                }
            };
            entries.push(ChangeEntry::new(status, path));
        }
        debug!(count = entries.len(), "collected changed paths");
        Ok(entries)
    }

    /// Messages of the commits in `old..new`, oldest first, trimmed.
    #[instrument(skip(self), fields(old = %old, new = %new))]
    pub fn comments(&self, old: &Revision, new: &Revision) -> Result<Vec<String>, GitError> {
        self.reject_null(old)?;
        let new_oid = self.resolve(new)?.id();
        let old_oid = self.resolve(old)?.id();

        let mut revwalk = self.repo.revwalk()?;
        revwalk.push(new_oid)?;
        revwalk.hide(old_oid)?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;

        let mut messages = Vec::new();
        for oid in revwalk {
            let commit = self.repo.find_commit(oid?)?;
            messages.push(commit.message().unwrap_or("").trim().to_string());
        }
        debug!(count = messages.len(), "collected commit comments");
        Ok(messages)
    }

    /// Committer name of `rev`.
    pub fn committer(&self, rev: &Revision) -> Result<String, GitError> {
        let commit = self.resolve(rev)?;
        let name = commit.committer().name().unwrap_or("").trim().to_string();
        Ok(name)
    }

    pub fn metadata(&self, old: &Revision, new: &Revision) -> Result<CommitMetadata, GitError> {
        Ok(CommitMetadata {
            committer: self.committer(new)?,
            comments: self.comments(old, new)?,
        })
    }

    /// Deleted paths between `old` and `new`, including directories that
    /// exist in `old` but not in `new`. A directory sorts before its contents.
    #[instrument(skip(self), fields(old = %old, new = %new))]
    pub fn list_deletions(&self, old: &Revision, new: &Revision) -> Result<Vec<String>, GitError> {
        let (old_tree, new_tree) = self.range_trees(old, new)?;
        let diff = self
            .repo
            .diff_tree_to_tree(Some(&old_tree), Some(&new_tree), None)?;

        let mut deleted = BTreeSet::new();
        for delta in diff.deltas().filter(|d| d.status() == Delta::Deleted) {
            let Some(path) = delta.old_file().path() else {
                continue;
            };
            deleted.insert(path.to_string_lossy().replace('\\', "/"));
            for dir in path.ancestors().skip(1) {
                if dir.as_os_str().is_empty() {
                    break;
                }
                if new_tree.get_path(dir).is_ok() {
                    break;
                }
                deleted.insert(dir.to_string_lossy().replace('\\', "/"));
            }
        }

        let mut deletions: Vec<String> = deleted.into_iter().collect();
        deletions.sort_by(|a, b| structural_cmp(a, b));
        debug!(count = deletions.len(), "collected deletions");
        Ok(deletions)
    }

    fn reject_null(&self, old: &Revision) -> Result<(), GitError> {
        if old.is_null() {
            return Err(GitError::NullRevisionRange(old.to_string()));
        }
        Ok(())
    }

    fn resolve(&self, rev: &Revision) -> Result<git2::Commit<'_>, GitError> {
        self.repo
            .revparse_single(rev.as_str())
            .and_then(|obj| obj.peel_to_commit())
            .map_err(|_| GitError::RefNotFound(rev.to_string()))
    }

    fn range_trees(&self, old: &Revision, new: &Revision) -> Result<(Tree<'_>, Tree<'_>), GitError> {
        self.reject_null(old)?;
        let old_tree = self.resolve(old)?.tree()?;
        let new_tree = self.resolve(new)?.tree()?;
        Ok((old_tree, new_tree))
    }
}
