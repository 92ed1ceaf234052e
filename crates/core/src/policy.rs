//! Decides whether a pushed ref update must be mirrored into ClearCase.

use std::fmt;

use crate::config::GitConfig;
use crate::models::{PushRef, Revision};

/// Why a push is not mirrored. Skipping is a normal outcome, not a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Tags, remotes and other namespaces are never mirrored.
    NotABranch,
    /// The branch was just created; there is no previous state to diff from.
    NewBranch,
    /// The ref was deleted or the hook gave no new revision.
    NoNewRevision,
    /// The branch is not configured for synchronization.
    BranchNotSynced(String),
    /// The push was committed by the ClearCase mirror identity itself.
    MirrorCommitter(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotABranch => write!(f, "ref is not a branch head"),
            Self::NewBranch => write!(f, "branch creation is never mirrored"),
            Self::NoNewRevision => write!(f, "no new revision"),
            Self::BranchNotSynced(b) => write!(f, "branch '{}' is not synchronized", b),
            Self::MirrorCommitter(c) => {
                write!(f, "committer '{}' is the ClearCase mirror user", c)
            }
        }
    }
}

/// Outcome of [`SyncPolicy::decide`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncDecision {
    Sync,
    Skip(SkipReason),
}

impl SyncDecision {
    pub fn is_sync(&self) -> bool {
        matches!(self, Self::Sync)
    }
}

/// Pure push filter built from the `[git]` configuration section.
#[derive(Debug, Clone)]
pub struct SyncPolicy {
    sync_branches: Vec<String>,
    mirror_user: String,
}

impl SyncPolicy {
    pub fn new(sync_branches: Vec<String>, mirror_user: impl Into<String>) -> Self {
        Self {
            sync_branches,
            mirror_user: mirror_user.into(),
        }
    }

    /// Evaluate every rule that does not need the committer.
    ///
    /// Callers use this to avoid querying Git for the committer of a push
    /// that would be skipped anyway.
    pub fn precheck(
        &self,
        old: &Revision,
        new: Option<&Revision>,
        push_ref: &PushRef,
    ) -> SyncDecision {
        if !push_ref.is_branch() {
            return SyncDecision::Skip(SkipReason::NotABranch);
        }
        if old.is_null() {
            return SyncDecision::Skip(SkipReason::NewBranch);
        }
        match new {
            Some(rev) if !rev.is_null() => {}
            _ => return SyncDecision::Skip(SkipReason::NoNewRevision),
        }
        if !self.sync_branches.iter().any(|b| *b == push_ref.name) {
            return SyncDecision::Skip(SkipReason::BranchNotSynced(push_ref.name.clone()));
        }
        SyncDecision::Sync
    }

    /// Full decision including the mirror-committer rule.
    pub fn decide(
        &self,
        old: &Revision,
        new: Option<&Revision>,
        push_ref: &PushRef,
        committer: &str,
    ) -> SyncDecision {
        match self.precheck(old, new, push_ref) {
            SyncDecision::Sync => {}
            skip => return skip,
        }
        if committer.trim() == self.mirror_user {
            return SyncDecision::Skip(SkipReason::MirrorCommitter(committer.trim().to_string()));
        }
        SyncDecision::Sync
    }

    pub fn should_sync(
        &self,
        old: &Revision,
        new: Option<&Revision>,
        push_ref: &PushRef,
        committer: &str,
    ) -> bool {
        self.decide(old, new, push_ref, committer).is_sync()
    }
}

impl From<&GitConfig> for SyncPolicy {
    fn from(config: &GitConfig) -> Self {
        Self::new(config.sync_branches.clone(), config.mirror_user.clone())
    }
}
