//! Git hook entry points: turn one ref update into a skip, a preflight or a
//! synchronized transaction.

use tracing::info;

use crate::errors::SyncError;
use crate::git::GitClient;
use crate::models::{CommitMetadata, PushRef, Revision};
use crate::policy::{SkipReason, SyncDecision, SyncPolicy};
use crate::process::CommandRunner;
use crate::sync_engine::{ContentStager, SyncEngine, SyncReport, SyncRequest};

/// One `<old> <new> <ref>` update as delivered to a hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefUpdate {
    pub refname: String,
    pub old: Revision,
    pub new: Option<Revision>,
}

impl RefUpdate {
    /// From the `update` hook arguments `<ref> <old> [<new>]`.
    pub fn from_args(refname: &str, old: &str, new: Option<&str>) -> Self {
        Self {
            refname: refname.to_string(),
            old: Revision::new(old),
            new: new.map(Revision::new).filter(|r| !r.as_str().is_empty()),
        }
    }

    /// From a `post-receive` stdin line `<old> <new> <ref>`.
    pub fn parse_line(line: &str) -> Result<Self, SyncError> {
        let mut fields = line.split_whitespace();
        let (Some(old), Some(new), Some(refname), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(SyncError::InvalidRef(line.trim().to_string()));
        };
        Ok(Self::from_args(refname, old, Some(new)))
    }
}

/// Which hook is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookMode {
    /// Before refs move: read-only preflight.
    Update,
    /// After refs move: full transaction.
    PostReceive,
}

#[derive(Debug)]
pub enum HookOutcome {
    Skipped(SkipReason),
    Accepted,
    Synced(Box<SyncReport>),
}

/// Process exit code for a hook result: 0 when synchronized or skipped.
pub fn exit_code<T, E>(result: &Result<T, E>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(_) => 1,
    }
}

/// Handles ref updates for one pushed repository.
pub struct HookHandler<'a, R, S: ?Sized> {
    git: &'a GitClient,
    policy: &'a SyncPolicy,
    engine: &'a SyncEngine<R>,
    stager: &'a S,
}

impl<'a, R, S> HookHandler<'a, R, S>
where
    R: CommandRunner,
    S: ContentStager + ?Sized,
{
    pub fn new(
        git: &'a GitClient,
        policy: &'a SyncPolicy,
        engine: &'a SyncEngine<R>,
        stager: &'a S,
    ) -> Self {
        Self {
            git,
            policy,
            engine,
            stager,
        }
    }

    pub async fn handle(&self, update: &RefUpdate, mode: HookMode) -> Result<HookOutcome, SyncError> {
        let push_ref = PushRef::parse(&update.refname)?;
        if let SyncDecision::Skip(reason) =
            self.policy.precheck(&update.old, update.new.as_ref(), &push_ref)
        {
            info!(push_ref = %push_ref, %reason, "not synchronizing");
            return Ok(HookOutcome::Skipped(reason));
        }
        let Some(new) = update.new.as_ref() else {
            return Ok(HookOutcome::Skipped(SkipReason::NoNewRevision));
        };

        let committer = self.git.committer(new)?;
        if let SyncDecision::Skip(reason) =
            self.policy
                .decide(&update.old, Some(new), &push_ref, &committer)
        {
            info!(push_ref = %push_ref, %reason, "not synchronizing");
            return Ok(HookOutcome::Skipped(reason));
        }

        let request = SyncRequest {
            push_ref,
            old: update.old.clone(),
            new: new.clone(),
            metadata: CommitMetadata {
                committer,
                comments: self.git.comments(&update.old, new)?,
            },
            changes: self.git.changes(&update.old, new)?,
        };

        match mode {
            HookMode::Update => {
                self.engine.preflight(&request).await?;
                Ok(HookOutcome::Accepted)
            }
            HookMode::PostReceive => {
                let report = self.engine.run(&request, self.git, self.stager).await?;
                Ok(HookOutcome::Synced(Box::new(report)))
            }
        }
    }
}
