//! Asynchronous `cleartool` client operating on one dynamic view.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use super::ledger::{CheckoutLedger, CleanupReport};
use super::saga::{Compensation, Saga};
use crate::comment::CommentFormatter;
use crate::config::BridgeConfig;
use crate::errors::ClearCaseError;
use crate::models::{children_first_cmp, ElementState};
use crate::process::{CommandOutput, CommandRunner, Invocation, SystemRunner};

/// Element state machine for the paths of a ClearCase view.
///
/// Every operation checks its preconditions through `cleartool` queries
/// before issuing a mutating command, so a refused operation leaves the view
/// untouched.
#[derive(Debug, Clone)]
pub struct ClearCase<R = SystemRunner> {
    runner: R,
    cleartool: PathBuf,
    view: PathBuf,
    main_branch: String,
    comments: CommentFormatter,
}

impl<R: CommandRunner> ClearCase<R> {
    pub fn new(runner: R, cleartool: impl Into<PathBuf>, view: impl Into<PathBuf>) -> Self {
        let client = Self {
            runner,
            cleartool: cleartool.into(),
            view: view.into(),
            main_branch: "main".into(),
            comments: CommentFormatter::default(),
        };
        info!(view = %client.view.display(), "created ClearCase client");
        client
    }

    pub fn from_config(runner: R, config: &BridgeConfig) -> Self {
        Self::new(runner, &config.cleartool.path, &config.view.path)
            .with_main_branch(config.view.main_branch.clone())
            .with_comments(CommentFormatter::new(&config.comments))
    }

    pub fn with_main_branch(mut self, branch: impl Into<String>) -> Self {
        self.main_branch = branch.into();
        self
    }

    pub fn with_comments(mut self, comments: CommentFormatter) -> Self {
        self.comments = comments;
        self
    }

    pub fn view(&self) -> &Path {
        &self.view
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Absolute view path of a repository-relative path.
    pub fn resolve(&self, rel_path: &str) -> PathBuf {
        self.view.join(rel_path.trim_start_matches('/'))
    }

    // -- queries ------------------------------------------------------------

    /// Whether `path` is a ClearCase element. Missing paths are not.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn is_versioned(&self, path: &Path) -> Result<bool, ClearCaseError> {
        if !path.exists() {
            return Ok(false);
        }
        let mut inv = self.tool().arg("ls");
        if path.is_dir() {
            inv = inv.arg("-directory");
        }
        let output = self.run(inv.arg("-vob_only").path_arg(path)).await?;
        if !output.success() {
            debug!(exit_code = output.exit_code, stderr = %output.stderr.trim(), "ls reports no element");
            return Ok(false);
        }
        Ok(!output.stdout.trim().is_empty())
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn is_checked_out(&self, path: &Path) -> Result<bool, ClearCaseError> {
        let inv = self
            .tool()
            .arg("lsco")
            .arg("-short")
            .arg("-directory")
            .arg("-cview")
            .path_arg(path);
        let output = self.run(inv).await?;
        if !output.success() {
            return Ok(false);
        }
        Ok(output
            .stdout
            .lines()
            .next()
            .map(|line| Path::new(line.trim()) == path)
            .unwrap_or(false))
    }

    /// Whether the version selected by the view is behind LATEST on its branch.
    pub async fn needs_merge(&self, path: &Path) -> Result<bool, ClearCaseError> {
        Ok(self.merge_gap(path).await?.is_some())
    }

    /// `(selected, latest)` when they differ.
    async fn merge_gap(&self, path: &Path) -> Result<Option<(String, String)>, ClearCaseError> {
        let spec = path.to_string_lossy().to_string();
        let selected = self.version_of(&spec).await?;
        let branch = selected
            .rsplit_once('/')
            .map(|(branch, _)| branch)
            .unwrap_or(selected.as_str());
        let latest = self.version_of(&format!("{}@@{}/LATEST", spec, branch)).await?;
        if selected == latest {
            Ok(None)
        } else {
            debug!(path = %path.display(), %selected, %latest, "version is behind LATEST");
            Ok(Some((selected, latest)))
        }
    }

    async fn version_of(&self, spec: &str) -> Result<String, ClearCaseError> {
        let inv = self.tool().arg("describe").arg("-fmt").arg("%Vn").arg(spec);
        let output = self.run_checked(inv).await?;
        Ok(output.trim().to_string())
    }

    pub async fn state(&self, path: &Path) -> Result<ElementState, ClearCaseError> {
        if !self.is_versioned(path).await? {
            return Ok(ElementState::Unversioned);
        }
        if self.is_checked_out(path).await? {
            Ok(ElementState::CheckedOut)
        } else {
            Ok(ElementState::CheckedIn)
        }
    }

    // -- element transitions ------------------------------------------------

    /// Check out `path` for modification.
    ///
    /// With `add_version` the path is a version-extended pathname
    /// (`file@@/main/LATEST`) and the versioned and merge checks are skipped.
    #[instrument(skip(self, comment), fields(path = %path.display(), add_version))]
    pub async fn checkout(
        &self,
        path: &Path,
        comment: &str,
        add_version: bool,
    ) -> Result<(), ClearCaseError> {
        let element = element_path(path);
        if !add_version && !self.is_versioned(&element).await? {
            return Err(ClearCaseError::NotVersioned(element));
        }
        if self.is_checked_out(&element).await? {
            return Err(ClearCaseError::AlreadyCheckedOut(element));
        }
        if !add_version {
            if let Some((selected, latest)) = self.merge_gap(&element).await? {
                return Err(ClearCaseError::MergeRequired {
                    path: element,
                    selected,
                    latest,
                });
            }
        }

        let mut inv = self.tool().arg("checkout").arg("-c").arg(comment);
        if add_version {
            inv = inv.arg("-version");
        }
        self.run_checked(inv.path_arg(path)).await?;
        info!(path = %element.display(), "checked out");
        Ok(())
    }

    /// Check `path` in and attach every label to the new version.
    ///
    /// Once the checkin went through, a labelling failure is reported as a
    /// label-only [`ClearCaseError::Incomplete`]: the version is in and must
    /// not be rolled back.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn checkin(&self, path: &Path, labels: &[String]) -> Result<(), ClearCaseError> {
        if !path.exists() {
            return Err(ClearCaseError::NotFound(path.to_path_buf()));
        }
        if !self.is_checked_out(path).await? {
            return Err(ClearCaseError::NotCheckedOut(path.to_path_buf()));
        }
        self.run_checked(self.tool().arg("checkin").arg("-nc").path_arg(path))
            .await?;
        info!(path = %path.display(), "checked in");
        self.label_version(path, labels).await
    }

    async fn label_version(&self, path: &Path, labels: &[String]) -> Result<(), ClearCaseError> {
        let mut complete = true;
        for label in labels {
            if let Err(e) = self.apply_label(label, path).await {
                warn!(label = %label, path = %path.display(), error = %e, "version left without label");
                complete = false;
            }
        }
        if complete {
            Ok(())
        } else {
            Err(ClearCaseError::Incomplete {
                operation: ClearCaseError::LABEL,
                failed: vec![path.to_path_buf()],
            })
        }
    }

    /// Cancel a checkout, discarding its changes.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn uncheckout(&self, path: &Path) -> Result<(), ClearCaseError> {
        self.run_checked(self.tool().arg("uncheckout").arg("-rm").path_arg(path))
            .await?;
        info!(path = %path.display(), "checkout cancelled");
        Ok(())
    }

    /// Make `path` a directory element. A no-op when it already is one.
    ///
    /// Self-contained: the new directory and its parent are both checked in
    /// before this returns, whoever had the parent open.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn create_directory(&self, path: &Path) -> Result<(), ClearCaseError> {
        if path.is_dir() && self.is_versioned(path).await? {
            debug!(path = %path.display(), "directory already versioned");
            return Ok(());
        }
        let parent = parent_of(path)?;
        if !self.is_versioned(&parent).await? {
            return Err(ClearCaseError::ParentNotVersioned(parent));
        }

        let mut saga = Saga::new("create_directory");
        let opened_parent = !self.is_checked_out(&parent).await?;
        if opened_parent {
            self.checkout(&parent, self.comments.directory_change(), false)
                .await?;
            saga.push(Compensation::Uncheckout(parent.clone()));
        }

        let result = self.make_directory(path, &parent, &mut saga).await;
        if let Err(e) = result {
            saga.unwind(self).await;
            return Err(e);
        }
        info!(path = %path.display(), "directory element created");
        Ok(())
    }

    async fn make_directory(
        &self,
        path: &Path,
        parent: &Path,
        saga: &mut Saga,
    ) -> Result<(), ClearCaseError> {
        let inv = self
            .tool()
            .arg("mkdir")
            .arg("-c")
            .arg(self.comments.new_directory())
            .path_arg(path);
        self.run_checked(inv).await?;
        // mkdir leaves the new element checked out
        if self.is_checked_out(path).await? {
            saga.push(Compensation::Uncheckout(path.to_path_buf()));
            self.checkin(path, &[]).await?;
        }
        self.checkin(parent, &[]).await
    }

    /// Create every missing directory element between the view root and
    /// `dir`, root first. Segments created before a failure stay.
    #[instrument(skip(self), fields(dir = %dir.display()))]
    pub async fn create_path(&self, dir: &Path) -> Result<(), ClearCaseError> {
        let rel = dir
            .strip_prefix(&self.view)
            .map_err(|_| ClearCaseError::OutsideView(dir.to_path_buf()))?;
        let mut current = self.view.clone();
        for component in rel.components() {
            if let Component::Normal(segment) = component {
                current.push(segment);
                self.create_directory(&current).await?;
            }
        }
        Ok(())
    }

    /// Turn the view-private file at `path` into a new element carrying its
    /// current content.
    ///
    /// A parent checkout opened here is recorded in `ledger` and left open.
    #[instrument(skip(self, labels, ledger), fields(path = %path.display()))]
    pub async fn create_file(
        &self,
        path: &Path,
        labels: &[String],
        ledger: &mut CheckoutLedger,
    ) -> Result<(), ClearCaseError> {
        if !path.is_file() {
            return Err(ClearCaseError::NotFound(path.to_path_buf()));
        }
        let staged = suffixed(path, ".keep");
        if staged.exists() {
            let preserved = suffixed(path, ".keep.old");
            warn!(staged = %staged.display(), preserved = %preserved.display(), "preserving existing .keep file");
            tokio::fs::rename(&staged, &preserved).await?;
        }

        let parent = parent_of(path)?;
        if !self.is_checked_out(&parent).await? {
            self.checkout(&parent, self.comments.new_file(), false).await?;
            ledger.record(&parent);
        }

        // mkelem moves the view-private content aside to `<path>.keep`
        let inv = self.tool().arg("mkelem").arg("-nc").arg("-nco").path_arg(path);
        self.run_checked(inv).await?;

        let mut saga = Saga::new("create_file");
        saga.push(Compensation::Move {
            from: staged.clone(),
            to: path.to_path_buf(),
        });
        if let Err(e) = self.fill_new_element(path, &staged, &mut saga).await {
            warn!(
                path = %path.display(),
                "new element stays at version 0 until the parent checkout is cancelled"
            );
            saga.unwind(self).await;
            return Err(e);
        }
        info!(path = %path.display(), "file element created");
        self.label_version(path, labels).await
    }

    async fn fill_new_element(
        &self,
        path: &Path,
        staged: &Path,
        saga: &mut Saga,
    ) -> Result<(), ClearCaseError> {
        let latest = PathBuf::from(format!(
            "{}@@/{}/LATEST",
            path.to_string_lossy(),
            self.main_branch
        ));
        self.checkout(&latest, self.comments.new_file(), true).await?;
        saga.push(Compensation::Uncheckout(path.to_path_buf()));
        tokio::fs::rename(staged, path).await?;
        // the content must survive a later uncheckout
        saga.push(Compensation::Move {
            from: path.to_path_buf(),
            to: staged.to_path_buf(),
        });
        self.checkin(path, &[]).await
    }

    /// Remove the name `path` from its parent directory.
    ///
    /// The parent stays checked out (recorded in `ledger` when opened here).
    /// A checked-out directory `path` is checked in first and dropped from
    /// the ledger.
    #[instrument(skip(self, ledger), fields(path = %path.display()))]
    pub async fn remove_name(
        &self,
        path: &Path,
        ledger: &mut CheckoutLedger,
    ) -> Result<(), ClearCaseError> {
        let parent = parent_of(path)?;
        if !self.is_checked_out(&parent).await? {
            self.checkout(&parent, self.comments.directory_change(), false)
                .await?;
            ledger.record(&parent);
        }
        if path.is_dir() && self.is_checked_out(path).await? {
            self.checkin(path, &[]).await?;
            ledger.forget(path);
        }
        self.run_checked(self.tool().arg("rmname").arg("-nc").path_arg(path))
            .await?;
        info!(path = %path.display(), "name removed");
        Ok(())
    }

    // -- labels -------------------------------------------------------------

    pub async fn exists_label(&self, name: &str, path: &Path) -> Result<bool, ClearCaseError> {
        let inv = self
            .tool()
            .arg("lstype")
            .arg("-short")
            .arg(format!("lbtype:{}", name))
            .current_dir(self.label_scope(path));
        let output = self.run(inv).await?;
        Ok(output.success() && !output.stdout.trim().is_empty())
    }

    pub async fn create_label(&self, name: &str, path: &Path) -> Result<(), ClearCaseError> {
        let inv = self
            .tool()
            .arg("mklbtype")
            .arg("-nc")
            .arg(name)
            .current_dir(self.label_scope(path));
        self.run_checked(inv).await?;
        info!(label = name, "label type created");
        Ok(())
    }

    /// Attach `name` to the selected version of `path`, moving it if another
    /// version already carries it.
    pub async fn set_label(&self, name: &str, path: &Path) -> Result<(), ClearCaseError> {
        let inv = self
            .tool()
            .arg("mklabel")
            .arg("-replace")
            .arg(name)
            .path_arg(path);
        self.run_checked(inv).await?;
        debug!(label = name, path = %path.display(), "label applied");
        Ok(())
    }

    pub async fn apply_label(&self, name: &str, path: &Path) -> Result<(), ClearCaseError> {
        if !self.exists_label(name, path).await? {
            self.create_label(name, path).await?;
        }
        self.set_label(name, path).await
    }

    /// Label types live in the VOB; commands run from the element's directory.
    fn label_scope(&self, path: &Path) -> PathBuf {
        match path.parent() {
            Some(parent) if parent.starts_with(&self.view) => parent.to_path_buf(),
            _ => path.to_path_buf(),
        }
    }

    // -- view maintenance ---------------------------------------------------

    /// Every checkout held by this view, children before parents.
    #[instrument(skip(self), fields(view = %self.view.display()))]
    pub async fn list_checkouts(&self) -> Result<Vec<PathBuf>, ClearCaseError> {
        let mut found = BTreeSet::new();
        if self.is_checked_out(&self.view).await? {
            found.insert(self.view.clone());
        }
        let mut entries = tokio::fs::read_dir(&self.view).await?;
        while let Some(entry) = entries.next_entry().await? {
            let dir = entry.path();
            if !entry.file_type().await?.is_dir() || entry.file_name() == ".git" {
                continue;
            }
            if !self.is_versioned(&dir).await? {
                continue;
            }
            let inv = self
                .tool()
                .arg("lsco")
                .arg("-short")
                .arg("-recurse")
                .arg("-cview")
                .path_arg(&dir);
            let listing = self.run_checked(inv).await?;
            found.extend(
                listing
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(PathBuf::from),
            );
        }
        let mut checkouts: Vec<PathBuf> = found.into_iter().collect();
        checkouts.sort_by(|a, b| children_first_cmp(a, b));
        debug!(count = checkouts.len(), "listed checkouts");
        Ok(checkouts)
    }

    /// Cancel every checkout in the view, best effort.
    ///
    /// Directories left empty and unversioned afterwards are removed.
    #[instrument(skip(self), fields(view = %self.view.display()))]
    pub async fn uncheckout_all(&self) -> Result<CleanupReport, ClearCaseError> {
        let mut report = CleanupReport::default();
        for path in self.list_checkouts().await? {
            match self.uncheckout(&path).await {
                Ok(()) => report.cancelled.push(path.clone()),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "could not cancel checkout");
                    report.failed.push((path.clone(), e.to_string()));
                    continue;
                }
            }
            if is_empty_dir(&path).await && !self.is_versioned(&path).await? {
                match tokio::fs::remove_dir(&path).await {
                    Ok(()) => debug!(path = %path.display(), "removed leftover directory"),
                    Err(e) => warn!(path = %path.display(), error = %e, "could not remove leftover directory"),
                }
            }
        }
        info!(
            cancelled = report.cancelled.len(),
            failed = report.failed.len(),
            "view checkout sweep finished"
        );
        Ok(report)
    }

    // -- plumbing -----------------------------------------------------------

    fn tool(&self) -> Invocation {
        Invocation::new(&self.cleartool)
    }

    /// Run without judging the exit status.
    async fn run(&self, invocation: Invocation) -> Result<CommandOutput, ClearCaseError> {
        self.runner.run(&invocation).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ClearCaseError::BinaryNotFound(self.cleartool.display().to_string())
            } else {
                ClearCaseError::IoError(e)
            }
        })
    }

    /// Run and return stdout; a non-zero exit becomes `CommandFailed`.
    async fn run_checked(&self, invocation: Invocation) -> Result<String, ClearCaseError> {
        let command = invocation.args.first().cloned().unwrap_or_default();
        let output = self.run(invocation).await?;
        if !output.success() {
            let stderr = output.stderr.trim().to_string();
            warn!(command = %command, exit_code = output.exit_code, %stderr, "cleartool command failed");
            return Err(ClearCaseError::CommandFailed {
                command,
                exit_code: output.exit_code,
                stderr,
            });
        }
        Ok(output.stdout)
    }
}

/// Strip a version extension (`file@@/main/LATEST` -> `file`).
fn element_path(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    match text.split_once("@@") {
        Some((element, _)) => PathBuf::from(element),
        None => path.to_path_buf(),
    }
}

fn parent_of(path: &Path) -> Result<PathBuf, ClearCaseError> {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .ok_or_else(|| ClearCaseError::NotFound(path.to_path_buf()))
}

fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

async fn is_empty_dir(path: &Path) -> bool {
    match tokio::fs::read_dir(path).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(None)),
        Err(_) => false,
    }
}
