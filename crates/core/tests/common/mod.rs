//! Shared fixtures: a simulated `cleartool` over a temp-dir view, a content
//! stager and git2 repository helpers.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use git2::{IndexAddOption, Oid, Repository, Signature};

use git2cc_core::errors::GitError;
use git2cc_core::process::{CommandOutput, CommandRunner, Invocation};
use git2cc_core::sync_engine::ContentStager;

// ---------------------------------------------------------------------------
// Simulated cleartool
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct FakeState {
    pub versioned: BTreeSet<PathBuf>,
    pub checked_out: BTreeSet<PathBuf>,
    /// Checked-in version number on `/main`.
    pub versions: HashMap<PathBuf, u32>,
    /// LATEST reported for an element when it differs from the selected one.
    pub latest_override: HashMap<PathBuf, String>,
    /// File content captured at checkout, restored by uncheckout.
    pub snapshots: HashMap<PathBuf, Vec<u8>>,
    pub label_types: BTreeSet<String>,
    /// (label, element) -> labelled version.
    pub labels: BTreeMap<(String, PathBuf), u32>,
    pub calls: Vec<Vec<String>>,
    /// (verb, path) pairs that fail with exit 1.
    pub failures: Vec<(String, PathBuf)>,
}

/// In-memory ClearCase that keeps the temp-dir view on disk consistent with
/// the commands it receives.
#[derive(Debug, Default)]
pub struct FakeClearTool {
    state: Mutex<FakeState>,
}

fn ok(stdout: impl Into<String>) -> CommandOutput {
    CommandOutput {
        exit_code: 0,
        stdout: stdout.into(),
        stderr: String::new(),
    }
}

fn fail(stderr: impl Into<String>) -> CommandOutput {
    CommandOutput {
        exit_code: 1,
        stdout: String::new(),
        stderr: stderr.into(),
    }
}

fn element_of(spec: &str) -> PathBuf {
    match spec.split_once("@@") {
        Some((element, _)) => PathBuf::from(element),
        None => PathBuf::from(spec),
    }
}

fn keep_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".keep");
    PathBuf::from(name)
}

impl FakeClearTool {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create `dir` on disk as a checked-in directory element.
    pub fn seed_dir(&self, dir: &Path) {
        std::fs::create_dir_all(dir).unwrap();
        let mut state = self.state.lock().unwrap();
        state.versioned.insert(dir.to_path_buf());
        state.versions.insert(dir.to_path_buf(), 1);
    }

    /// Create `file` on disk as a checked-in file element.
    pub fn seed_file(&self, file: &Path, content: &str) {
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(file, content).unwrap();
        let mut state = self.state.lock().unwrap();
        state.versioned.insert(file.to_path_buf());
        state.versions.insert(file.to_path_buf(), 1);
    }

    /// Make LATEST on the element's branch differ from the selected version.
    pub fn set_latest(&self, path: &Path, latest: &str) {
        self.state
            .lock()
            .unwrap()
            .latest_override
            .insert(path.to_path_buf(), latest.to_string());
    }

    pub fn check_out(&self, path: &Path) {
        self.state
            .lock()
            .unwrap()
            .checked_out
            .insert(path.to_path_buf());
    }

    pub fn fail_on(&self, verb: &str, path: &Path) {
        self.state
            .lock()
            .unwrap()
            .failures
            .push((verb.to_string(), path.to_path_buf()));
    }

    pub fn is_versioned(&self, path: &Path) -> bool {
        self.state.lock().unwrap().versioned.contains(path)
    }

    pub fn is_checked_out(&self, path: &Path) -> bool {
        self.state.lock().unwrap().checked_out.contains(path)
    }

    pub fn checked_out(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().checked_out.iter().cloned().collect()
    }

    pub fn version(&self, path: &Path) -> Option<u32> {
        self.state.lock().unwrap().versions.get(path).copied()
    }

    pub fn has_label(&self, label: &str, path: &Path) -> bool {
        self.state
            .lock()
            .unwrap()
            .labels
            .contains_key(&(label.to_string(), path.to_path_buf()))
    }

    pub fn label_type_exists(&self, label: &str) -> bool {
        self.state.lock().unwrap().label_types.contains(label)
    }

    /// Arguments of every call whose sub-command is `verb`.
    pub fn calls_with(&self, verb: &str) -> Vec<Vec<String>> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.first().map(String::as_str) == Some(verb))
            .cloned()
            .collect()
    }

    /// Last argument (the path) of every `verb` call, in call order.
    pub fn paths_of(&self, verb: &str) -> Vec<PathBuf> {
        self.calls_with(verb)
            .into_iter()
            .filter_map(|c| c.last().map(|p| element_of(p)))
            .collect()
    }

    fn dispatch(&self, inv: &Invocation) -> CommandOutput {
        let mut state = self.state.lock().unwrap();
        state.calls.push(inv.args.clone());

        let verb = inv.args.first().cloned().unwrap_or_default();
        let last = inv.args.last().cloned().unwrap_or_default();
        let target = element_of(&last);
        if state
            .failures
            .iter()
            .any(|(v, p)| *v == verb && *p == target)
        {
            return fail(format!("cleartool: Error: simulated {} failure", verb));
        }

        match verb.as_str() {
            "ls" => {
                if state.versioned.contains(&target) {
                    let version = state.versions.get(&target).copied().unwrap_or(0);
                    ok(format!("{}@@/main/{}\n", target.display(), version))
                } else {
                    ok("")
                }
            }
            "lsco" => {
                if inv.args.iter().any(|a| a == "-recurse") {
                    let listing: String = state
                        .checked_out
                        .iter()
                        .filter(|p| p.starts_with(&target))
                        .map(|p| format!("{}\n", p.display()))
                        .collect();
                    ok(listing)
                } else if state.checked_out.contains(&target) {
                    ok(format!("{}\n", target.display()))
                } else {
                    ok("")
                }
            }
            "describe" => {
                if !state.versioned.contains(&target) {
                    return fail("cleartool: Error: Not a vob object");
                }
                let version = state.versions.get(&target).copied().unwrap_or(0);
                if last.contains("@@") {
                    let latest = state
                        .latest_override
                        .get(&target)
                        .cloned()
                        .unwrap_or_else(|| format!("/main/{}", version));
                    ok(latest)
                } else if state.checked_out.contains(&target) {
                    ok("/main/CHECKEDOUT")
                } else {
                    ok(format!("/main/{}", version))
                }
            }
            "checkout" => {
                if !state.versioned.contains(&target) {
                    return fail("cleartool: Error: Not a vob object");
                }
                if !state.checked_out.insert(target.clone()) {
                    return fail("cleartool: Error: already checked out");
                }
                if target.is_file() {
                    let content = std::fs::read(&target).unwrap_or_default();
                    state.snapshots.insert(target, content);
                }
                ok("")
            }
            "checkin" => {
                if !state.checked_out.remove(&target) {
                    return fail("cleartool: Error: not checked out");
                }
                state.snapshots.remove(&target);
                *state.versions.entry(target).or_insert(0) += 1;
                ok("")
            }
            "uncheckout" => {
                if !state.checked_out.remove(&target) {
                    return fail("cleartool: Error: not checked out");
                }
                if let Some(content) = state.snapshots.remove(&target) {
                    std::fs::write(&target, content).unwrap();
                }
                ok("")
            }
            "mkdir" => {
                let parent = target.parent().map(Path::to_path_buf).unwrap_or_default();
                if !state.checked_out.contains(&parent) {
                    return fail("cleartool: Error: parent directory not checked out");
                }
                if std::fs::create_dir_all(&target).is_err() {
                    return fail("cleartool: Error: cannot create directory");
                }
                state.versioned.insert(target.clone());
                state.versions.insert(target.clone(), 0);
                state.checked_out.insert(target);
                ok("")
            }
            "mkelem" => {
                let parent = target.parent().map(Path::to_path_buf).unwrap_or_default();
                if !state.checked_out.contains(&parent) {
                    return fail("cleartool: Error: parent directory not checked out");
                }
                if target.exists() {
                    std::fs::rename(&target, keep_path(&target)).unwrap();
                }
                std::fs::write(&target, b"").unwrap();
                state.versioned.insert(target.clone());
                state.versions.insert(target, 0);
                ok("")
            }
            "rmname" => {
                let parent = target.parent().map(Path::to_path_buf).unwrap_or_default();
                if !state.checked_out.contains(&parent) {
                    return fail("cleartool: Error: parent directory not checked out");
                }
                if target.is_dir() {
                    std::fs::remove_dir_all(&target).unwrap();
                } else if target.exists() {
                    std::fs::remove_file(&target).unwrap();
                } else {
                    return fail("cleartool: Error: no such element");
                }
                state.versioned.retain(|p| !p.starts_with(&target));
                state.checked_out.retain(|p| !p.starts_with(&target));
                ok("")
            }
            "lstype" => {
                let name = last.trim_start_matches("lbtype:");
                if state.label_types.contains(name) {
                    ok(format!("{}\n", name))
                } else {
                    fail(format!("cleartool: Error: Label type not found: \"{}\"", name))
                }
            }
            "mklbtype" => {
                if state.label_types.insert(last.clone()) {
                    ok("")
                } else {
                    fail("cleartool: Error: label type already exists")
                }
            }
            "mklabel" => {
                let name = inv.args.get(2).cloned().unwrap_or_default();
                if !state.label_types.contains(&name) || !state.versioned.contains(&target) {
                    return fail("cleartool: Error: unable to label");
                }
                let version = state.versions.get(&target).copied().unwrap_or(0);
                state.labels.insert((name, target), version);
                ok("")
            }
            other => fail(format!("cleartool: Error: unknown command {}", other)),
        }
    }
}

#[async_trait]
impl CommandRunner for FakeClearTool {
    async fn run(&self, invocation: &Invocation) -> std::io::Result<CommandOutput> {
        Ok(self.dispatch(invocation))
    }
}

// ---------------------------------------------------------------------------
// Content staging
// ---------------------------------------------------------------------------

/// Writes fixed content into the view instead of running `git pull`.
#[derive(Debug, Default)]
pub struct FileStager {
    files: Vec<(String, String)>,
    pub fail: bool,
}

impl FileStager {
    pub fn new(files: &[(&str, &str)]) -> Self {
        Self {
            files: files
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_string()))
                .collect(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            files: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl ContentStager for FileStager {
    async fn stage(&self, view: &Path) -> Result<(), GitError> {
        if self.fail {
            return Err(GitError::PullFailed {
                path: view.display().to_string(),
                exit_code: 1,
                stderr: "fatal: simulated pull failure".into(),
            });
        }
        for (rel, content) in &self.files {
            let path = view.join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, content)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Git repositories
// ---------------------------------------------------------------------------

/// Stage the whole work tree (additions and deletions) and commit.
pub fn commit_all(repo: &Repository, message: &str, committer: &str) -> Oid {
    let mut index = repo.index().unwrap();
    index
        .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
        .unwrap();
    index.update_all(["*"].iter(), None).unwrap();
    index.write().unwrap();
    let tree_oid = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_oid).unwrap();
    let author = Signature::now("Author", "author@example.com").unwrap();
    let committer = Signature::now(committer, "committer@example.com").unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &author, &committer, message, &tree, &parents)
        .unwrap()
}

pub fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}
