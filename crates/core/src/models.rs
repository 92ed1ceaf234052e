//! Domain model types shared by the Git client, the policy and the sync engine.

use std::fmt;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::errors::SyncError;

// ---------------------------------------------------------------------------
// Revisions
// ---------------------------------------------------------------------------

/// An opaque Git object identifier as delivered by the hook protocol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Revision(String);

impl Revision {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    /// The SHA-1 null revision Git passes for a ref that did not exist.
    pub fn null() -> Self {
        Self("0".repeat(40))
    }

    /// `true` for an identifier made only of zeros (SHA-1 or SHA-256 width).
    pub fn is_null(&self) -> bool {
        !self.0.is_empty() && self.0.bytes().all(|b| b == b'0')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Refs
// ---------------------------------------------------------------------------

/// The namespace a pushed ref lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    Head,
    Tag,
    Remote,
    Other,
}

/// A parsed `refs/<kind>/<name>` reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRef {
    pub full_name: String,
    pub kind: RefKind,
    /// Everything after the kind segment; branch names may contain `/`.
    pub name: String,
}

impl PushRef {
    pub fn parse(full_name: &str) -> Result<Self, SyncError> {
        let full_name = full_name.trim();
        let mut parts = full_name.splitn(3, '/');
        let (Some("refs"), Some(kind), Some(name)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(SyncError::InvalidRef(full_name.to_string()));
        };
        if name.is_empty() {
            return Err(SyncError::InvalidRef(full_name.to_string()));
        }
        let kind = match kind {
            "heads" => RefKind::Head,
            "tags" => RefKind::Tag,
            "remotes" => RefKind::Remote,
            _ => RefKind::Other,
        };
        Ok(Self {
            full_name: full_name.to_string(),
            kind,
            name: name.to_string(),
        })
    }

    pub fn is_branch(&self) -> bool {
        self.kind == RefKind::Head
    }
}

impl fmt::Display for PushRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

// ---------------------------------------------------------------------------
// Changes
// ---------------------------------------------------------------------------

/// What happened to a path between two revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeStatus {
    Added,
    Modified,
    Deleted,
}

impl ChangeStatus {
    /// The single-letter code used by `git diff --name-status`.
    pub fn code(&self) -> char {
        match self {
            Self::Added => 'A',
            Self::Modified => 'M',
            Self::Deleted => 'D',
        }
    }
}

/// One path touched by a push, relative to the repository root with `/`
/// separators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub status: ChangeStatus,
    pub path: String,
}

impl ChangeEntry {
    pub fn new(status: ChangeStatus, path: impl Into<String>) -> Self {
        Self {
            status,
            path: path.into(),
        }
    }
}

impl fmt::Display for ChangeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}  {}", self.status.code(), self.path)
    }
}

/// Orders repository-relative paths component by component, so a directory
/// sorts before everything inside it.
pub fn structural_cmp(a: &str, b: &str) -> std::cmp::Ordering {
    a.split('/').cmp(b.split('/'))
}

/// Orders absolute paths deepest first, so children come before their
/// parents. Paths at equal depth keep a stable lexical order.
pub fn children_first_cmp(a: &Path, b: &Path) -> std::cmp::Ordering {
    let depth = |p: &Path| {
        p.components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .count()
    };
    depth(b).cmp(&depth(a)).then_with(|| a.cmp(b))
}

// ---------------------------------------------------------------------------
// Commit metadata
// ---------------------------------------------------------------------------

/// Who pushed and what they said, for one revision range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitMetadata {
    pub committer: String,
    /// Commit messages, oldest first.
    pub comments: Vec<String>,
}

// ---------------------------------------------------------------------------
// ClearCase element state
// ---------------------------------------------------------------------------

/// Versioning state of a single path in the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementState {
    Unversioned,
    CheckedIn,
    CheckedOut,
}

impl fmt::Display for ElementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unversioned => write!(f, "unversioned"),
            Self::CheckedIn => write!(f, "checked_in"),
            Self::CheckedOut => write!(f, "checked_out"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_null_revision() {
        assert!(Revision::null().is_null());
        assert!(Revision::new("0".repeat(64)).is_null());
        assert!(!Revision::new("abc123").is_null());
        assert!(!Revision::new("").is_null());
        assert_eq!(Revision::new("0123456789abcdef").short(), "01234567");
        assert_eq!(Revision::new("ab").short(), "ab");
    }

    #[test]
    fn test_parse_push_ref() {
        let r = PushRef::parse("refs/heads/master").unwrap();
        assert_eq!(r.kind, RefKind::Head);
        assert_eq!(r.name, "master");
        assert!(r.is_branch());

        let r = PushRef::parse("refs/heads/release/1.0").unwrap();
        assert_eq!(r.name, "release/1.0");

        let r = PushRef::parse("refs/tags/v1").unwrap();
        assert_eq!(r.kind, RefKind::Tag);
        assert!(!r.is_branch());

        assert_eq!(PushRef::parse("refs/notes/x").unwrap().kind, RefKind::Other);
        assert!(PushRef::parse("heads/master").is_err());
        assert!(PushRef::parse("refs/heads/").is_err());
        assert!(PushRef::parse("refs/heads").is_err());
    }

    #[test]
    fn test_structural_ordering() {
        let mut paths = vec!["dir1/dir2/file", "dir1", "b.txt", "dir1/dir2", "a/z"];
        paths.sort_by(|a, b| structural_cmp(a, b));
        assert_eq!(paths, vec!["a/z", "b.txt", "dir1", "dir1/dir2", "dir1/dir2/file"]);
    }

    #[test]
    fn test_children_first_ordering() {
        let mut paths = vec![
            PathBuf::from("/view/a"),
            PathBuf::from("/view/a/b/c.txt"),
            PathBuf::from("/view/z"),
            PathBuf::from("/view/a/b"),
        ];
        paths.sort_by(|a, b| children_first_cmp(a, b));
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/view/a/b/c.txt"),
                PathBuf::from("/view/a/b"),
                PathBuf::from("/view/a"),
                PathBuf::from("/view/z"),
            ]
        );
    }

    #[test]
    fn test_change_entry_display() {
        let entry = ChangeEntry::new(ChangeStatus::Deleted, "src/old.c");
        assert_eq!(entry.to_string(), "D  src/old.c");
    }
}
