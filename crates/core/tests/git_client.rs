mod common;

use common::{commit_all, write_file};
use git2::Repository;
use git2cc_core::errors::GitError;
use git2cc_core::git::GitClient;
use git2cc_core::models::{ChangeEntry, ChangeStatus, Revision};

fn rev(oid: git2::Oid) -> Revision {
    Revision::new(oid.to_string())
}

#[test]
fn test_changes_comments_and_committer() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    write_file(dir.path(), "a.txt", "1");
    write_file(dir.path(), "dir/b.txt", "b");
    let c0 = commit_all(&repo, "initial", "alice");

    write_file(dir.path(), "a.txt", "2");
    write_file(dir.path(), "dir/c.txt", "c");
    std::fs::remove_file(dir.path().join("dir/b.txt")).unwrap();
    let _c1 = commit_all(&repo, "first change @REL_1\n", "alice");

    write_file(dir.path(), "e.txt", "e");
    let c2 = commit_all(&repo, "second change", "bob");

    let client = GitClient::new(dir.path()).unwrap();
    let changes = client.changes(&rev(c0), &rev(c2)).unwrap();
    assert_eq!(
        changes,
        vec![
            ChangeEntry::new(ChangeStatus::Modified, "a.txt"),
            ChangeEntry::new(ChangeStatus::Deleted, "dir/b.txt"),
            ChangeEntry::new(ChangeStatus::Added, "dir/c.txt"),
            ChangeEntry::new(ChangeStatus::Added, "e.txt"),
        ]
    );

    let comments = client.comments(&rev(c0), &rev(c2)).unwrap();
    assert_eq!(comments, vec!["first change @REL_1", "second change"]);

    assert_eq!(client.committer(&rev(c2)).unwrap(), "bob");
    let metadata = client.metadata(&rev(c0), &rev(c2)).unwrap();
    assert_eq!(metadata.committer, "bob");
    assert_eq!(metadata.comments.len(), 2);
}

#[test]
fn test_list_deletions_includes_directories() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    write_file(dir.path(), "keep.txt", "k");
    write_file(dir.path(), "old/sub/x.txt", "x");
    write_file(dir.path(), "old/y.txt", "y");
    write_file(dir.path(), "mixed/z.txt", "z");
    write_file(dir.path(), "mixed/w.txt", "w");
    let c0 = commit_all(&repo, "initial", "alice");

    std::fs::remove_dir_all(dir.path().join("old")).unwrap();
    std::fs::remove_file(dir.path().join("mixed/z.txt")).unwrap();
    let c1 = commit_all(&repo, "prune", "alice");

    let client = GitClient::new(dir.path()).unwrap();
    let deletions = client.list_deletions(&rev(c0), &rev(c1)).unwrap();
    assert_eq!(
        deletions,
        vec!["mixed/z.txt", "old", "old/sub", "old/sub/x.txt", "old/y.txt"]
    );
}

#[test]
fn test_range_queries_reject_null_old() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    write_file(dir.path(), "a.txt", "1");
    let c0 = commit_all(&repo, "initial", "alice");

    let client = GitClient::new(dir.path()).unwrap();
    assert!(matches!(
        client.comments(&Revision::null(), &rev(c0)),
        Err(GitError::NullRevisionRange(_))
    ));
    assert!(matches!(
        client.list_deletions(&Revision::null(), &rev(c0)),
        Err(GitError::NullRevisionRange(_))
    ));
}
