//! End-to-end exercise of the Git Workspace component (spec §4.1) against a
//! real local repository, in the same spirit as the teacher's
//! `mcp_stdio_smoke.rs` (spawn real processes, assert on their effects)
//! rather than mocking `git` itself.

use std::process::Command;
use wikiforge_core::git;

fn run(dir: &std::path::Path, args: &[&str]) {
    let status = Command::new("git").args(args).current_dir(dir).status().expect("spawn git");
    assert!(status.success(), "git {args:?} failed in {}", dir.display());
}

fn init_remote(dir: &std::path::Path) {
    run(dir, &["init", "--initial-branch=main"]);
    run(dir, &["config", "user.email", "bot@example.com"]);
    run(dir, &["config", "user.name", "bot"]);
    std::fs::write(dir.join("README.md"), "# toy\n").unwrap();
    run(dir, &["add", "."]);
    run(dir, &["commit", "-m", "initial commit"]);
}

#[tokio::test]
async fn clone_then_inspect_then_pull_round_trip() {
    let remote = tempfile::tempdir().unwrap();
    init_remote(remote.path());

    let workspace = tempfile::tempdir().unwrap();
    let local_path = workspace.path().join("acme/toy/main");

    let remote_url = remote.path().to_string_lossy().into_owned();
    let clone_result = git::clone(&remote_url, None, "main", &local_path).await.expect("clone");
    assert!(local_path.join("README.md").exists());
    assert_eq!(clone_result.branch, "main");

    let metadata = git::inspect(&local_path).await.expect("inspect should find a valid repo");
    assert_eq!(metadata.head_commit, clone_result.head_commit);
    assert_eq!(metadata.branch, "main");

    let branches = git::branches(&local_path).await.expect("branches");
    assert!(branches.contains(&"main".to_string()));

    let bytes = git::read_file(&local_path, "README.md").await.expect("read_file");
    assert_eq!(String::from_utf8(bytes).unwrap(), "# toy\n");

    // New commit upstream, then pull + diff should surface the change.
    std::fs::write(remote.path().join("src.py"), "print('hi')\n").unwrap();
    run(remote.path(), &["add", "."]);
    run(remote.path(), &["commit", "-m", "add src.py"]);

    let pull_result = git::pull(&local_path, Some(&clone_result.head_commit)).await.expect("pull");
    assert_eq!(pull_result.commits.len(), 1);
    assert_eq!(pull_result.commits[0].message, "add src.py");

    let changed = git::changed_files_between(&local_path, &clone_result.head_commit, &pull_result.head_commit)
        .await
        .expect("changed_files_between");
    assert_eq!(changed, vec!["src.py".to_string()]);
}

#[tokio::test]
async fn reclone_over_stale_directory_recovers() {
    let remote = tempfile::tempdir().unwrap();
    init_remote(remote.path());

    let workspace = tempfile::tempdir().unwrap();
    let local_path = workspace.path().join("acme/toy/main");
    std::fs::create_dir_all(&local_path).unwrap();
    std::fs::write(local_path.join("not-a-repo.txt"), "junk").unwrap();

    let remote_url = remote.path().to_string_lossy().into_owned();
    let result = git::clone(&remote_url, None, "main", &local_path).await.expect("clone over stale dir");
    assert!(local_path.join("README.md").exists());
    assert!(!local_path.join("not-a-repo.txt").exists());
    assert!(!result.head_commit.is_empty());
}

#[tokio::test]
async fn inspect_returns_none_for_non_repo() {
    let dir = tempfile::tempdir().unwrap();
    assert!(git::inspect(dir.path()).await.is_none());
}
