//! Workspace isolation against a scratch git repository. Skips itself when
//! no git binary is on the path.

use std::process::Command;

use architect::spawn::{create_worktree, remove_worktree};
use architect::AgentId;
use tempfile::TempDir;

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn scratch_repo() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let run = |args: &[&str], cwd: &std::path::Path| {
        let status = Command::new("git")
            .args(args)
            .current_dir(cwd)
            .status()
            .expect("git runs");
        assert!(status.success(), "git {args:?} failed");
    };
    run(&["init", "-q", "-b", "main"], dir.path());
    run(
        &["config", "user.email", "worktree@example.invalid"],
        dir.path(),
    );
    run(&["config", "user.name", "Worktree Test"], dir.path());
    std::fs::write(dir.path().join("README.md"), "scratch\n").expect("write");
    run(&["add", "."], dir.path());
    run(&["commit", "-q", "-m", "initial"], dir.path());
    dir
}

#[tokio::test]
async fn worktree_is_created_on_a_fresh_branch() {
    if !git_available() {
        return;
    }
    let repo = scratch_repo();
    let agent = AgentId::new("abcd1234-0000-0000-0000-000000000000");

    let (path, branch) = create_worktree(repo.path(), &agent, 7, &[])
        .await
        .expect("create worktree");

    assert_eq!(branch, "agent/abcd1234/task-7");
    assert!(path.starts_with(repo.path().join(".worktrees")));
    assert!(path.join("README.md").exists());

    remove_worktree(repo.path(), &path).await.expect("remove");
    assert!(!path.exists());
}

#[tokio::test]
async fn dependency_parent_work_is_visible_in_child_worktree() {
    if !git_available() {
        return;
    }
    let repo = scratch_repo();

    // Parent agent commits a file on its branch.
    let parent = AgentId::new("11111111-0000-0000-0000-000000000000");
    let (parent_path, _) = create_worktree(repo.path(), &parent, 1, &[])
        .await
        .expect("parent worktree");
    std::fs::write(parent_path.join("module.rs"), "pub fn done() {}\n").expect("write");
    for args in [
        vec!["add", "."],
        vec!["commit", "-q", "-m", "parent work"],
    ] {
        let status = Command::new("git")
            .args(&args)
            .current_dir(&parent_path)
            .status()
            .expect("git runs");
        assert!(status.success());
    }

    // Child bases off the parent branch and sees its work.
    let child = AgentId::new("22222222-0000-0000-0000-000000000000");
    let parents = vec![parent_path.to_string_lossy().to_string()];
    let (child_path, child_branch) = create_worktree(repo.path(), &child, 2, &parents)
        .await
        .expect("child worktree");

    assert_eq!(child_branch, "agent/22222222/task-2");
    assert!(child_path.join("module.rs").exists());
}
