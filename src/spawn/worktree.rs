#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

//! Workspace isolation through git worktrees. Each agent gets a fresh
//! checkout under `<project>/.worktrees/` on its own branch, based on the
//! first dependency-parent branch when one exists.

use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::warn;

use crate::error::{ArchitectError, Result};
use crate::types::AgentId;

#[must_use]
pub fn branch_name(agent_id: &AgentId, task_id: i64) -> String {
    format!("agent/{}/task-{task_id}", agent_id.short())
}

#[must_use]
pub fn worktree_path(project_dir: &Path, agent_id: &AgentId) -> PathBuf {
    project_dir
        .join(".worktrees")
        .join(format!("agent-{}", agent_id.short()))
}

async fn git(dir: &Path, args: &[&str]) -> Result<std::process::Output> {
    Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .await
        .map_err(|e| ArchitectError::Spawn(format!("git {}: {e}", args.join(" "))))
}

/// Branch checked out in a worktree path.
async fn checked_out_branch(project_dir: &Path, worktree: &str) -> Result<String> {
    let path = if Path::new(worktree).is_absolute() {
        PathBuf::from(worktree)
    } else {
        project_dir.join(worktree)
    };
    let output = git(&path, &["rev-parse", "--abbrev-ref", "HEAD"]).await?;
    if !output.status.success() {
        return Err(ArchitectError::Spawn(format!(
            "cannot resolve branch of worktree {worktree}"
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Current branch of the project repository, falling back to `main`.
async fn default_branch(project_dir: &Path) -> String {
    match git(project_dir, &["rev-parse", "--abbrev-ref", "HEAD"]).await {
        Ok(output) if output.status.success() => {
            let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if branch.is_empty() {
                "main".to_string()
            } else {
                branch
            }
        }
        _ => "main".to_string(),
    }
}

/// Creates the agent's worktree on a fresh branch. When dependency-parent
/// worktrees exist, bases off the first parent branch and best-effort merges
/// the rest; a failed merge is aborted and skipped so the agent still starts
/// with partial context.
pub async fn create_worktree(
    project_dir: &Path,
    agent_id: &AgentId,
    task_id: i64,
    parent_worktrees: &[String],
) -> Result<(PathBuf, String)> {
    let branch = branch_name(agent_id, task_id);
    let path = worktree_path(project_dir, agent_id);

    let mut base = default_branch(project_dir).await;
    if let Some(first) = parent_worktrees.first() {
        if let Ok(parent_branch) = checked_out_branch(project_dir, first).await {
            if !parent_branch.is_empty() {
                base = parent_branch;
            }
        }
    }

    let path_str = path.to_string_lossy().to_string();
    let output = git(
        project_dir,
        &["worktree", "add", &path_str, "-b", &branch, &base],
    )
    .await?;
    if !output.status.success() {
        return Err(ArchitectError::Spawn(format!(
            "git worktree add failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    for parent in parent_worktrees.iter().skip(1) {
        let Ok(parent_branch) = checked_out_branch(project_dir, parent).await else {
            continue;
        };
        if parent_branch.is_empty() || parent_branch == base {
            continue;
        }
        let merge = git(&path, &["merge", "--no-edit", &parent_branch]).await?;
        if !merge.status.success() {
            let _ = git(&path, &["merge", "--abort"]).await;
            warn!(
                branch = %parent_branch,
                "merge of parent branch failed, continuing with partial context"
            );
        }
    }

    Ok((path, branch))
}

pub async fn remove_worktree(project_dir: &Path, worktree: &Path) -> Result<()> {
    let path_str = worktree.to_string_lossy().to_string();
    let output = git(project_dir, &["worktree", "remove", "--force", &path_str]).await?;
    if !output.status.success() {
        return Err(ArchitectError::Spawn(format!(
            "git worktree remove failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn branch_and_path_use_short_id() {
        let agent = AgentId::new("abc12345-6789-0000-0000-000000000000");
        assert_eq!(branch_name(&agent, 42), "agent/abc12345/task-42");
        assert_eq!(
            worktree_path(Path::new("/repo"), &agent),
            PathBuf::from("/repo/.worktrees/agent-abc12345")
        );
    }
}
