#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

//! Review staging for finished agent branches and the merge back to the
//! default branch. Conflict resolution stays with the human.

use std::path::Path;
use tokio::process::Command;

use crate::db::CoordDb;
use crate::error::{ArchitectError, Result};

/// A completed branch ready for human review.
#[derive(Debug, Clone)]
pub struct BranchSummary {
    pub agent_id: String,
    pub worktree_path: Option<String>,
    pub task_title: String,
    pub output: String,
}

/// Lists completed tasks joined with the agents that carried them.
pub async fn stage_for_review(db: &CoordDb) -> Result<Vec<BranchSummary>> {
    let rows = sqlx::query_as::<_, (String, Option<String>, String, String)>(
        "SELECT a.agent_id, a.worktree_path, t.title, COALESCE(t.output, '')
         FROM agents a JOIN tasks t ON a.current_task_id = t.id
         WHERE t.status = 'completed'
         ORDER BY t.id",
    )
    .fetch_all(db.pool())
    .await
    .map_err(|e| ArchitectError::Database(format!("Failed to stage branches for review: {e}")))?;

    Ok(rows
        .into_iter()
        .map(|(agent_id, worktree_path, task_title, output)| BranchSummary {
            agent_id,
            worktree_path,
            task_title,
            output,
        })
        .collect())
}

/// Merges an agent branch into the current branch with an explicit merge
/// commit.
pub async fn merge_branch(project_dir: &Path, branch_name: &str) -> Result<()> {
    let message = format!("Merge {branch_name} (automated agent merge)");
    let output = Command::new("git")
        .args(["merge", "--no-ff", branch_name, "-m", &message])
        .current_dir(project_dir)
        .output()
        .await
        .map_err(|e| ArchitectError::Spawn(format!("git merge: {e}")))?;

    if !output.status.success() {
        return Err(ArchitectError::Spawn(format!(
            "merge of {branch_name} failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}
