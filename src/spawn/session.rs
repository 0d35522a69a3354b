#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

//! Agent session lifecycle: workspace creation, atomic claim, process
//! launch, and the completion watcher that records the terminal state.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{
    generate_instructions, generate_manifest, registry::AgentRegistry, worktree,
};
use crate::db::CoordDb;
use crate::error::{ArchitectError, Result};
use crate::types::{AgentId, AgentStatus, Task, TaskStatus};

/// Permissions granted to spawned agents.
const AGENT_ALLOWED_TOOLS: &str = "Edit,Write,Read,Glob,Grep,Bash,mcp__architect-pg__*";

#[derive(Debug, Clone)]
pub struct SpawnConfig {
    /// Program launched per agent; tests substitute a stub.
    pub agent_program: String,
    /// Absolute path of the coordination tool-server binary.
    pub tool_binary: std::path::PathBuf,
    pub database_url: String,
    /// Contents of the project's own CLAUDE.md, embedded in instructions.
    pub project_conventions: String,
}

/// Spawns one agent for a ready task. Returns `Ok(None)` on a contention
/// miss: another claimant won, the workspace is removed, nothing to do.
pub async fn spawn_session(
    db: &CoordDb,
    registry: &Arc<AgentRegistry>,
    task: &Task,
    project_dir: &Path,
    config: &SpawnConfig,
    shutdown: &CancellationToken,
) -> Result<Option<AgentId>> {
    let agent_id = AgentId::generate();

    let parents = db.parent_worktrees(task.id).await?;
    let (worktree_path, branch) =
        worktree::create_worktree(project_dir, &agent_id, task.id, &parents).await?;
    let worktree_str = worktree_path.to_string_lossy().to_string();

    db.register_agent(&agent_id, task.id, &worktree_str).await?;

    if !db.claim_task(task.id, &agent_id).await? {
        // Another agent won the claim; clean up quietly.
        if let Err(e) = worktree::remove_worktree(project_dir, &worktree_path).await {
            warn!(%e, "failed to remove worktree after lost claim");
        }
        info!(task = task.id, "task already claimed, skipping");
        return Ok(None);
    }

    let instructions = generate_instructions(
        &agent_id,
        task,
        &branch,
        &worktree_str,
        &config.project_conventions,
    );
    tokio::fs::write(worktree_path.join("CLAUDE.md"), instructions).await?;

    let manifest = generate_manifest(&agent_id, &branch, &config.tool_binary, &config.database_url)?;
    tokio::fs::write(worktree_path.join(".mcp.json"), manifest).await?;

    let log_file = std::fs::File::create(worktree_path.join("agent.log"))?;
    let log_stderr = log_file.try_clone()?;

    let spawned = Command::new(&config.agent_program)
        .arg("--allowedTools")
        .arg(AGENT_ALLOWED_TOOLS)
        .current_dir(&worktree_path)
        .env_remove("CLAUDECODE")
        .stdin(Stdio::piped())
        .stdout(Stdio::from(log_file))
        .stderr(Stdio::from(log_stderr))
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            // ChildSpawnFailure: give everything back and report.
            if let Err(cleanup) = worktree::remove_worktree(project_dir, &worktree_path).await {
                warn!(%cleanup, "failed to remove worktree after spawn failure");
            }
            let _ = db.update_agent_status(&agent_id, AgentStatus::Dead).await;
            let _ = db.reclaim_task(task.id).await;
            return Err(ArchitectError::Spawn(format!(
                "{}: {e}",
                config.agent_program
            )));
        }
    };

    let pid = child.id().unwrap_or(0);
    db.update_agent_pid(&agent_id, pid as i32).await?;

    let stdin = child.stdin.take().ok_or_else(|| {
        ArchitectError::Spawn("child process has no stdin pipe".to_string())
    })?;
    registry.register(&agent_id, stdin, pid).await;

    let initial_prompt = format!(
        "You are working on task #{}: {:?}\n\n{}\n",
        task.id, task.title, task.description
    );
    if let Err(e) = registry.send(&agent_id, &initial_prompt).await {
        warn!(agent = agent_id.short(), %e, "failed to write initial prompt");
    }

    // Completion watcher. Exit bookkeeping runs after wait() regardless of
    // orchestrator shutdown, so terminal statuses are always recorded.
    let watcher_db = db.clone();
    let watcher_registry = Arc::clone(registry);
    let watcher_agent = agent_id.clone();
    let watcher_shutdown = shutdown.clone();
    let task_id = task.id;
    tokio::spawn(async move {
        let status = tokio::select! {
            status = child.wait() => status,
            () = watcher_shutdown.cancelled() => {
                let _ = child.start_kill();
                child.wait().await
            }
        };

        watcher_registry.deregister(&watcher_agent).await;

        let exited_cleanly = matches!(&status, Ok(s) if s.success());
        if exited_cleanly {
            info!(agent = watcher_agent.short(), task = task_id, "agent completed");
            if let Err(e) = watcher_db
                .update_agent_status(&watcher_agent, AgentStatus::Idle)
                .await
            {
                error!(%e, "failed to mark agent idle");
            }
            if let Err(e) = watcher_db
                .finish_task(task_id, &watcher_agent, TaskStatus::Completed)
                .await
            {
                error!(%e, "failed to complete task");
            }
        } else {
            warn!(agent = watcher_agent.short(), task = task_id, ?status, "agent exited abnormally");
            if let Err(e) = watcher_db
                .update_agent_status(&watcher_agent, AgentStatus::Dead)
                .await
            {
                error!(%e, "failed to mark agent dead");
            }
            if let Err(e) = watcher_db
                .finish_task(task_id, &watcher_agent, TaskStatus::Failed)
                .await
            {
                error!(%e, "failed to fail task");
            }
        }
    });

    info!(
        agent = agent_id.short(),
        task = task.id,
        title = %task.title,
        "spawned agent"
    );
    Ok(Some(agent_id))
}

/// Cascade step: spawn an agent for every currently ready task. Per-task
/// failures are logged and skipped; the readiness recompute re-offers them.
pub async fn spawn_ready(
    db: &CoordDb,
    registry: &Arc<AgentRegistry>,
    project_dir: &Path,
    config: &SpawnConfig,
    shutdown: &CancellationToken,
) -> Result<usize> {
    let ready = db.ready_tasks().await?;
    let mut spawned = 0;
    for task in &ready {
        match spawn_session(db, registry, task, project_dir, config, shutdown).await {
            Ok(Some(_)) => spawned += 1,
            Ok(None) => {}
            Err(e) => error!(task = task.id, %e, "failed to spawn session"),
        }
    }
    Ok(spawned)
}
