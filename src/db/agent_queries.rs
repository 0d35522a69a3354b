#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use std::time::Duration;

use super::CoordDb;
use crate::error::{ArchitectError, Result};
use crate::types::{Agent, AgentId, AgentStatus, DeadAgent};

type AgentRow = (
    String,
    i32,
    String,
    Option<i64>,
    Option<String>,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn agent_from_row(row: AgentRow) -> Result<Agent> {
    let (agent_id, pid, status, current_task_id, worktree_path, started_at, last_heartbeat) = row;
    Ok(Agent {
        agent_id,
        pid,
        status: AgentStatus::try_from(status.as_str()).map_err(ArchitectError::Database)?,
        current_task_id,
        worktree_path,
        started_at,
        last_heartbeat,
    })
}

impl CoordDb {
    /// Inserts the durable agent row before the process exists; pid 0 until
    /// the spawn succeeds.
    pub async fn register_agent(
        &self,
        agent_id: &AgentId,
        task_id: i64,
        worktree_path: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO agents (agent_id, pid, status, current_task_id, worktree_path)
             VALUES ($1, 0, 'starting', $2, $3)",
        )
        .bind(agent_id.value())
        .bind(task_id)
        .bind(worktree_path)
        .execute(self.pool())
        .await
        .map(|_| ())
        .map_err(|e| ArchitectError::Database(format!("Failed to register agent: {e}")))
    }

    pub async fn update_agent_pid(&self, agent_id: &AgentId, pid: i32) -> Result<()> {
        sqlx::query("UPDATE agents SET pid = $1, status = 'working' WHERE agent_id = $2")
            .bind(pid)
            .bind(agent_id.value())
            .execute(self.pool())
            .await
            .map(|_| ())
            .map_err(|e| ArchitectError::Database(format!("Failed to update agent pid: {e}")))
    }

    pub async fn update_agent_status(
        &self,
        agent_id: &AgentId,
        status: AgentStatus,
    ) -> Result<()> {
        sqlx::query("UPDATE agents SET status = $1 WHERE agent_id = $2")
            .bind(status.as_str())
            .bind(agent_id.value())
            .execute(self.pool())
            .await
            .map(|_| ())
            .map_err(|e| ArchitectError::Database(format!("Failed to update agent status: {e}")))
    }

    /// The liveness sweep: one statement flips every stale working or
    /// blocked agent to dead and returns what it was holding.
    pub async fn mark_dead_agents(&self, timeout: Duration) -> Result<Vec<DeadAgent>> {
        let interval = format!("{} seconds", timeout.as_secs());
        let rows = sqlx::query_as::<_, (String, Option<i64>)>(
            "UPDATE agents SET status = 'dead'
             WHERE status IN ('working', 'blocked')
               AND last_heartbeat < NOW() - $1::interval
             RETURNING agent_id, current_task_id",
        )
        .bind(interval)
        .fetch_all(self.pool())
        .await
        .map_err(|e| ArchitectError::Database(format!("Failed to mark dead agents: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|(agent_id, current_task_id)| DeadAgent {
                agent_id: AgentId::new(agent_id),
                current_task_id,
            })
            .collect())
    }

    pub async fn heartbeat(&self, agent_id: &AgentId) -> Result<()> {
        sqlx::query("UPDATE agents SET last_heartbeat = NOW() WHERE agent_id = $1")
            .bind(agent_id.value())
            .execute(self.pool())
            .await
            .map(|_| ())
            .map_err(|e| ArchitectError::Database(format!("Failed to record heartbeat: {e}")))
    }

    pub async fn get_agents(&self, status: Option<AgentStatus>) -> Result<Vec<Agent>> {
        let rows = sqlx::query_as::<_, AgentRow>(
            "SELECT agent_id, pid, status, current_task_id, worktree_path,
                    started_at, last_heartbeat
             FROM agents
             WHERE ($1::text IS NULL OR status = $1)
             ORDER BY started_at",
        )
        .bind(status.map(AgentStatus::as_str))
        .fetch_all(self.pool())
        .await
        .map_err(|e| ArchitectError::Database(format!("Failed to query agents: {e}")))?;

        rows.into_iter().map(agent_from_row).collect()
    }
}
