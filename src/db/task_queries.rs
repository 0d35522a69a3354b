#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

use super::CoordDb;
use crate::error::{ArchitectError, Result};
use crate::types::{AgentId, RiskLevel, Task, TaskEdge, TaskStatus, TasksWithEdges};

type TaskRow = (
    i64,
    String,
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    Option<i64>,
);

fn task_from_row(row: TaskRow) -> Result<Task> {
    let (id, title, description, status, assigned_to, risk_level, output, parent_id) = row;
    Ok(Task {
        id,
        title,
        description,
        status: TaskStatus::try_from(status.as_str()).map_err(ArchitectError::Database)?,
        assigned_to,
        risk_level: RiskLevel::try_from(risk_level.as_str()).map_err(ArchitectError::Database)?,
        output,
        parent_id,
    })
}

const TASK_COLUMNS: &str =
    "id, title, description, status, assigned_to, risk_level, output, parent_id";

impl CoordDb {
    pub async fn insert_task(
        &self,
        title: &str,
        description: &str,
        risk_level: RiskLevel,
    ) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO tasks (title, description, risk_level, status)
             VALUES ($1, $2, $3, 'pending')
             RETURNING id",
        )
        .bind(title)
        .bind(description)
        .bind(risk_level.as_str())
        .fetch_one(self.pool())
        .await
        .map_err(|e| ArchitectError::Database(format!("Failed to insert task: {e}")))
    }

    pub async fn insert_edge(&self, from_task: i64, to_task: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO task_edges (from_task, to_task, edge_type) VALUES ($1, $2, 'blocks')",
        )
        .bind(from_task)
        .bind(to_task)
        .execute(self.pool())
        .await
        .map(|_| ())
        .map_err(|e| {
            ArchitectError::Database(format!("Failed to insert edge {from_task}->{to_task}: {e}"))
        })
    }

    /// Tasks that are pending, unassigned and whose blockers are all
    /// completed, ascending by id. Runs against the datastore so it sees
    /// commits from every writer.
    pub async fn ready_tasks(&self) -> Result<Vec<Task>> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS}
             FROM tasks t
             WHERE t.status = 'pending'
               AND t.assigned_to IS NULL
               AND NOT EXISTS (
                   SELECT 1 FROM task_edges e
                   JOIN tasks blocker ON e.from_task = blocker.id
                   WHERE e.to_task = t.id
                     AND e.edge_type = 'blocks'
                     AND blocker.status <> 'completed'
               )
             ORDER BY t.id",
        ))
        .fetch_all(self.pool())
        .await
        .map_err(|e| ArchitectError::Database(format!("Failed to query ready tasks: {e}")))?;

        rows.into_iter().map(task_from_row).collect()
    }

    /// The atomic claim: one conditional update, at most one winner across
    /// concurrent claimants. Returns false on a contention miss.
    pub async fn claim_task(&self, task_id: i64, agent_id: &AgentId) -> Result<bool> {
        sqlx::query(
            "UPDATE tasks
             SET status = 'in_progress', assigned_to = $1, updated_at = NOW()
             WHERE id = $2 AND assigned_to IS NULL",
        )
        .bind(agent_id.value())
        .bind(task_id)
        .execute(self.pool())
        .await
        .map(|result| result.rows_affected() > 0)
        .map_err(|e| ArchitectError::Database(format!("Failed to claim task {task_id}: {e}")))
    }

    /// Terminal transition by the owning agent; a no-op when the task has
    /// been reclaimed in the meantime.
    pub async fn finish_task(
        &self,
        task_id: i64,
        agent_id: &AgentId,
        status: TaskStatus,
    ) -> Result<bool> {
        sqlx::query(
            "UPDATE tasks SET status = $1, updated_at = NOW()
             WHERE id = $2 AND assigned_to = $3",
        )
        .bind(status.as_str())
        .bind(task_id)
        .bind(agent_id.value())
        .execute(self.pool())
        .await
        .map(|result| result.rows_affected() > 0)
        .map_err(|e| ArchitectError::Database(format!("Failed to finish task {task_id}: {e}")))
    }

    /// Status/output update through the tool facade. The predicate asserts
    /// ownership; zero rows affected surfaces as `NotAssigned`.
    pub async fn update_task(
        &self,
        task_id: i64,
        agent_id: &AgentId,
        status: TaskStatus,
        output: Option<&str>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE tasks SET status = $1, output = COALESCE($2, output), updated_at = NOW()
             WHERE id = $3 AND assigned_to = $4",
        )
        .bind(status.as_str())
        .bind(output)
        .bind(task_id)
        .bind(agent_id.value())
        .execute(self.pool())
        .await
        .map_err(|e| ArchitectError::Database(format!("Failed to update task {task_id}: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(ArchitectError::NotAssigned { task_id });
        }
        Ok(())
    }

    /// Returns a task to the pool after its agent died.
    pub async fn reclaim_task(&self, task_id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE tasks SET status = 'pending', assigned_to = NULL, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(task_id)
        .execute(self.pool())
        .await
        .map(|_| ())
        .map_err(|e| ArchitectError::Database(format!("Failed to reclaim task {task_id}: {e}")))
    }

    pub async fn get_tasks(
        &self,
        status: Option<TaskStatus>,
        assigned_to: Option<&str>,
    ) -> Result<TasksWithEdges> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS}
             FROM tasks
             WHERE ($1::text IS NULL OR status = $1)
               AND ($2::text IS NULL OR assigned_to = $2)
             ORDER BY id",
        ))
        .bind(status.map(TaskStatus::as_str))
        .bind(assigned_to)
        .fetch_all(self.pool())
        .await
        .map_err(|e| ArchitectError::Database(format!("Failed to query tasks: {e}")))?;

        let tasks = rows
            .into_iter()
            .map(task_from_row)
            .collect::<Result<Vec<_>>>()?;

        if tasks.is_empty() {
            return Ok(TasksWithEdges {
                tasks,
                edges: Vec::new(),
            });
        }

        let ids: Vec<i64> = tasks.iter().map(|t| t.id).collect();
        let edges = sqlx::query_as::<_, (i64, i64, String)>(
            "SELECT from_task, to_task, edge_type
             FROM task_edges
             WHERE from_task = ANY($1) OR to_task = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(self.pool())
        .await
        .map_err(|e| ArchitectError::Database(format!("Failed to query edges: {e}")))?
        .into_iter()
        .map(|(from_task, to_task, edge_type)| TaskEdge {
            from_task,
            to_task,
            edge_type,
        })
        .collect();

        Ok(TasksWithEdges { tasks, edges })
    }

    /// Worktree paths of the agents that completed this task's direct
    /// blockers, used to base a new workspace on dependency work.
    pub async fn parent_worktrees(&self, task_id: i64) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT a.worktree_path
             FROM task_edges e
             JOIN tasks t ON e.from_task = t.id
             JOIN agents a ON t.assigned_to = a.agent_id
             WHERE e.to_task = $1
               AND e.edge_type = 'blocks'
               AND t.status = 'completed'
               AND a.worktree_path IS NOT NULL",
        )
        .bind(task_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            ArchitectError::Database(format!(
                "Failed to query parent worktrees for task {task_id}: {e}"
            ))
        })
    }

    pub async fn set_consultation_status(&self, task_id: i64, status: &str) -> Result<()> {
        sqlx::query("UPDATE tasks SET consultation_status = $1 WHERE id = $2")
            .bind(status)
            .bind(task_id)
            .execute(self.pool())
            .await
            .map(|_| ())
            .map_err(|e| {
                ArchitectError::Database(format!(
                    "Failed to update consultation status for task {task_id}: {e}"
                ))
            })
    }
}
