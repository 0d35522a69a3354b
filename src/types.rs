use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque agent identity. Generated from 128 bits of randomness at spawn
/// time; the same string keys both the durable `agents` row and the
/// in-memory registry handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(String);

impl AgentId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.0
    }

    /// First eight characters, used in branch names, worktree paths and logs.
    #[must_use]
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map_or(self.0.len(), |(idx, _)| idx);
        &self.0[..end]
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Blocked,
}

impl TaskStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
        }
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = String;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "blocked" => Ok(Self::Blocked),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Single enumeration for agent liveness. Exit 0 maps to `Idle`; non-zero
/// exit, spawn failure and stale heartbeat all map to `Dead`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Starting,
    Working,
    Blocked,
    Idle,
    Dead,
}

impl AgentStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Working => "working",
            Self::Blocked => "blocked",
            Self::Idle => "idle",
            Self::Dead => "dead",
        }
    }
}

impl TryFrom<&str> for AgentStatus {
    type Error = String;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        match value {
            "starting" => Ok(Self::Starting),
            "working" => Ok(Self::Working),
            "blocked" => Ok(Self::Blocked),
            "idle" => Ok(Self::Idle),
            "dead" => Ok(Self::Dead),
            other => Err(format!("unknown agent status: {other}")),
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl TryFrom<&str> for RiskLevel {
    type Error = String;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        match value {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown risk level: {other}")),
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MsgType {
    Update,
    Question,
    Answer,
    Blocker,
    Discovery,
    Decision,
}

impl MsgType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Question => "question",
            Self::Answer => "answer",
            Self::Blocker => "blocker",
            Self::Discovery => "discovery",
            Self::Decision => "decision",
        }
    }
}

impl TryFrom<&str> for MsgType {
    type Error = String;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        match value {
            "update" => Ok(Self::Update),
            "question" => Ok(Self::Question),
            "answer" => Ok(Self::Answer),
            "blocker" => Ok(Self::Blocker),
            "discovery" => Ok(Self::Discovery),
            "decision" => Ok(Self::Decision),
            other => Err(format!("unknown message type: {other}")),
        }
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    pub risk_level: RiskLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEdge {
    pub from_task: i64,
    pub to_task: i64,
    pub edge_type: String,
}

/// Tasks together with the edges touching them, as returned by `get_tasks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksWithEdges {
    pub tasks: Vec<Task>,
    pub edges: Vec<TaskEdge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: String,
    pub pid: i32,
    pub status: AgentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_task_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worktree_path: Option<String>,
    pub started_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub agent_id: String,
    pub channel: String,
    pub content: String,
    pub msg_type: MsgType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_task_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEntry {
    pub agent_id: String,
    pub domain: String,
    pub key_name: String,
    pub value: String,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub id: i64,
    pub agent_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub domain: String,
    pub decision: String,
    pub rationale: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternatives: Option<String>,
    pub risk_level: RiskLevel,
    pub created_at: DateTime<Utc>,
}

/// An agent caught by the liveness sweep, with the task it must give back.
#[derive(Debug, Clone)]
pub struct DeadAgent {
    pub agent_id: AgentId,
    pub current_task_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_id_short_is_prefix() {
        let id = AgentId::new("abc12345-6789-0000-0000-000000000000");
        assert_eq!(id.short(), "abc12345");
        let tiny = AgentId::new("ab");
        assert_eq!(tiny.short(), "ab");
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(AgentId::generate(), AgentId::generate());
    }

    #[test]
    fn task_status_round_trip() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::InProgress,
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::Blocked,
        ] {
            assert_eq!(TaskStatus::try_from(status.as_str()), Ok(status));
        }
        assert!(TaskStatus::try_from("done").is_err());
    }

    #[test]
    fn agent_status_round_trip() {
        for status in [
            AgentStatus::Starting,
            AgentStatus::Working,
            AgentStatus::Blocked,
            AgentStatus::Idle,
            AgentStatus::Dead,
        ] {
            assert_eq!(AgentStatus::try_from(status.as_str()), Ok(status));
        }
    }

    #[test]
    fn enums_serialize_as_wire_strings() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).ok(),
            Some("\"in_progress\"".to_string())
        );
        assert_eq!(
            serde_json::to_string(&MsgType::Blocker).ok(),
            Some("\"blocker\"".to_string())
        );
    }
}
