#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

//! Postgres-backed implementation of the coordination tool surface. The
//! tool list is exhaustive; anything else is an INVALID error.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use super::{ToolFacade, ToolFuture};
use crate::db::CoordDb;
use crate::error::{ArchitectError, Result};
use crate::types::{AgentId, AgentStatus, MsgType, RiskLevel, TaskStatus};

const AGENT_ID_ENV: &str = "ARCHITECT_AGENT_ID";
const BRANCH_ENV: &str = "ARCHITECT_BRANCH";

const DEFAULT_MESSAGE_LIMIT: i64 = 50;

pub struct PgToolFacade {
    db: CoordDb,
    agent_id: AgentId,
    branch: Option<String>,
}

fn arg_str<'a>(args: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ArchitectError::Config(format!("{key} is required")))
}

fn arg_opt_str<'a>(args: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn arg_i64(args: &Map<String, Value>, key: &str) -> Result<i64> {
    args.get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| ArchitectError::Config(format!("{key} is required")))
}

fn arg_opt_i64(args: &Map<String, Value>, key: &str) -> Option<i64> {
    args.get(key).and_then(Value::as_i64)
}

fn arg_f64_or(args: &Map<String, Value>, key: &str, default: f64) -> f64 {
    args.get(key).and_then(Value::as_f64).unwrap_or(default)
}

impl PgToolFacade {
    /// Reads the agent identity from process environment. The facade
    /// refuses to operate without one.
    pub fn identity_from_env() -> Result<(AgentId, Option<String>)> {
        let agent_id = std::env::var(AGENT_ID_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                ArchitectError::Config(format!("{AGENT_ID_ENV} must be set in the environment"))
            })?;
        let branch = std::env::var(BRANCH_ENV).ok().filter(|v| !v.is_empty());
        Ok((AgentId::new(agent_id), branch))
    }

    pub fn from_env(db: CoordDb) -> Result<Self> {
        let (agent_id, branch) = Self::identity_from_env()?;
        Ok(Self {
            db,
            agent_id,
            branch,
        })
    }

    #[must_use]
    pub fn new(db: CoordDb, agent_id: AgentId, branch: Option<String>) -> Self {
        Self {
            db,
            agent_id,
            branch,
        }
    }

    async fn post_message(&self, args: &Map<String, Value>) -> Result<Value> {
        let channel = arg_opt_str(args, "channel").unwrap_or("general");
        let content = arg_str(args, "content")?;
        let msg_type = MsgType::try_from(arg_str(args, "msg_type")?)
            .map_err(ArchitectError::Config)?;
        let ref_task_id = arg_opt_i64(args, "ref_task_id");

        let message = self
            .db
            .post_message(self.agent_id.value(), channel, content, msg_type, ref_task_id)
            .await?;
        Ok(json!({"id": message.id, "created_at": message.created_at}))
    }

    async fn read_messages(&self, args: &Map<String, Value>) -> Result<Value> {
        let channel = arg_opt_str(args, "channel");
        let since = match arg_opt_str(args, "since") {
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(raw)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| ArchitectError::Config(format!("invalid 'since' timestamp: {e}")))?,
            ),
            None => None,
        };
        let limit = arg_opt_i64(args, "limit").unwrap_or(DEFAULT_MESSAGE_LIMIT);

        let messages = self.db.read_messages(channel, since, limit).await?;
        Ok(serde_json::to_value(messages)?)
    }

    async fn read_context(&self, args: &Map<String, Value>) -> Result<Value> {
        let entries = self.db.read_context(arg_opt_str(args, "domain")).await?;
        Ok(serde_json::to_value(entries)?)
    }

    async fn write_context(&self, args: &Map<String, Value>) -> Result<Value> {
        let domain = arg_str(args, "domain")?;
        let key = arg_str(args, "key")?;
        let value = arg_str(args, "value")?;
        let confidence = arg_f64_or(args, "confidence", 1.0);
        let source_file = arg_opt_str(args, "source_file");

        let id = self
            .db
            .write_context(
                self.agent_id.value(),
                domain,
                key,
                value,
                confidence,
                source_file,
            )
            .await?;
        Ok(json!({"id": id, "domain": domain, "key": key}))
    }

    async fn get_tasks(&self, args: &Map<String, Value>) -> Result<Value> {
        let status = match arg_opt_str(args, "status") {
            Some(raw) => Some(TaskStatus::try_from(raw).map_err(ArchitectError::Config)?),
            None => None,
        };
        let result = self
            .db
            .get_tasks(status, arg_opt_str(args, "assigned_to"))
            .await?;
        Ok(serde_json::to_value(result)?)
    }

    async fn claim_task(&self, args: &Map<String, Value>) -> Result<Value> {
        let task_id = arg_i64(args, "task_id")?;
        if !self.db.claim_task(task_id, &self.agent_id).await? {
            return Err(ArchitectError::NotAssigned { task_id });
        }
        Ok(json!({"claimed": task_id}))
    }

    async fn update_task(&self, args: &Map<String, Value>) -> Result<Value> {
        let task_id = arg_i64(args, "task_id")?;
        let status = TaskStatus::try_from(arg_str(args, "status")?)
            .map_err(ArchitectError::Config)?;
        if status == TaskStatus::Pending {
            return Err(ArchitectError::Config(
                "tasks cannot be moved back to pending; that is the reclaim path".to_string(),
            ));
        }
        self.db
            .update_task(task_id, &self.agent_id, status, arg_opt_str(args, "output"))
            .await?;
        Ok(json!({"id": task_id, "status": status.as_str()}))
    }

    async fn write_decision(&self, args: &Map<String, Value>) -> Result<Value> {
        let domain = arg_str(args, "domain")?;
        let decision = arg_str(args, "decision")?;
        let rationale = arg_str(args, "rationale")?;
        let alternatives = arg_opt_str(args, "alternatives");
        let risk_level = match arg_opt_str(args, "risk_level") {
            Some(raw) => RiskLevel::try_from(raw).map_err(ArchitectError::Config)?,
            None => RiskLevel::Low,
        };

        let id = self
            .db
            .write_decision(
                self.agent_id.value(),
                self.branch.as_deref(),
                domain,
                decision,
                rationale,
                alternatives,
                risk_level,
            )
            .await?;
        Ok(json!({"id": id, "domain": domain}))
    }

    async fn check_decisions(&self, args: &Map<String, Value>) -> Result<Value> {
        let decisions = self.db.check_decisions(arg_str(args, "domain")?).await?;
        Ok(serde_json::to_value(decisions)?)
    }

    async fn heartbeat(&self) -> Result<Value> {
        self.db.heartbeat(&self.agent_id).await?;
        Ok(json!({"agent_id": self.agent_id.value()}))
    }

    async fn get_agents(&self, args: &Map<String, Value>) -> Result<Value> {
        let status = match arg_opt_str(args, "status") {
            Some(raw) => Some(AgentStatus::try_from(raw).map_err(ArchitectError::Config)?),
            None => None,
        };
        let agents = self.db.get_agents(status).await?;
        Ok(serde_json::to_value(agents)?)
    }

    async fn dispatch(&self, name: &str, args: &Map<String, Value>) -> Result<Value> {
        match name {
            "post_message" => self.post_message(args).await,
            "read_messages" => self.read_messages(args).await,
            "read_context" => self.read_context(args).await,
            "write_context" => self.write_context(args).await,
            "get_tasks" => self.get_tasks(args).await,
            "claim_task" => self.claim_task(args).await,
            "update_task" => self.update_task(args).await,
            "write_decision" => self.write_decision(args).await,
            "check_decisions" => self.check_decisions(args).await,
            "heartbeat" => self.heartbeat().await,
            "get_agents" => self.get_agents(args).await,
            other => Err(ArchitectError::Config(format!("unknown tool: {other}"))),
        }
    }
}

impl ToolFacade for PgToolFacade {
    fn handle_tool_call<'a>(
        &'a self,
        name: &'a str,
        args: &'a Map<String, Value>,
    ) -> ToolFuture<'a> {
        Box::pin(self.dispatch(name, args))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn args(raw: &str) -> Map<String, Value> {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn required_string_arguments_are_enforced() {
        let map = args(r#"{"content": "hello"}"#);
        assert_eq!(arg_str(&map, "content").unwrap(), "hello");
        assert!(arg_str(&map, "msg_type").is_err());
    }

    #[test]
    fn optional_arguments_treat_empty_as_absent() {
        let map = args(r#"{"channel": "", "domain": "auth"}"#);
        assert_eq!(arg_opt_str(&map, "channel"), None);
        assert_eq!(arg_opt_str(&map, "domain"), Some("auth"));
    }

    #[test]
    fn numeric_arguments_parse_from_json_numbers() {
        let map = args(r#"{"task_id": 7, "confidence": 0.5}"#);
        assert_eq!(arg_i64(&map, "task_id").unwrap(), 7);
        assert!((arg_f64_or(&map, "confidence", 1.0) - 0.5).abs() < f64::EPSILON);
        assert!((arg_f64_or(&map, "missing", 1.0) - 1.0).abs() < f64::EPSILON);
        assert!(arg_i64(&map, "missing").is_err());
    }
}
