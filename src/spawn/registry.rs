#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

//! Process-local registry of live agent handles. Stdin pipes are not
//! persistable; this map ties in-flight processes to the scheduler's
//! address space, joined to the durable agent rows only by the id string.

use serde::Serialize;
use std::collections::HashMap;
use tokio::io::AsyncWriteExt;
use tokio::process::ChildStdin;
use tokio::sync::{Mutex, RwLock};

use crate::error::{ArchitectError, Result};
use crate::types::AgentId;

struct AgentHandle {
    stdin: Mutex<ChildStdin>,
    pid: u32,
}

#[derive(Default)]
pub struct AgentRegistry {
    agents: RwLock<HashMap<String, AgentHandle>>,
}

#[derive(Serialize)]
struct StreamMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    message: StreamContent<'a>,
}

#[derive(Serialize)]
struct StreamContent<'a> {
    role: &'static str,
    content: &'a str,
}

/// One line of stream-json: `{"type":"user","message":{...}}\n`.
fn frame_user_message(text: &str) -> Result<Vec<u8>> {
    let mut data = serde_json::to_vec(&StreamMessage {
        kind: "user",
        message: StreamContent {
            role: "user",
            content: text,
        },
    })?;
    data.push(b'\n');
    Ok(data)
}

impl AgentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, agent_id: &AgentId, stdin: ChildStdin, pid: u32) {
        let mut agents = self.agents.write().await;
        agents.insert(
            agent_id.value().to_string(),
            AgentHandle {
                stdin: Mutex::new(stdin),
                pid,
            },
        );
    }

    pub async fn deregister(&self, agent_id: &AgentId) {
        let mut agents = self.agents.write().await;
        agents.remove(agent_id.value());
    }

    /// Writes a framed user message to the agent's stdin. The read guard is
    /// held across the write, so a concurrent deregister cannot tear it.
    pub async fn send(&self, agent_id: &AgentId, text: &str) -> Result<()> {
        let agents = self.agents.read().await;
        let handle = agents
            .get(agent_id.value())
            .ok_or_else(|| ArchitectError::AgentNotRegistered {
                agent_id: agent_id.value().to_string(),
            })?;

        let data = frame_user_message(text)?;
        let mut stdin = handle.stdin.lock().await;
        stdin.write_all(&data).await?;
        stdin.flush().await?;
        Ok(())
    }

    pub async fn is_alive(&self, agent_id: &AgentId) -> bool {
        self.agents.read().await.contains_key(agent_id.value())
    }

    pub async fn pid(&self, agent_id: &AgentId) -> Option<u32> {
        self.agents
            .read()
            .await
            .get(agent_id.value())
            .map(|handle| handle.pid)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn framing_is_one_json_line() {
        let data = frame_user_message("need X resolved").unwrap();
        assert_eq!(*data.last().unwrap(), b'\n');

        let parsed: serde_json::Value = serde_json::from_slice(&data[..data.len() - 1]).unwrap();
        assert_eq!(parsed["type"], "user");
        assert_eq!(parsed["message"]["role"], "user");
        assert_eq!(parsed["message"]["content"], "need X resolved");
        assert!(!data[..data.len() - 1].contains(&b'\n'));
    }

    #[tokio::test]
    async fn send_to_unknown_agent_fails() {
        let registry = AgentRegistry::new();
        let missing = AgentId::new("nobody");
        let err = registry.send(&missing, "hello").await.unwrap_err();
        assert!(matches!(err, ArchitectError::AgentNotRegistered { .. }));
        assert!(!registry.is_alive(&missing).await);
    }
}
