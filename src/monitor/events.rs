#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

//! The event handler loop: consumes datastore notifications and turns them
//! into scheduling decisions.

use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::escalation;
use crate::db::{BusEvent, CoordDb};
use crate::spawn::{spawn_ready, AgentRegistry, SpawnConfig};
use crate::types::AgentId;

/// Payload published by the tasks trigger.
#[derive(Debug, Deserialize)]
pub struct TaskUpdatePayload {
    pub id: i64,
    pub status: String,
}

/// Payload published by the messages trigger. The body is fetched on demand
/// to keep notifications small and bounded.
#[derive(Debug, Deserialize)]
pub struct MessagePayload {
    pub id: i64,
    pub agent_id: String,
    pub channel: String,
    pub msg_type: String,
}

struct EventHandler<'a> {
    db: &'a CoordDb,
    registry: &'a Arc<AgentRegistry>,
    project_dir: &'a Path,
    config: &'a SpawnConfig,
    shutdown: &'a CancellationToken,
    /// Highest message id seen; reconnect recovery reads past it.
    watermark: i64,
}

impl EventHandler<'_> {
    async fn cascade(&self) {
        match spawn_ready(
            self.db,
            self.registry,
            self.project_dir,
            self.config,
            self.shutdown,
        )
        .await
        {
            Ok(0) => {}
            Ok(count) => info!(count, "spawned successor agents"),
            Err(e) => error!(%e, "readiness recompute failed"),
        }
    }

    async fn handle_task_update(&self, payload: &str) {
        let update: TaskUpdatePayload = match serde_json::from_str(payload) {
            Ok(update) => update,
            Err(e) => {
                warn!(%e, payload, "unparseable task_updates payload");
                return;
            }
        };
        if update.status == "completed" {
            info!(task = update.id, "task completed");
            self.cascade().await;
        }
    }

    async fn handle_agent_message(&mut self, payload: &str) {
        let message: MessagePayload = match serde_json::from_str(payload) {
            Ok(message) => message,
            Err(e) => {
                warn!(%e, payload, "unparseable agent_messages payload");
                return;
            }
        };
        self.watermark = self.watermark.max(message.id);
        if message.msg_type == "blocker" {
            let agent_id = AgentId::new(message.agent_id);
            escalation::handle_blocker(self.db, self.registry, message.id, &agent_id).await;
        }
    }

    /// The subscription was re-established after a gap. Completions are
    /// recovered by recomputing readiness; blocker messages are recovered by
    /// reading past the watermark.
    async fn handle_reconnect(&mut self) {
        self.cascade().await;

        let missed = match self.db.messages_after(self.watermark).await {
            Ok(missed) => missed,
            Err(e) => {
                error!(%e, "failed to read messages past watermark");
                return;
            }
        };
        for message in missed {
            self.watermark = self.watermark.max(message.id);
            if message.msg_type == crate::types::MsgType::Blocker {
                let agent_id = AgentId::new(message.agent_id.clone());
                escalation::handle_blocker(self.db, self.registry, message.id, &agent_id).await;
            }
        }
    }

    async fn handle(&mut self, event: BusEvent) {
        match event {
            BusEvent::Notification { channel, payload } => match channel.as_str() {
                "task_updates" => self.handle_task_update(&payload).await,
                "agent_messages" => self.handle_agent_message(&payload).await,
                "agent_updates" | "context_updates" => {
                    debug!(channel = %channel, payload = %payload, "observed update");
                }
                other => debug!(channel = other, "ignoring unknown channel"),
            },
            BusEvent::Reconnected => {
                warn!("subscription reconnected, re-deriving state");
                self.handle_reconnect().await;
            }
        }
    }
}

/// Runs until the channel closes or the shutdown token fires; on shutdown
/// the already-buffered events are drained before returning.
pub async fn handle_events(
    db: &CoordDb,
    registry: &Arc<AgentRegistry>,
    mut events: mpsc::Receiver<BusEvent>,
    project_dir: &Path,
    config: &SpawnConfig,
    shutdown: &CancellationToken,
) {
    let watermark = match db.max_message_id().await {
        Ok(watermark) => watermark,
        Err(e) => {
            warn!(%e, "could not initialize message watermark, starting at zero");
            0
        }
    };
    let mut handler = EventHandler {
        db,
        registry,
        project_dir,
        config,
        shutdown,
        watermark,
    };

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                while let Ok(event) = events.try_recv() {
                    handler.handle(event).await;
                }
                return;
            }
            received = events.recv() => match received {
                Some(event) => handler.handle(event).await,
                None => return,
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn task_payload_parses_trigger_json() {
        let payload: TaskUpdatePayload =
            serde_json::from_str(r#"{"id": 7, "status": "completed"}"#).unwrap();
        assert_eq!(payload.id, 7);
        assert_eq!(payload.status, "completed");
    }

    #[test]
    fn message_payload_carries_ids_only() {
        let payload: MessagePayload = serde_json::from_str(
            r#"{"id": 12, "agent_id": "abc", "channel": "blockers", "msg_type": "blocker"}"#,
        )
        .unwrap();
        assert_eq!(payload.id, 12);
        assert_eq!(payload.msg_type, "blocker");
        assert_eq!(payload.channel, "blockers");
    }

    #[test]
    fn malformed_payload_is_rejected() {
        assert!(serde_json::from_str::<TaskUpdatePayload>("{\"id\": \"x\"}").is_err());
    }
}
