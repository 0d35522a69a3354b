#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

//! Line-delimited JSON protocol spoken over the Unix socket. Clients send
//! `{type, data}` commands; the server sends `{type, data}` events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Server-to-client event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
}

/// Channel name to the event type clients subscribe on.
#[must_use]
pub fn channel_event_type(channel: &str) -> &str {
    match channel {
        "agent_messages" => "new_message",
        "context_updates" => "context_update",
        "task_updates" => "task_update",
        "agent_updates" => "agent_update",
        other => other,
    }
}

impl Event {
    /// Wraps a raw notification payload. Unparseable payloads are passed
    /// through under a `raw` key rather than dropped.
    #[must_use]
    pub fn from_notification(channel: &str, payload: &str) -> Self {
        let data = serde_json::from_str::<Value>(payload)
            .unwrap_or_else(|_| serde_json::json!({ "raw": payload }));
        Self {
            kind: channel_event_type(channel).to_string(),
            data,
        }
    }

    #[must_use]
    pub fn snapshot(snapshot: &super::Snapshot) -> Self {
        Self {
            kind: "snapshot".to_string(),
            data: serde_json::to_value(snapshot).unwrap_or(Value::Null),
        }
    }
}

/// Client-to-server command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

impl Command {
    #[must_use]
    pub fn data_str(&self, key: &str) -> Option<String> {
        self.data
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    #[must_use]
    pub fn data_i64(&self, key: &str) -> Option<i64> {
        self.data.get(key).and_then(Value::as_i64)
    }

    #[must_use]
    pub fn data_bool(&self, key: &str) -> Option<bool> {
        self.data.get(key).and_then(Value::as_bool)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn channels_map_to_client_event_types() {
        assert_eq!(channel_event_type("agent_messages"), "new_message");
        assert_eq!(channel_event_type("task_updates"), "task_update");
        assert_eq!(channel_event_type("agent_updates"), "agent_update");
        assert_eq!(channel_event_type("context_updates"), "context_update");
        assert_eq!(channel_event_type("something_else"), "something_else");
    }

    #[test]
    fn notification_payload_is_parsed_json() {
        let event = Event::from_notification("task_updates", r#"{"id": 3, "status": "completed"}"#);
        assert_eq!(event.kind, "task_update");
        assert_eq!(event.data["id"], 3);
    }

    #[test]
    fn unparseable_payload_survives_as_raw() {
        let event = Event::from_notification("task_updates", "not-json");
        assert_eq!(event.data["raw"], "not-json");
    }

    #[test]
    fn command_accessors_read_typed_fields() {
        let command: Command = serde_json::from_str(
            r#"{"type": "approve_consultation", "data": {"task_id": 9, "approved": true, "note": "ok"}}"#,
        )
        .unwrap();
        assert_eq!(command.kind, "approve_consultation");
        assert_eq!(command.data_i64("task_id"), Some(9));
        assert_eq!(command.data_bool("approved"), Some(true));
        assert_eq!(command.data_str("note"), Some("ok".to_string()));
        assert_eq!(command.data_str("missing"), None);
    }
}
