#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ArchitectError;

/// One tool call: `{"tool": "claim_task", "rid": "r1", "task_id": 7}`.
/// Arguments ride alongside the envelope fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    pub tool: String,
    #[serde(default)]
    pub rid: Option<String>,
    #[serde(flatten)]
    pub args: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolError {
    pub code: String,
    pub msg: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolEnvelope {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rid: Option<String>,
    /// Millisecond timestamp of the response.
    pub t: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<ToolError>,
}

impl ToolEnvelope {
    #[must_use]
    pub fn success(rid: Option<String>, data: Value) -> Self {
        Self {
            ok: true,
            rid,
            t: Utc::now().timestamp_millis(),
            d: Some(data),
            err: None,
        }
    }

    #[must_use]
    pub fn failure(rid: Option<String>, error: &ArchitectError) -> Self {
        Self {
            ok: false,
            rid,
            t: Utc::now().timestamp_millis(),
            d: None,
            err: Some(ToolError {
                code: error.code().to_string(),
                msg: error.to_string(),
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_flattens_named_arguments() {
        let request: ToolRequest = serde_json::from_str(
            r#"{"tool": "claim_task", "rid": "r1", "task_id": 7}"#,
        )
        .unwrap();
        assert_eq!(request.tool, "claim_task");
        assert_eq!(request.rid.as_deref(), Some("r1"));
        assert_eq!(request.args.get("task_id"), Some(&json!(7)));
    }

    #[test]
    fn failure_envelope_carries_protocol_code() {
        let envelope = ToolEnvelope::failure(
            Some("r2".into()),
            &ArchitectError::NotAssigned { task_id: 3 },
        );
        assert!(!envelope.ok);
        let err = envelope.err.unwrap();
        assert_eq!(err.code, "UNAUTHORIZED");
        assert!(err.msg.contains('3'));
    }

    #[test]
    fn success_envelope_round_trips() {
        let envelope = ToolEnvelope::success(None, json!({"claimed": true}));
        let text = serde_json::to_string(&envelope).unwrap();
        let parsed: ToolEnvelope = serde_json::from_str(&text).unwrap();
        assert!(parsed.ok);
        assert_eq!(parsed.d.unwrap()["claimed"], true);
        assert!(parsed.err.is_none());
    }
}
