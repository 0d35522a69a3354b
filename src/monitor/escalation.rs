#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

//! Blocker escalation: fetch the reported blocker, mark the agent blocked,
//! and acknowledge over its stdin so it can keep going on what is not
//! blocked.

use std::sync::Arc;
use tracing::{error, warn};

use crate::db::CoordDb;
use crate::spawn::AgentRegistry;
use crate::types::{AgentId, AgentStatus};

pub async fn handle_blocker(
    db: &CoordDb,
    registry: &Arc<AgentRegistry>,
    message_id: i64,
    agent_id: &AgentId,
) {
    let content = match db.message_content(message_id).await {
        Ok(content) => content,
        Err(e) => {
            error!(message = message_id, %e, "could not fetch blocker content");
            "(could not fetch content)".to_string()
        }
    };

    warn!(
        agent = agent_id.short(),
        message = message_id,
        blocker = %content,
        "agent reported blocker"
    );

    if let Err(e) = db.update_agent_status(agent_id, AgentStatus::Blocked).await {
        error!(agent = agent_id.short(), %e, "failed to mark agent blocked");
    }

    let response = format!(
        "The orchestrator received your blocker: {content:?}. \
         Please continue with what you can and skip the blocked part for now."
    );
    // AgentNotRegistered here means the process already exited; the pending
    // acknowledgement is dropped.
    if let Err(e) = registry.send(agent_id, &response).await {
        warn!(agent = agent_id.short(), %e, "could not deliver blocker acknowledgement");
    }
}
