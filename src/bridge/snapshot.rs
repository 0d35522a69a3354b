#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::db::CoordDb;
use crate::error::Result;
use crate::types::{Agent, Message, Task, TaskEdge};

const SNAPSHOT_MESSAGE_LIMIT: i64 = 100;

/// Full current state, synthesized for a `request_snapshot` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub agents: Vec<Agent>,
    pub tasks: Vec<Task>,
    pub messages: Vec<Message>,
    pub edges: Vec<TaskEdge>,
}

pub async fn snapshot(db: &CoordDb) -> Result<Snapshot> {
    let agents = db.get_agents(None).await?;
    let with_edges = db.get_tasks(None, None).await?;
    let messages = db.read_messages(None, None, SNAPSHOT_MESSAGE_LIMIT).await?;

    Ok(Snapshot {
        agents,
        tasks: with_edges.tasks,
        messages,
        edges: with_edges.edges,
    })
}
