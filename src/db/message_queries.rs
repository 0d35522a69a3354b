#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};

use super::CoordDb;
use crate::error::{ArchitectError, Result};
use crate::types::{Message, MsgType};

type MessageRow = (
    i64,
    String,
    String,
    String,
    String,
    Option<i64>,
    DateTime<Utc>,
);

fn message_from_row(row: MessageRow) -> Result<Message> {
    let (id, agent_id, channel, content, msg_type, ref_task_id, created_at) = row;
    Ok(Message {
        id,
        agent_id,
        channel,
        content,
        msg_type: MsgType::try_from(msg_type.as_str()).map_err(ArchitectError::Database)?,
        ref_task_id,
        created_at,
    })
}

const MESSAGE_COLUMNS: &str = "id, agent_id, channel, content, msg_type, ref_task_id, created_at";

impl CoordDb {
    pub async fn post_message(
        &self,
        agent_id: &str,
        channel: &str,
        content: &str,
        msg_type: MsgType,
        ref_task_id: Option<i64>,
    ) -> Result<Message> {
        let (id, created_at) = sqlx::query_as::<_, (i64, DateTime<Utc>)>(
            "INSERT INTO messages (agent_id, channel, content, msg_type, ref_task_id)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, created_at",
        )
        .bind(agent_id)
        .bind(channel)
        .bind(content)
        .bind(msg_type.as_str())
        .bind(ref_task_id)
        .fetch_one(self.pool())
        .await
        .map_err(|e| ArchitectError::Database(format!("Failed to post message: {e}")))?;

        Ok(Message {
            id,
            agent_id: agent_id.to_string(),
            channel: channel.to_string(),
            content: content.to_string(),
            msg_type,
            ref_task_id,
            created_at,
        })
    }

    pub async fn read_messages(
        &self,
        channel: Option<&str>,
        since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {MESSAGE_COLUMNS}
             FROM messages
             WHERE ($1::text IS NULL OR channel = $1)
               AND ($2::timestamptz IS NULL OR created_at > $2)
             ORDER BY created_at DESC
             LIMIT $3",
        ))
        .bind(channel)
        .bind(since)
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(|e| ArchitectError::Database(format!("Failed to read messages: {e}")))?;

        rows.into_iter().map(message_from_row).collect()
    }

    /// Bodies are not carried in notification payloads; the handler fetches
    /// them here by id.
    pub async fn message_content(&self, message_id: i64) -> Result<String> {
        sqlx::query_scalar::<_, String>("SELECT content FROM messages WHERE id = $1")
            .bind(message_id)
            .fetch_one(self.pool())
            .await
            .map_err(|e| {
                ArchitectError::Database(format!("Failed to fetch message {message_id}: {e}"))
            })
    }

    /// Watermark read used to recover messages that arrived while the
    /// subscription was down.
    pub async fn messages_after(&self, watermark: i64) -> Result<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {MESSAGE_COLUMNS}
             FROM messages
             WHERE id > $1
             ORDER BY id",
        ))
        .bind(watermark)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            ArchitectError::Database(format!("Failed to read messages after {watermark}: {e}"))
        })?;

        rows.into_iter().map(message_from_row).collect()
    }

    pub async fn max_message_id(&self) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COALESCE(MAX(id), 0) FROM messages")
            .fetch_one(self.pool())
            .await
            .map_err(|e| ArchitectError::Database(format!("Failed to read message watermark: {e}")))
    }
}
