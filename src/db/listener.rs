#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

use sqlx::postgres::PgListener;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{ArchitectError, Result};

/// Notification channels published by the datastore triggers.
pub const LISTEN_CHANNELS: &[&str] = &[
    "agent_messages",
    "context_updates",
    "task_updates",
    "agent_updates",
];

const RECONNECT_BACKOFF: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// A trigger fired. Payload is the small JSON document from pg_notify.
    Notification { channel: String, payload: String },
    /// The subscription connection was lost and re-established. Events in
    /// the gap are not replayed; consumers must re-derive state.
    Reconnected,
}

/// Subscribes to all notification channels on a dedicated connection and
/// forwards events until the shutdown token fires. Connection loss is
/// retried with a fixed backoff; a `Reconnected` marker is emitted so the
/// handler can recompute readiness and poll its message watermark.
pub async fn run_listener(
    database_url: &str,
    events: mpsc::Sender<BusEvent>,
    shutdown: CancellationToken,
) -> Result<()> {
    let mut listener = PgListener::connect(database_url).await.map_err(|error| {
        ArchitectError::Database(format!("Failed to open listen connection: {error}"))
    })?;
    listener.listen_all(LISTEN_CHANNELS.iter().copied()).await.map_err(|error| {
        ArchitectError::Database(format!("Failed to subscribe to channels: {error}"))
    })?;
    info!(channels = ?LISTEN_CHANNELS, "listening for datastore notifications");

    loop {
        tokio::select! {
            () = shutdown.cancelled() => return Ok(()),
            received = listener.try_recv() => match received {
                Ok(Some(notification)) => {
                    let event = BusEvent::Notification {
                        channel: notification.channel().to_string(),
                        payload: notification.payload().to_string(),
                    };
                    if events.send(event).await.is_err() {
                        return Ok(());
                    }
                }
                // try_recv yields None when the connection dropped; the next
                // call re-establishes it and re-issues LISTEN.
                Ok(None) => {
                    warn!("notification connection lost, resubscribing");
                    tokio::time::sleep(RECONNECT_BACKOFF).await;
                    if events.send(BusEvent::Reconnected).await.is_err() {
                        return Ok(());
                    }
                }
                Err(error) => {
                    warn!(%error, "notification receive failed, retrying");
                    tokio::time::sleep(RECONNECT_BACKOFF).await;
                }
            },
        }
    }
}
