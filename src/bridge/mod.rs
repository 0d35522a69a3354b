mod protocol;
mod snapshot;
mod socket;

pub use protocol::{channel_event_type, Command, Event};
pub use snapshot::{snapshot, Snapshot};
pub use socket::{ClientHandle, IncomingCommand, SocketServer};

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::db::{run_listener, BusEvent, CoordDb};
use crate::error::Result;
use crate::types::{AgentId, AgentStatus, MsgType};

pub type DeliveryFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Seam for event fan-out so tests can observe delivered events without a
/// real socket.
pub trait EventDelivery {
    fn deliver_event<'a>(&'a self, event: &'a Event) -> DeliveryFuture<'a>;
}

impl EventDelivery for SocketServer {
    fn deliver_event<'a>(&'a self, event: &'a Event) -> DeliveryFuture<'a> {
        Box::pin(self.broadcast(event))
    }
}

async fn handle_command(db: &CoordDb, incoming: IncomingCommand) {
    let IncomingCommand { command, client } = incoming;
    match command.kind.as_str() {
        "submit_prompt" => {
            let Some(prompt) = command.data_str("prompt") else {
                warn!("submit_prompt without a prompt");
                return;
            };
            if let Err(e) = db
                .post_message("human", "general", &prompt, MsgType::Decision, None)
                .await
            {
                error!(%e, "failed to submit prompt");
            }
        }
        "approve_consultation" => {
            let (Some(task_id), Some(approved)) =
                (command.data_i64("task_id"), command.data_bool("approved"))
            else {
                warn!("approve_consultation without task_id/approved");
                return;
            };
            let status = if approved { "approved" } else { "rejected" };
            if let Err(e) = db.set_consultation_status(task_id, status).await {
                error!(%e, "failed to update consultation status");
            }
        }
        "kill_agent" => {
            let Some(agent_id) = command.data_str("agent_id") else {
                warn!("kill_agent without agent_id");
                return;
            };
            if let Err(e) = db
                .update_agent_status(&AgentId::new(agent_id), AgentStatus::Dead)
                .await
            {
                error!(%e, "failed to kill agent");
            }
        }
        "post_message" => {
            let channel = command.data_str("channel").unwrap_or_else(|| "general".into());
            let Some(content) = command.data_str("content") else {
                warn!("post_message without content");
                return;
            };
            let msg_type = command
                .data_str("msg_type")
                .as_deref()
                .map(MsgType::try_from)
                .and_then(std::result::Result::ok)
                .unwrap_or(MsgType::Update);
            if let Err(e) = db
                .post_message("human", &channel, &content, msg_type, None)
                .await
            {
                error!(%e, "failed to post message");
            }
        }
        "request_snapshot" => match snapshot(db).await {
            Ok(snap) => {
                if let Err(e) = client.send(&Event::snapshot(&snap)).await {
                    warn!(%e, "failed to deliver snapshot");
                }
            }
            Err(e) => error!(%e, "failed to build snapshot"),
        },
        other => warn!(command = other, "unknown command type"),
    }
}

/// Runs the bridge: relays datastore notifications to every connected
/// client and applies client commands to the datastore.
pub async fn run_bridge(
    db: CoordDb,
    database_url: &str,
    socket_path: &Path,
    shutdown: CancellationToken,
) -> Result<()> {
    let (event_tx, mut event_rx) = mpsc::channel::<BusEvent>(100);
    let (server, mut commands) = SocketServer::bind(socket_path)?;

    let listener_shutdown = shutdown.clone();
    let listener_url = database_url.to_string();
    let listener = tokio::spawn(async move {
        if let Err(e) = run_listener(&listener_url, event_tx, listener_shutdown).await {
            error!(%e, "bridge listener failed");
        }
    });

    let accept_shutdown = shutdown.clone();
    let accept_server = server.clone();
    let acceptor = tokio::spawn(async move { accept_server.run(accept_shutdown).await });

    info!(socket = %socket_path.display(), "bridge running");
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            received = event_rx.recv() => match received {
                Some(BusEvent::Notification { channel, payload }) => {
                    let event = Event::from_notification(&channel, &payload);
                    server.deliver_event(&event).await;
                }
                Some(BusEvent::Reconnected) => {}
                None => break,
            },
            received = commands.recv() => match received {
                Some(incoming) => handle_command(&db, incoming).await,
                None => break,
            },
        }
    }

    listener.abort();
    acceptor.abort();
    Ok(())
}
