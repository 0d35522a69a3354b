#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::protocol::{Command, Event};
use crate::error::{ArchitectError, Result};

/// Write side of one connected client; used for snapshot replies and
/// broadcasts.
#[derive(Clone)]
pub struct ClientHandle {
    writer: Arc<Mutex<OwnedWriteHalf>>,
}

impl ClientHandle {
    pub async fn send(&self, event: &Event) -> Result<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        Ok(())
    }
}

/// A parsed command plus the client that sent it, so replies can go back to
/// just that connection.
pub struct IncomingCommand {
    pub command: Command,
    pub client: ClientHandle,
}

struct ClientEntry {
    id: u64,
    handle: ClientHandle,
}

#[derive(Clone)]
pub struct SocketServer {
    listener: Arc<UnixListener>,
    clients: Arc<Mutex<Vec<ClientEntry>>>,
    commands: mpsc::Sender<IncomingCommand>,
    next_client_id: Arc<AtomicU64>,
}

impl SocketServer {
    /// Binds the listening socket, replacing any stale socket file.
    pub fn bind(path: &Path) -> Result<(Self, mpsc::Receiver<IncomingCommand>)> {
        let _ = std::fs::remove_file(path);
        let listener = UnixListener::bind(path)
            .map_err(|e| ArchitectError::Config(format!("cannot bind {}: {e}", path.display())))?;
        let (commands, receiver) = mpsc::channel(50);
        Ok((
            Self {
                listener: Arc::new(listener),
                clients: Arc::new(Mutex::new(Vec::new())),
                commands,
                next_client_id: Arc::new(AtomicU64::new(0)),
            },
            receiver,
        ))
    }

    /// Accept loop; returns when the shutdown token fires.
    pub async fn run(&self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                () = shutdown.cancelled() => return,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let server = self.clone();
                        tokio::spawn(async move { server.handle_client(stream).await });
                    }
                    Err(e) => warn!(%e, "socket accept failed"),
                },
            }
        }
    }

    async fn handle_client(&self, stream: UnixStream) {
        let (read_half, write_half) = stream.into_split();
        let handle = ClientHandle {
            writer: Arc::new(Mutex::new(write_half)),
        };
        let client_id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut clients = self.clients.lock().await;
            clients.push(ClientEntry {
                id: client_id,
                handle: handle.clone(),
            });
        }
        debug!(client = client_id, "bridge client connected");

        let mut lines = BufReader::new(read_half).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<Command>(&line) {
                        Ok(command) => {
                            let incoming = IncomingCommand {
                                command,
                                client: handle.clone(),
                            };
                            if self.commands.send(incoming).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(%e, "invalid bridge command"),
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(%e, "bridge client read failed");
                    break;
                }
            }
        }

        let mut clients = self.clients.lock().await;
        clients.retain(|entry| entry.id != client_id);
        debug!(client = client_id, "bridge client disconnected");
    }

    /// Sends an event to every connected client; clients whose write fails
    /// are dropped from the list.
    pub async fn broadcast(&self, event: &Event) {
        let mut clients = self.clients.lock().await;
        let mut dead = Vec::new();
        for entry in clients.iter() {
            if entry.handle.send(event).await.is_err() {
                dead.push(entry.id);
            }
        }
        if !dead.is_empty() {
            clients.retain(|entry| !dead.contains(&entry.id));
        }
    }
}
