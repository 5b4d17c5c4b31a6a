//! Per-connection lifecycle: registry, heartbeat, and the sequential
//! message loop.
//!
//! Each connection processes one inbound message to completion — including
//! any compute-pool suspension — before reading the next, which is what
//! guarantees responses come back in request order without correlation ids.
//! Connections are independent of each other, and closing one never touches
//! the session store: sessions outlive connections by design.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use bytes::Bytes;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use visage_core::ids::ClientId;

use crate::handlers::{self, HandlerState};
use crate::protocol::Reply;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(90);

/// A connected editing client.
pub struct Client {
    pub id: ClientId,
    pub tx: mpsc::Sender<Reply>,
    pub connected: AtomicBool,
    pub last_pong: AtomicU64,
}

impl Client {
    fn new(id: ClientId, tx: mpsc::Sender<Reply>) -> Self {
        Self {
            id,
            tx,
            connected: AtomicBool::new(true),
            last_pong: AtomicU64::new(now_secs()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn record_pong(&self) {
        self.last_pong.store(now_secs(), Ordering::Relaxed);
    }

    pub fn is_alive(&self) -> bool {
        let last = self.last_pong.load(Ordering::Relaxed);
        now_secs().saturating_sub(last) < CLIENT_TIMEOUT.as_secs()
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Registry of all connected clients.
pub struct ClientRegistry {
    clients: DashMap<ClientId, Arc<Client>>,
    max_send_queue: usize,
}

impl ClientRegistry {
    pub fn new(max_send_queue: usize) -> Self {
        Self {
            clients: DashMap::new(),
            max_send_queue,
        }
    }

    /// Register a new client, returning its handle and the reply receiver.
    pub fn register(&self) -> (Arc<Client>, mpsc::Receiver<Reply>) {
        let id = ClientId::new();
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        let client = Arc::new(Client::new(id.clone(), tx));
        self.clients.insert(id, Arc::clone(&client));
        (client, rx)
    }

    /// Remove a client by id.
    pub fn unregister(&self, id: &ClientId) {
        if let Some((_, client)) = self.clients.remove(id) {
            client.connected.store(false, Ordering::Relaxed);
        }
    }

    /// Number of connected clients.
    pub fn count(&self) -> usize {
        self.clients.len()
    }

    /// Remove clients that stopped answering pings.
    pub fn cleanup_dead_clients(&self) -> usize {
        let dead: Vec<ClientId> = self
            .clients
            .iter()
            .filter(|entry| !entry.value().is_alive())
            .map(|entry| entry.value().id.clone())
            .collect();

        let removed = dead.len();
        for id in dead {
            self.unregister(&id);
            tracing::info!(client_id = %id, "cleaned up dead client");
        }
        removed
    }
}

/// Drive one WebSocket connection until either side closes it.
pub async fn handle_ws_connection(
    socket: WebSocket,
    client: Arc<Client>,
    mut rx: mpsc::Receiver<Reply>,
    registry: Arc<ClientRegistry>,
    state: Arc<HandlerState>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer: serializes replies and heartbeat pings onto the socket.
    let writer_client = Arc::clone(&client);
    let writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        ping_interval.tick().await; // consume the immediate first tick

        loop {
            tokio::select! {
                reply = rx.recv() => {
                    let frame = match reply {
                        Some(Reply::Json(text)) => WsMessage::Text(text.into()),
                        Some(Reply::Binary(bytes)) => WsMessage::Binary(bytes.into()),
                        None => break,
                    };
                    if ws_tx.send(frame).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(WsMessage::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                    tracing::trace!(client_id = %writer_client.id, "sent ping");
                }
            }
        }
        writer_client.connected.store(false, Ordering::Relaxed);
    });

    // Reader: handles each message to completion before taking the next.
    let reader_client = Arc::clone(&client);
    let reader = async {
        while let Some(Ok(message)) = ws_rx.next().await {
            match message {
                WsMessage::Binary(payload) => {
                    let reply = handlers::handle_upload(&state, payload).await;
                    if reader_client.tx.send(reply).await.is_err() {
                        break;
                    }
                }
                WsMessage::Text(text) => {
                    let reply = handlers::handle_edit(&state, text.as_str()).await;
                    if reader_client.tx.send(reply).await.is_err() {
                        break;
                    }
                }
                WsMessage::Pong(_) => reader_client.record_pong(),
                WsMessage::Close(_) => break,
                WsMessage::Ping(_) => {} // axum replies automatically
            }
        }
    };

    tokio::select! {
        _ = writer => {},
        _ = reader => {},
    }

    registry.unregister(&client.id);
    tracing::info!(client_id = %client.id, "connection closed");
}

/// Start a background task that periodically sweeps dead clients.
pub fn start_cleanup_task(
    registry: Arc<ClientRegistry>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let removed = registry.cleanup_dead_clients();
            if removed > 0 {
                tracing::info!(removed, "dead client sweep");
            }
        }
    })
}
