//! Per-process connection registry with bounded per-client delivery.
//!
//! Each registered user gets a bounded mailbox and one delivery task that
//! drains it and writes every event to the socket in order. The registry
//! is built once at process startup and owned explicitly; sockets held by
//! other processes are reached through the pub/sub bridge instead.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::config::GameConfig;
use crate::domain::foundation::{GameError, UserId};
use crate::domain::game::GameEvent;
use crate::ports::MessageSender;

/// Where a client's events end up: the write half of its socket.
///
/// Abstracted so the registry is testable without a live connection.
#[async_trait]
pub trait EventSink: Send + 'static {
    async fn send(&mut self, frame: String) -> Result<(), GameError>;
}

struct Client {
    tx: mpsc::Sender<GameEvent>,
    delivery: JoinHandle<()>,
}

/// Per-process map of user ID to live socket.
///
/// Lookups and sends proceed concurrently under the read lock; register
/// and unregister take the write lock.
pub struct ConnectionRegistry {
    clients: RwLock<HashMap<UserId, Client>>,
    mailbox_capacity: usize,
    send_timeout: std::time::Duration,
}

impl ConnectionRegistry {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            mailbox_capacity: config.mailbox_capacity,
            send_timeout: config.send_timeout(),
        }
    }

    /// Shared registry with the given config.
    pub fn new_shared(config: &GameConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    /// Binds a user's socket, starting its delivery task.
    ///
    /// Re-registering the same user replaces the prior client and stops
    /// its delivery task.
    pub async fn register(&self, user_id: UserId, mut sink: impl EventSink) {
        let (tx, mut rx) = mpsc::channel::<GameEvent>(self.mailbox_capacity);

        let task_user = user_id.clone();
        let delivery = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let frame = match serde_json::to_string(&event) {
                    Ok(frame) => frame,
                    Err(err) => {
                        tracing::error!(user_id = %task_user, error = %err, "failed to encode event");
                        continue;
                    }
                };
                if let Err(err) = sink.send(frame).await {
                    tracing::debug!(user_id = %task_user, error = %err, "delivery failed, stopping");
                    break;
                }
            }
        });

        let mut clients = self.clients.write().await;
        if let Some(old) = clients.insert(user_id, Client { tx, delivery }) {
            old.delivery.abort();
        }
    }

    /// Removes a user's socket and stops its delivery task. Idempotent.
    pub async fn unregister(&self, user_id: &UserId) {
        let mut clients = self.clients.write().await;
        if let Some(client) = clients.remove(user_id) {
            client.delivery.abort();
        }
    }

    /// Number of locally registered clients.
    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }

    async fn enqueue(&self, tx: &mpsc::Sender<GameEvent>, to: &UserId, event: GameEvent) -> Result<(), GameError> {
        match timeout(self.send_timeout, tx.send(event)).await {
            Ok(Ok(())) => Ok(()),
            // The delivery task is gone; treat like an unknown client.
            Ok(Err(_)) => Err(GameError::UserNotFound(to.clone())),
            Err(_) => Err(GameError::WriteTimeout(to.clone())),
        }
    }
}

#[async_trait]
impl MessageSender for ConnectionRegistry {
    async fn send(&self, to: &UserId, event: GameEvent) -> Result<(), GameError> {
        let tx = {
            let clients = self.clients.read().await;
            clients
                .get(to)
                .map(|c| c.tx.clone())
                .ok_or_else(|| GameError::UserNotFound(to.clone()))?
        };
        self.enqueue(&tx, to, event).await
    }

    async fn broadcast(&self, ids: &[UserId], event: GameEvent) -> Result<(), GameError> {
        let targets: Vec<(UserId, mpsc::Sender<GameEvent>)> = {
            let clients = self.clients.read().await;
            ids.iter()
                .filter_map(|id| clients.get(id).map(|c| (id.clone(), c.tx.clone())))
                .collect()
        };

        for (id, tx) in targets {
            match self.enqueue(&tx, &id, event.clone()).await {
                Ok(()) => {}
                // Client dropped between lookup and send; skip it.
                Err(GameError::UserNotFound(_)) => continue,
                // A stalled mailbox aborts the rest of this broadcast.
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}
