//! In-memory event bus for tests and single-process runs.
//!
//! A `tokio::sync::broadcast` channel stands in for the broker topic:
//! publish serializes the envelope exactly like the Redis adapter, and
//! each subscribe call gets an independent receiver.

use async_trait::async_trait;
use futures::stream;
use tokio::sync::broadcast;

use crate::domain::foundation::GameError;
use crate::domain::game::Envelope;
use crate::ports::{EventPublisher, EventSubscriber, MessageStream};

/// In-memory implementation of both pub/sub ports.
pub struct MemoryEventBus {
    tx: broadcast::Sender<String>,
}

impl MemoryEventBus {
    /// Creates a bus buffering up to `capacity` undelivered messages
    /// per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }
}

impl Default for MemoryEventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EventPublisher for MemoryEventBus {
    async fn publish(&self, _topic: &str, envelope: &Envelope) -> Result<(), GameError> {
        let body = serde_json::to_string(envelope)?;
        // No subscribers is not an error; the message is simply dropped.
        let _ = self.tx.send(body);
        Ok(())
    }
}

#[async_trait]
impl EventSubscriber for MemoryEventBus {
    async fn subscribe(&self, _topic: &str) -> Result<MessageStream, GameError> {
        let rx = self.tx.subscribe();
        let stream = stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(body) => return Some((body, rx)),
                    // A lagged subscriber skips what it missed.
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        Ok(Box::pin(stream))
    }
}
