//! Redis pub/sub event bus.
//!
//! Publishing rides the shared multiplexed connection; subscribing opens
//! a dedicated connection because Redis pins a subscriber connection to
//! pub/sub mode for its lifetime.

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::domain::foundation::GameError;
use crate::domain::game::Envelope;
use crate::ports::{EventPublisher, EventSubscriber, MessageStream};

/// Pub/sub bus over a shared Redis instance.
#[derive(Clone)]
pub struct RedisEventBus {
    client: redis::Client,
    conn: MultiplexedConnection,
}

impl RedisEventBus {
    pub fn new(client: redis::Client, conn: MultiplexedConnection) -> Self {
        Self { client, conn }
    }
}

#[async_trait]
impl EventPublisher for RedisEventBus {
    async fn publish(&self, topic: &str, envelope: &Envelope) -> Result<(), GameError> {
        let raw = serde_json::to_string(envelope)?;
        let mut conn = self.conn.clone();
        conn.publish::<_, _, ()>(topic, raw)
            .await
            .map_err(|e| GameError::Broker(e.to_string()))
    }
}

#[async_trait]
impl EventSubscriber for RedisEventBus {
    async fn subscribe(&self, topic: &str) -> Result<MessageStream, GameError> {
        let conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| GameError::Broker(e.to_string()))?;
        let mut pubsub = conn.into_pubsub();
        pubsub
            .subscribe(topic)
            .await
            .map_err(|e| GameError::Broker(e.to_string()))?;

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            match msg.get_payload::<String>() {
                Ok(payload) => Some(payload),
                Err(err) => {
                    tracing::warn!(error = %err, "non-text pub/sub payload, skipping");
                    None
                }
            }
        });
        Ok(Box::pin(stream))
    }
}

impl std::fmt::Debug for RedisEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisEventBus").finish_non_exhaustive()
    }
}
