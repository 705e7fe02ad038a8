//! EventPublisher / EventSubscriber ports - the pub/sub fan-out bridge.
//!
//! The rules engine may execute on any process instance, but each user's
//! socket is pinned to whichever process accepted the upgrade. Publishing
//! room-scoped envelopes to a shared broker topic decouples the two: one
//! long-lived subscriber loop per process translates envelopes into local
//! registry broadcasts.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::domain::foundation::GameError;
use crate::domain::game::Envelope;

/// The single broker channel carrying all room traffic.
///
/// Routing is by the `room_id` field inside each envelope, not by topic.
pub const GAME_TOPIC: &str = "game";

/// Raw broker messages; envelope decoding happens in the fan-out loop so a
/// malformed message is logged and skipped rather than ending the stream.
pub type MessageStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Port for publishing envelopes to the shared broker topic.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, envelope: &Envelope) -> Result<(), GameError>;
}

/// Port for consuming the shared broker topic.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Opens a message stream for the lifetime of the process.
    async fn subscribe(&self, topic: &str) -> Result<MessageStream, GameError>;
}
