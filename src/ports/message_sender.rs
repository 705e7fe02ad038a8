//! MessageSender port - delivery to locally connected sockets.
//!
//! Implemented by the per-process connection registry. Only users whose
//! sockets this process holds can be reached; everyone else is reached
//! through the pub/sub bridge.

use async_trait::async_trait;

use crate::domain::foundation::{GameError, UserId};
use crate::domain::game::GameEvent;

/// Port for unicast and broadcast delivery to live local sockets.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Enqueues an event for one user.
    ///
    /// Fails with [`GameError::UserNotFound`] when the user holds no local
    /// socket, or [`GameError::WriteTimeout`] when their mailbox stays
    /// full past the write deadline.
    async fn send(&self, to: &UserId, event: GameEvent) -> Result<(), GameError>;

    /// Enqueues an event for each listed user that is locally registered.
    ///
    /// Unregistered IDs (socket on another process, or gone) are silently
    /// skipped. A mailbox write-timeout aborts the remaining sends in
    /// this call.
    async fn broadcast(&self, ids: &[UserId], event: GameEvent) -> Result<(), GameError>;
}
