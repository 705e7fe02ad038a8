//! Error taxonomy for the game core.

use thiserror::Error;

use super::{RoomId, UserId};

/// Errors surfaced by the game core and its collaborators.
///
/// Store and broker failures carry adapter-level detail as strings so the
/// domain stays free of driver types. The WebSocket session loop logs most
/// of these and keeps the connection alive; only raw socket errors end it.
#[derive(Debug, Error)]
pub enum GameError {
    /// No game exists under the given room ID.
    #[error("game not found: {0}")]
    GameNotFound(RoomId),

    /// No user exists under the given user ID.
    #[error("user not found: {0}")]
    UserNotFound(UserId),

    /// No persisted room exists under the given room ID.
    #[error("room not found: {0}")]
    RoomNotFound(RoomId),

    /// Caller attempted an owner-only operation.
    #[error("user {0} is not the room owner")]
    Unauthorized(UserId),

    /// The room is no longer accepting players.
    #[error("room {0} is not pending")]
    RoomNotPending(RoomId),

    /// The game already holds the maximum number of players.
    #[error("room is full")]
    RoomFull,

    /// A one-time token was missing, already redeemed, or malformed.
    #[error("invalid or expired one-time token")]
    InvalidOtp,

    /// A client mailbox stayed full past the write deadline.
    #[error("write to client {0} timed out")]
    WriteTimeout(UserId),

    /// Publish/subscribe failure on the shared broker.
    #[error("broker error: {0}")]
    Broker(String),

    /// Malformed inbound frame or envelope.
    #[error("decode error: {0}")]
    Decode(String),

    /// Store read/write failure, including exhausted edit retries.
    #[error("storage error: {0}")]
    Storage(String),

    /// No problems exist for the requested level range.
    #[error("no problems available at level {0}")]
    NoProblems(u8),
}

impl GameError {
    /// Short machine-readable code, used in logs and client error frames.
    pub fn code(&self) -> &'static str {
        match self {
            GameError::GameNotFound(_) => "GAME_NOT_FOUND",
            GameError::UserNotFound(_) => "USER_NOT_FOUND",
            GameError::RoomNotFound(_) => "ROOM_NOT_FOUND",
            GameError::Unauthorized(_) => "UNAUTHORIZED",
            GameError::RoomNotPending(_) => "ROOM_NOT_PENDING",
            GameError::RoomFull => "ROOM_FULL",
            GameError::InvalidOtp => "INVALID_OTP",
            GameError::WriteTimeout(_) => "WRITE_TIMEOUT",
            GameError::Broker(_) => "BROKER_ERROR",
            GameError::Decode(_) => "DECODE_ERROR",
            GameError::Storage(_) => "STORAGE_ERROR",
            GameError::NoProblems(_) => "NO_PROBLEMS",
        }
    }

    /// Whether the error means a looked-up aggregate is simply absent.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GameError::GameNotFound(_) | GameError::UserNotFound(_) | GameError::RoomNotFound(_)
        )
    }
}

impl From<serde_json::Error> for GameError {
    fn from(err: serde_json::Error) -> Self {
        GameError::Decode(err.to_string())
    }
}
