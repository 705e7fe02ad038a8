//! Game aggregates, per-player state, and wire events.

mod events;
#[allow(clippy::module_inception)]
mod game;
mod user;

pub use events::{
    AttackPayload, DifficultyCause, DifficultyPayload, Envelope, GameEvent, NextSeqPayload,
    OtherUserStatePayload, RoomStatePayload, TypingPayload,
};
pub use game::{Game, GameResult, GameStatus};
pub use user::{FinishCause, Sequence, SequenceKind, User, INITIAL_LIFE, MAX_LEVEL};
