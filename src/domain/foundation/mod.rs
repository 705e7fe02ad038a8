//! Shared domain primitives: identifiers and the error taxonomy.

mod errors;
mod ids;

pub use errors::GameError;
pub use ids::{RoomId, UserId};

/// Current unix time in seconds, used for wire-visible timestamps.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Current unix time in milliseconds.
///
/// Elimination stamps (`dead_at`) order the final ranking, so they need
/// enough resolution to keep near-simultaneous eliminations distinct.
pub fn unix_now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
