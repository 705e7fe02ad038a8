//! Persisted room model, read to seed a game.
//!
//! Rooms live in the relational store and are owned by the matchmaking
//! side of the system; the game core only reads them on first join and
//! writes back a status change when a game starts or finishes.

use serde::{Deserialize, Serialize};

use super::foundation::{RoomId, UserId};

/// Lifecycle status of a persisted room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    /// Accepting players.
    Pending,
    /// Filled by matchmaking, not yet started.
    Matched,
    /// A game is in progress.
    Playing,
    /// The game has finished.
    Finished,
}

impl RoomStatus {
    /// Wire representation, matching the persisted enum values.
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Pending => "pending",
            RoomStatus::Matched => "matched",
            RoomStatus::Playing => "playing",
            RoomStatus::Finished => "finished",
        }
    }

    /// Parses a persisted status string, defaulting unknown values to pending.
    pub fn parse(s: &str) -> Self {
        match s {
            "matched" => RoomStatus::Matched,
            "playing" => RoomStatus::Playing,
            "finished" => RoomStatus::Finished,
            _ => RoomStatus::Pending,
        }
    }
}

/// Snapshot of a persisted room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub owner_id: UserId,
    pub name: String,
    pub min_user_num: u32,
    pub max_user_num: u32,
    pub status: RoomStatus,
}

/// A typing problem fetched from the problem repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub id: i32,
    /// The sentence the player must type.
    pub text: String,
    /// Difficulty, 0-10.
    pub level: u8,
}
