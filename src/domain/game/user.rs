//! Per-player ephemeral state.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::UserId;

/// Starting life for every player.
pub const INITIAL_LIFE: i32 = 5;

/// Maximum sequence difficulty level.
pub const MAX_LEVEL: u8 = 10;

/// How a sequence attempt ended, as judged at completion time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishCause {
    Succeeded,
    Failed,
}

/// What completing a sequence does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequenceKind {
    /// Completing it attacks a random living opponent.
    Default,
    /// Completing it reduces the player's own difficulty.
    Heal,
}

/// One typing challenge instance assigned to a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    /// The text to type.
    pub value: String,
    /// Difficulty level, 0-10.
    pub level: u8,
    pub kind: SequenceKind,
}

impl Sequence {
    pub fn new(value: impl Into<String>, level: u8, kind: SequenceKind) -> Self {
        Self {
            value: value.into(),
            level: level.min(MAX_LEVEL),
            kind,
        }
    }

    /// Damage dealt by completing this sequence.
    ///
    /// `level * max(1, streak / 10) * factor`; the streak multiplier only
    /// kicks in past 19 consecutive successes (integer division).
    pub fn damage(&self, streak: u32, factor: u32) -> u32 {
        u32::from(self.level) * (streak / 10).max(1) * factor
    }
}

/// Ephemeral per-player aggregate, mutated only through the store's
/// atomic edit primitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    /// Remaining life, floor 0.
    pub life: i32,
    /// Assigned challenge queue; exactly two entries while alive and playing.
    pub sequences: Vec<Sequence>,
    /// Cursor into the head sequence, informational only.
    pub pos: usize,
    /// Consecutive successful default sequences.
    pub streak: u32,
    /// Unix time of elimination in milliseconds; 0 = never eliminated.
    pub dead_at: i64,
    /// Accumulator driving the level of the next assigned sequence.
    pub difficulty: u32,
}

impl User {
    pub fn new(id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            life: INITIAL_LIFE,
            sequences: Vec::new(),
            pos: 0,
            streak: 0,
            dead_at: 0,
            difficulty: 0,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.life > 0
    }

    /// The sequence the player is currently typing, if any.
    pub fn head_sequence(&self) -> Option<&Sequence> {
        self.sequences.first()
    }

    /// Raises difficulty from an incoming attack.
    pub fn take_damage(&mut self, amount: u32) {
        self.difficulty = self.difficulty.saturating_add(amount);
    }

    /// Lowers difficulty from a completed heal sequence, floored at 0.
    pub fn heal(&mut self, amount: u32) {
        self.difficulty = self.difficulty.saturating_sub(amount);
    }

    /// Removes one life, stamping `dead_at` when it reaches 0.
    ///
    /// Returns true when this call eliminated the player.
    pub fn lose_life(&mut self, now: i64) -> bool {
        if !self.is_alive() {
            return false;
        }
        self.life -= 1;
        if self.life <= 0 {
            self.life = 0;
            self.dead_at = now;
            return true;
        }
        false
    }

    /// Level for the player's next sequence: `min(10, difficulty / 100)`.
    pub fn next_level(&self) -> u8 {
        ((self.difficulty / 100) as u8).min(MAX_LEVEL)
    }

    /// Drops the head sequence, appends the next one, and resets the cursor.
    pub fn rotate_sequence(&mut self, next: Sequence) {
        if !self.sequences.is_empty() {
            self.sequences.remove(0);
        }
        self.sequences.push(next);
        self.pos = 0;
    }
}
