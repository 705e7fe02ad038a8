//! Wire events and the room-scoped envelope exchanged over the broker.
//!
//! Every event a client can receive is one variant of [`GameEvent`], a
//! closed union tagged by `type` with the body under `payload`. The
//! [`Envelope`] wraps an event with its room and an optional delivery
//! filter; the fan-out loop resolves the filter against live membership
//! at delivery time.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{RoomId, UserId};

use super::game::GameResult;
use super::user::SequenceKind;

/// All event kinds delivered to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum GameEvent {
    /// Room occupancy or lifecycle changed.
    ChangeRoomState(RoomStatePayload),
    /// Live typing progress from another player.
    TypingKey(TypingPayload),
    /// One player attacked another.
    Attack(AttackPayload),
    /// The recipient's difficulty accumulator changed.
    ChangeWordDifficult(DifficultyPayload),
    /// The recipient's next assigned sequence.
    NextSeq(NextSeqPayload),
    /// Final ordered placements, published exactly once per game.
    Result(Vec<GameResult>),
    /// Another player's state changed (life, elimination, progress).
    ChangeOtherUserState(OtherUserStatePayload),
    /// Snapshot of every player's state, sent at game start.
    ChangeOtherUsersState(Vec<OtherUserStatePayload>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStatePayload {
    pub user_num: u32,
    pub max_user_num: u32,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    pub start_delay: u32,
    pub owner_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub user_id: UserId,
    /// The portion of the current sequence typed so far.
    pub input_seq: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackPayload {
    pub from: UserId,
    pub to: UserId,
    pub damage: u32,
}

/// Why a difficulty accumulator moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyCause {
    Damage,
    Heal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyPayload {
    pub difficulty: u32,
    pub cause: DifficultyCause,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextSeqPayload {
    pub value: String,
    pub level: u8,
    pub kind: SequenceKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtherUserStatePayload {
    pub id: UserId,
    pub name: String,
    pub life: i32,
    /// The sequence the player is typing.
    pub seq: String,
    /// The typed prefix of that sequence.
    pub input_seq: String,
    /// Provisional or final placement; 0 = undetermined.
    pub rank: u32,
}

/// Room-scoped unit exchanged over the pub/sub bridge.
///
/// Routing is by `room_id` inside the envelope; every envelope travels the
/// single shared broker topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub room_id: RoomId,
    pub payload: GameEvent,
    /// If non-empty, restrict delivery to these members.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_users: Vec<UserId>,
    /// Always removed from the target set, even when included above.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_users: Vec<UserId>,
}

impl Envelope {
    /// Envelope delivered to every current room member.
    pub fn broadcast(room_id: RoomId, payload: GameEvent) -> Self {
        Self {
            room_id,
            payload,
            include_users: Vec::new(),
            exclude_users: Vec::new(),
        }
    }

    /// Envelope delivered only to the listed members.
    pub fn to_users(room_id: RoomId, payload: GameEvent, users: Vec<UserId>) -> Self {
        Self {
            room_id,
            payload,
            include_users: users,
            exclude_users: Vec::new(),
        }
    }

    /// Envelope delivered to every member except the listed ones.
    pub fn except_users(room_id: RoomId, payload: GameEvent, users: Vec<UserId>) -> Self {
        Self {
            room_id,
            payload,
            include_users: Vec::new(),
            exclude_users: users,
        }
    }

    /// Applies the include filter, then the exclude filter, to the room
    /// membership resolved at delivery time.
    pub fn targets(&self, members: &[UserId]) -> Vec<UserId> {
        members
            .iter()
            .filter(|id| self.include_users.is_empty() || self.include_users.contains(id))
            .filter(|id| !self.exclude_users.contains(id))
            .cloned()
            .collect()
    }
}
