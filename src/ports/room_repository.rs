//! RoomRepository port - persisted room access.
//!
//! Room creation and matchmaking live outside the game core; the rules
//! engine reads a room to seed a game and writes back status changes.

use async_trait::async_trait;

use crate::domain::foundation::{GameError, RoomId};
use crate::domain::room::{Room, RoomStatus};

/// Port for the relational room store.
#[async_trait]
pub trait RoomRepository: Send + Sync {
    async fn get_room_by_id(&self, id: &RoomId) -> Result<Room, GameError>;

    /// Persists a new room, returning its generated ID.
    async fn create_room(&self, room: &Room) -> Result<RoomId, GameError>;

    /// Picks a pending room with open capacity, if any.
    async fn matching(&self) -> Result<Option<RoomId>, GameError>;

    async fn update_status(&self, id: &RoomId, status: RoomStatus) -> Result<(), GameError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn RoomRepository) {}
}
