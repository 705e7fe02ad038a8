//! The per-room game aggregate: membership, state machine, ranking.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{GameError, RoomId, UserId};
use crate::domain::room::Room;

use super::user::User;

/// Game state machine. Transitions are monotonic:
/// pending -> playing -> finished, never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Pending,
    Playing,
    Finished,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Pending => "pending",
            GameStatus::Playing => "playing",
            GameStatus::Finished => "finished",
        }
    }
}

/// Final placement record for one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameResult {
    pub user_id: UserId,
    pub display_name: String,
    /// 1-based placement.
    pub rank: u32,
}

/// Ephemeral aggregate keyed by room ID.
///
/// Created lazily from the persisted [`Room`] on first join and deleted
/// from the store the moment it finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: RoomId,
    pub base_room: Room,
    pub users: HashMap<UserId, User>,
    pub status: GameStatus,
}

impl Game {
    /// Seeds a fresh game from a persisted room snapshot.
    pub fn from_room(room: Room) -> Self {
        Self {
            id: room.id.clone(),
            base_room: room,
            users: HashMap::new(),
            status: GameStatus::Pending,
        }
    }

    /// Adds a player. Membership only grows while the game is pending.
    pub fn add_user(&mut self, user: User) -> Result<(), GameError> {
        if self.status != GameStatus::Pending {
            return Err(GameError::RoomNotPending(self.id.clone()));
        }
        if self.users.len() >= self.base_room.max_user_num as usize {
            return Err(GameError::RoomFull);
        }
        self.users.insert(user.id.clone(), user);
        Ok(())
    }

    /// Transitions pending -> playing.
    pub fn start(&mut self) -> Result<(), GameError> {
        if self.status != GameStatus::Pending {
            return Err(GameError::RoomNotPending(self.id.clone()));
        }
        self.status = GameStatus::Playing;
        Ok(())
    }

    /// Transitions to the terminal finished state.
    pub fn finish(&mut self) {
        self.status = GameStatus::Finished;
    }

    /// IDs of members still holding life, excluding `except`.
    pub fn living_user_ids(&self, except: Option<&UserId>) -> Vec<UserId> {
        self.users
            .values()
            .filter(|u| u.is_alive() && Some(&u.id) != except)
            .map(|u| u.id.clone())
            .collect()
    }

    /// All member IDs, in no particular order.
    pub fn user_ids(&self) -> Vec<UserId> {
        self.users.keys().cloned().collect()
    }

    /// Members ordered by the canonical placement: never-eliminated players
    /// first, then eliminated players by most recent elimination.
    ///
    /// Ties break on user ID so the ordering is deterministic.
    fn standings(&self) -> Vec<&User> {
        let mut users: Vec<&User> = self.users.values().collect();
        users.sort_by(|a, b| {
            let a_dead = a.dead_at != 0;
            let b_dead = b.dead_at != 0;
            a_dead
                .cmp(&b_dead)
                .then(b.dead_at.cmp(&a.dead_at))
                .then(a.id.as_str().cmp(b.id.as_str()))
        });
        users
    }

    /// 1-based placement of a member under the canonical ordering.
    pub fn rank_of(&self, user_id: &UserId) -> Result<u32, GameError> {
        self.standings()
            .iter()
            .position(|u| &u.id == user_id)
            .map(|i| i as u32 + 1)
            .ok_or_else(|| GameError::UserNotFound(user_id.clone()))
    }

    /// Full ordered result list, computed once at finalization.
    pub fn results(&self) -> Vec<GameResult> {
        self.standings()
            .iter()
            .enumerate()
            .map(|(i, u)| GameResult {
                user_id: u.id.clone(),
                display_name: u.display_name.clone(),
                rank: i as u32 + 1,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::room::RoomStatus;

    fn room(max: u32) -> Room {
        Room {
            id: RoomId::new("r1"),
            owner_id: UserId::new("alice"),
            name: "test room".into(),
            min_user_num: 2,
            max_user_num: max,
            status: RoomStatus::Pending,
        }
    }

    fn game_with(names: &[&str]) -> Game {
        let mut game = Game::from_room(room(8));
        for name in names {
            game.add_user(User::new(UserId::new(*name), *name)).unwrap();
        }
        game
    }

    #[test]
    fn add_user_rejects_full_room() {
        let mut game = Game::from_room(room(1));
        game.add_user(User::new(UserId::new("a"), "a")).unwrap();
        let err = game.add_user(User::new(UserId::new("b"), "b")).unwrap_err();
        assert!(matches!(err, GameError::RoomFull));
    }

    #[test]
    fn add_user_rejects_started_game() {
        let mut game = game_with(&["a", "b"]);
        game.start().unwrap();
        let err = game.add_user(User::new(UserId::new("c"), "c")).unwrap_err();
        assert!(matches!(err, GameError::RoomNotPending(_)));
    }

    #[test]
    fn start_is_not_repeatable() {
        let mut game = game_with(&["a", "b"]);
        game.start().unwrap();
        assert!(game.start().is_err());
        assert_eq!(game.status, GameStatus::Playing);
    }

    #[test]
    fn never_eliminated_ranks_first() {
        let mut game = game_with(&["a", "b", "c"]);
        game.users.get_mut(&UserId::new("b")).unwrap().life = 0;
        game.users.get_mut(&UserId::new("b")).unwrap().dead_at = 100;
        game.users.get_mut(&UserId::new("c")).unwrap().life = 0;
        game.users.get_mut(&UserId::new("c")).unwrap().dead_at = 200;

        assert_eq!(game.rank_of(&UserId::new("a")).unwrap(), 1);
        // more recent elimination ranks better
        assert_eq!(game.rank_of(&UserId::new("c")).unwrap(), 2);
        assert_eq!(game.rank_of(&UserId::new("b")).unwrap(), 3);
    }

    #[test]
    fn results_cover_every_member_in_order() {
        let mut game = game_with(&["a", "b", "c", "d"]);
        for (name, dead_at) in [("b", 10), ("c", 20), ("d", 30)] {
            let u = game.users.get_mut(&UserId::new(name)).unwrap();
            u.life = 0;
            u.dead_at = dead_at;
        }

        let results = game.results();
        assert_eq!(results.len(), 4);
        assert_eq!(results[0].user_id, UserId::new("a"));
        assert_eq!(results[0].rank, 1);
        assert_eq!(results[1].user_id, UserId::new("d"));
        assert_eq!(results[2].user_id, UserId::new("c"));
        assert_eq!(results[3].user_id, UserId::new("b"));
        assert_eq!(results[3].rank, 4);
    }

    #[test]
    fn rank_of_unknown_user_is_not_found() {
        let game = game_with(&["a"]);
        assert!(game.rank_of(&UserId::new("zz")).is_err());
    }

    #[test]
    fn living_user_ids_excludes_dead_and_caller() {
        let mut game = game_with(&["a", "b", "c"]);
        game.users.get_mut(&UserId::new("c")).unwrap().life = 0;

        let mut ids = game.living_user_ids(Some(&UserId::new("a")));
        ids.sort_by(|x, y| x.as_str().cmp(y.as_str()));
        assert_eq!(ids, vec![UserId::new("b")]);
    }
}
