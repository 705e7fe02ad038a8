//! In-memory GameStore for tests and single-process runs.
//!
//! Edits run while holding the map lock, which gives the same atomic
//! read-mutate-write contract as the Redis adapter's compare-and-swap.
//! TTL is not enforced; abandoned state only matters across process
//! restarts, and this store does not survive one.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::foundation::{GameError, RoomId, UserId};
use crate::domain::game::{Game, User};
use crate::ports::{EditFn, GameStore};

/// In-memory implementation of [`GameStore`].
#[derive(Default)]
pub struct MemoryGameStore {
    games: Mutex<HashMap<RoomId, Game>>,
    users: Mutex<HashMap<UserId, User>>,
}

impl MemoryGameStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GameStore for MemoryGameStore {
    async fn get_game(&self, id: &RoomId) -> Result<Game, GameError> {
        self.games
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| GameError::GameNotFound(id.clone()))
    }

    async fn get_user(&self, id: &UserId) -> Result<User, GameError> {
        self.users
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| GameError::UserNotFound(id.clone()))
    }

    async fn put_game(&self, game: &Game) -> Result<(), GameError> {
        self.games
            .lock()
            .await
            .insert(game.id.clone(), game.clone());
        Ok(())
    }

    async fn put_user(&self, user: &User) -> Result<(), GameError> {
        self.users
            .lock()
            .await
            .insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn delete_game(&self, id: &RoomId) -> Result<(), GameError> {
        self.games.lock().await.remove(id);
        Ok(())
    }

    async fn delete_user(&self, id: &UserId) -> Result<(), GameError> {
        self.users.lock().await.remove(id);
        Ok(())
    }

    async fn edit_game(&self, id: &RoomId, mutate: EditFn<Game>) -> Result<Game, GameError> {
        let mut games = self.games.lock().await;
        let game = games
            .get_mut(id)
            .ok_or_else(|| GameError::GameNotFound(id.clone()))?;
        let mut draft = game.clone();
        mutate(&mut draft)?;
        *game = draft.clone();
        Ok(draft)
    }

    async fn edit_user(&self, id: &UserId, mutate: EditFn<User>) -> Result<User, GameError> {
        let mut users = self.users.lock().await;
        let user = users
            .get_mut(id)
            .ok_or_else(|| GameError::UserNotFound(id.clone()))?;
        let mut draft = user.clone();
        mutate(&mut draft)?;
        *user = draft.clone();
        Ok(draft)
    }
}
