//! Redis-backed Game/User store.
//!
//! Aggregates are stored as JSON strings under `game:{roomID}` and
//! `user:{userID}`, with a TTL refreshed on every write so abandoned
//! games expire on their own.
//!
//! Atomic edits use optimistic compare-and-set: read the current bytes,
//! apply the mutation to a decoded copy, then commit through a Lua
//! script that only writes if the stored bytes are unchanged. On a lost
//! race the edit re-reads and re-applies, up to a bounded retry count.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::GameConfig;
use crate::domain::foundation::{GameError, RoomId, UserId};
use crate::domain::game::{Game, User};
use crate::ports::{EditFn, GameStore};

const CAS_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  redis.call('SET', KEYS[1], ARGV[2], 'PX', ARGV[3])
  return 1
else
  return 0
end
"#;

const MAX_EDIT_ATTEMPTS: usize = 16;

fn game_key(id: &RoomId) -> String {
    format!("game:{id}")
}

fn user_key(id: &UserId) -> String {
    format!("user:{id}")
}

/// Game/User store on a shared Redis instance.
pub struct RedisGameStore {
    conn: MultiplexedConnection,
    cas: Script,
    ttl_ms: u64,
}

impl RedisGameStore {
    pub fn new(conn: MultiplexedConnection, config: &GameConfig) -> Self {
        Self {
            conn,
            cas: Script::new(CAS_SCRIPT),
            ttl_ms: config.state_ttl().as_millis() as u64,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        key: &str,
        not_found: impl Fn() -> GameError,
    ) -> Result<T, GameError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| GameError::Storage(e.to_string()))?;
        let raw = raw.ok_or_else(not_found)?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), GameError> {
        let mut conn = self.conn.clone();
        let raw = serde_json::to_string(value)?;
        redis::cmd("SET")
            .arg(key)
            .arg(raw)
            .arg("PX")
            .arg(self.ttl_ms)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| GameError::Storage(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), GameError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| GameError::Storage(e.to_string()))
    }

    async fn edit_json<T: Serialize + DeserializeOwned>(
        &self,
        key: &str,
        mutate: EditFn<T>,
        not_found: impl Fn() -> GameError,
    ) -> Result<T, GameError> {
        let mut conn = self.conn.clone();

        for _ in 0..MAX_EDIT_ATTEMPTS {
            let old: Option<String> = conn
                .get(key)
                .await
                .map_err(|e| GameError::Storage(e.to_string()))?;
            let old = old.ok_or_else(&not_found)?;

            let mut value: T = serde_json::from_str(&old)?;
            mutate(&mut value)?;
            let new = serde_json::to_string(&value)?;

            let committed: i32 = self
                .cas
                .key(key)
                .arg(&old)
                .arg(&new)
                .arg(self.ttl_ms)
                .invoke_async(&mut conn)
                .await
                .map_err(|e| GameError::Storage(e.to_string()))?;
            if committed == 1 {
                return Ok(value);
            }
            tracing::trace!(key, "edit lost the race, retrying");
        }

        Err(GameError::Storage(format!(
            "edit of {key} exhausted {MAX_EDIT_ATTEMPTS} attempts"
        )))
    }
}

#[async_trait]
impl GameStore for RedisGameStore {
    async fn get_game(&self, id: &RoomId) -> Result<Game, GameError> {
        let id = id.clone();
        self.get_json(&game_key(&id), || GameError::GameNotFound(id.clone()))
            .await
    }

    async fn get_user(&self, id: &UserId) -> Result<User, GameError> {
        let id = id.clone();
        self.get_json(&user_key(&id), || GameError::UserNotFound(id.clone()))
            .await
    }

    async fn put_game(&self, game: &Game) -> Result<(), GameError> {
        self.put_json(&game_key(&game.id), game).await
    }

    async fn put_user(&self, user: &User) -> Result<(), GameError> {
        self.put_json(&user_key(&user.id), user).await
    }

    async fn delete_game(&self, id: &RoomId) -> Result<(), GameError> {
        self.delete(&game_key(id)).await
    }

    async fn delete_user(&self, id: &UserId) -> Result<(), GameError> {
        self.delete(&user_key(id)).await
    }

    async fn edit_game(&self, id: &RoomId, mutate: EditFn<Game>) -> Result<Game, GameError> {
        let id = id.clone();
        self.edit_json(&game_key(&id), mutate, || {
            GameError::GameNotFound(id.clone())
        })
        .await
    }

    async fn edit_user(&self, id: &UserId, mutate: EditFn<User>) -> Result<User, GameError> {
        let id = id.clone();
        self.edit_json(&user_key(&id), mutate, || {
            GameError::UserNotFound(id.clone())
        })
        .await
    }
}

impl std::fmt::Debug for RedisGameStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisGameStore")
            .field("ttl_ms", &self.ttl_ms)
            .finish_non_exhaustive()
    }
}
