//! PostgreSQL adapter for RoomRepository.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::foundation::{GameError, RoomId};
use crate::domain::room::{Room, RoomStatus};
use crate::ports::RoomRepository;

/// Room store on the shared PostgreSQL pool.
pub struct PgRoomRepository {
    pool: PgPool,
}

impl PgRoomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn from_row(row: &sqlx::postgres::PgRow) -> Room {
        let status: String = row.get("status");
        Room {
            id: RoomId::new(row.get::<String, _>("id")),
            owner_id: crate::domain::foundation::UserId::new(row.get::<String, _>("owner_id")),
            name: row.get("name"),
            min_user_num: row.get::<i32, _>("min_user_num") as u32,
            max_user_num: row.get::<i32, _>("max_user_num") as u32,
            status: RoomStatus::parse(&status),
        }
    }
}

#[async_trait]
impl RoomRepository for PgRoomRepository {
    async fn get_room_by_id(&self, id: &RoomId) -> Result<Room, GameError> {
        let row = sqlx::query(
            "SELECT id, owner_id, name, min_user_num, max_user_num, status \
             FROM rooms WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GameError::Storage(e.to_string()))?;

        row.map(|r| Self::from_row(&r))
            .ok_or_else(|| GameError::RoomNotFound(id.clone()))
    }

    async fn create_room(&self, room: &Room) -> Result<RoomId, GameError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO rooms (id, owner_id, name, min_user_num, max_user_num, status) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&id)
        .bind(room.owner_id.as_str())
        .bind(&room.name)
        .bind(room.min_user_num as i32)
        .bind(room.max_user_num as i32)
        .bind(room.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| GameError::Storage(e.to_string()))?;
        Ok(RoomId::new(id))
    }

    async fn matching(&self) -> Result<Option<RoomId>, GameError> {
        let row = sqlx::query(
            "SELECT id FROM rooms WHERE status = 'pending' \
             ORDER BY random() LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GameError::Storage(e.to_string()))?;

        Ok(row.map(|r| RoomId::new(r.get::<String, _>("id"))))
    }

    async fn update_status(&self, id: &RoomId, status: RoomStatus) -> Result<(), GameError> {
        let result = sqlx::query("UPDATE rooms SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| GameError::Storage(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(GameError::RoomNotFound(id.clone()));
        }
        Ok(())
    }
}
