//! PostgreSQL adapter for ProblemRepository.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::foundation::GameError;
use crate::domain::room::Problem;
use crate::ports::ProblemRepository;

/// Problem store on the shared PostgreSQL pool.
pub struct PgProblemRepository {
    pool: PgPool,
}

impl PgProblemRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProblemRepository for PgProblemRepository {
    async fn get_problems(&self, level: u8, limit: u32) -> Result<Vec<Problem>, GameError> {
        let low = i32::from(level.saturating_sub(1));
        let high = i32::from(level) + 1;

        let rows = sqlx::query(
            "SELECT id, text, level FROM problems \
             WHERE level BETWEEN $1 AND $2 \
             ORDER BY random() LIMIT $3",
        )
        .bind(low)
        .bind(high)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GameError::Storage(e.to_string()))?;

        let problems: Vec<Problem> = rows
            .iter()
            .map(|row| Problem {
                id: row.get("id"),
                text: row.get("text"),
                level: row.get::<i32, _>("level").clamp(0, 10) as u8,
            })
            .collect();

        if problems.is_empty() {
            return Err(GameError::NoProblems(level));
        }
        Ok(problems)
    }
}
