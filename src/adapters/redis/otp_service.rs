//! Redis-backed one-time tokens for the WebSocket upgrade.
//!
//! The token maps to `"{userID};{displayName}"` under `otp:{token}` and is
//! deleted atomically on redemption, so each token upgrades at most one
//! connection.

use async_trait::async_trait;
use rand::distr::Alphanumeric;
use rand::Rng;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::domain::foundation::{GameError, UserId};
use crate::ports::OtpService;

const TOKEN_LEN: usize = 32;
const TOKEN_TTL_SECS: u64 = 60;

fn otp_key(token: &str) -> String {
    format!("otp:{token}")
}

/// One-time token service on a shared Redis instance.
#[derive(Clone)]
pub struct RedisOtpService {
    conn: MultiplexedConnection,
}

impl RedisOtpService {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl OtpService for RedisOtpService {
    async fn generate(&self, user_id: &UserId, display_name: &str) -> Result<String, GameError> {
        let token: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();

        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(
            otp_key(&token),
            format!("{user_id};{display_name}"),
            TOKEN_TTL_SECS,
        )
        .await
        .map_err(|e| GameError::Storage(e.to_string()))?;
        Ok(token)
    }

    async fn verify(&self, token: &str) -> Result<(UserId, String), GameError> {
        let mut conn = self.conn.clone();
        let bound: Option<String> = redis::cmd("GETDEL")
            .arg(otp_key(token))
            .query_async(&mut conn)
            .await
            .map_err(|e| GameError::Storage(e.to_string()))?;

        let bound = bound.ok_or(GameError::InvalidOtp)?;
        let (user_id, display_name) = bound.split_once(';').ok_or(GameError::InvalidOtp)?;
        if user_id.is_empty() {
            return Err(GameError::InvalidOtp);
        }
        Ok((UserId::new(user_id), display_name.to_string()))
    }
}

impl std::fmt::Debug for RedisOtpService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisOtpService").finish_non_exhaustive()
    }
}
