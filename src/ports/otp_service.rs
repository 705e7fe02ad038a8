//! OtpService port - one-time tokens authorizing a WebSocket upgrade.
//!
//! The upgrade handshake cannot carry an Authorization header, so an
//! authenticated HTTP call mints a single-use token that the upgrade
//! request redeems via `?p={token}`.

use async_trait::async_trait;

use crate::domain::foundation::{GameError, UserId};

/// Port for minting and redeeming one-time capability tokens.
#[async_trait]
pub trait OtpService: Send + Sync {
    /// Mints a token bound to the given identity.
    async fn generate(&self, user_id: &UserId, display_name: &str) -> Result<String, GameError>;

    /// Redeems a token, deleting it on read.
    ///
    /// Returns the bound identity, or [`GameError::InvalidOtp`] if the
    /// token is unknown or already redeemed.
    async fn verify(&self, token: &str) -> Result<(UserId, String), GameError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn OtpService) {}
}
