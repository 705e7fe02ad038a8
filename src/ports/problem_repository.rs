//! ProblemRepository port - typing problem selection.

use async_trait::async_trait;

use crate::domain::foundation::GameError;
use crate::domain::room::Problem;

/// Port for fetching typing problems by difficulty.
#[async_trait]
pub trait ProblemRepository: Send + Sync {
    /// Returns up to `limit` problems drawn randomly from `level ± 1`.
    ///
    /// An empty result surfaces as [`GameError::NoProblems`] so the rules
    /// engine never hands a player an empty sequence.
    async fn get_problems(&self, level: u8, limit: u32) -> Result<Vec<Problem>, GameError>;
}
