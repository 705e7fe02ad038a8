//! GameStore port - ephemeral Game/User storage with atomic edits.
//!
//! The edit operations are the only sanctioned way to mutate a stored
//! aggregate. A raw get-then-put from the rules engine is a lost-update
//! hazard (two concurrent attacks on the same victim would silently
//! overwrite each other) and must not be reintroduced.

use async_trait::async_trait;

use crate::domain::foundation::{GameError, RoomId, UserId};
use crate::domain::game::{Game, User};

/// Caller-supplied mutation applied inside an atomic edit.
///
/// Returning an error aborts the edit; nothing is persisted. The closure
/// may run more than once when the adapter retries under contention, so
/// it must only touch the aggregate it is given.
pub type EditFn<T> = Box<dyn Fn(&mut T) -> Result<(), GameError> + Send>;

/// Port for the shared Game/User state store.
///
/// Implementations must guarantee:
/// - `edit_game` / `edit_user` apply read-mutate-write as a single atomic
///   unit relative to other edits on the same key;
/// - every successful write refreshes the aggregate's TTL;
/// - a missing key surfaces as `GameNotFound` / `UserNotFound`.
#[async_trait]
pub trait GameStore: Send + Sync {
    async fn get_game(&self, id: &RoomId) -> Result<Game, GameError>;

    async fn get_user(&self, id: &UserId) -> Result<User, GameError>;

    async fn put_game(&self, game: &Game) -> Result<(), GameError>;

    async fn put_user(&self, user: &User) -> Result<(), GameError>;

    async fn delete_game(&self, id: &RoomId) -> Result<(), GameError>;

    async fn delete_user(&self, id: &UserId) -> Result<(), GameError>;

    /// Atomically mutates the stored game, returning the persisted result.
    async fn edit_game(&self, id: &RoomId, mutate: EditFn<Game>) -> Result<Game, GameError>;

    /// Atomically mutates the stored user, returning the persisted result.
    async fn edit_user(&self, id: &UserId, mutate: EditFn<User>) -> Result<User, GameError>;
}
