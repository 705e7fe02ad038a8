//! PostgreSQL adapters for the relational collaborators.

mod problem_repository;
mod room_repository;

pub use problem_repository::PgProblemRepository;
pub use room_repository::PgRoomRepository;
