//! In-memory adapter twins, used by tests and single-process runs.

mod event_bus;
mod game_store;

pub use event_bus::MemoryEventBus;
pub use game_store::MemoryGameStore;
