//! Application services: the rules engine and the fan-out bridge.

mod fanout;
mod game_manager;

pub use fanout::FanoutBridge;
pub use game_manager::GameManager;
