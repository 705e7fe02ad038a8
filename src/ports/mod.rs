//! Ports - interfaces between the game core and the outside world.
//!
//! Following hexagonal architecture, ports define the contracts the
//! application layer depends on; adapters implement them.
//!
//! - `GameStore` - ephemeral Game/User storage with atomic edits
//! - `MessageSender` - delivery to locally connected sockets
//! - `EventPublisher` / `EventSubscriber` - the pub/sub fan-out bridge
//! - `RoomRepository` / `ProblemRepository` - relational collaborators
//! - `OtpService` - one-time tokens authorizing a WebSocket upgrade

mod event_bus;
mod game_store;
mod message_sender;
mod otp_service;
mod problem_repository;
mod room_repository;

pub use event_bus::{EventPublisher, EventSubscriber, MessageStream, GAME_TOPIC};
pub use game_store::{EditFn, GameStore};
pub use message_sender::MessageSender;
pub use otp_service::OtpService;
pub use problem_repository::ProblemRepository;
pub use room_repository::RoomRepository;
