//! Redis adapters: state store, pub/sub bus, one-time tokens.

mod game_store;
mod otp_service;
mod pubsub;

pub use game_store::RedisGameStore;
pub use otp_service::RedisOtpService;
pub use pubsub::RedisEventBus;
