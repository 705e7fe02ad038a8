//! Typeclash - Real-time multiplayer typing-battle backend.
//!
//! Players join a room, race to type assigned text sequences, and attack
//! or heal each other until only two placements remain undetermined.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
