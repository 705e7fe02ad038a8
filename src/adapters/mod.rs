//! Adapters implementing the ports against concrete infrastructure.

pub mod memory;
pub mod postgres;
pub mod redis;
pub mod websocket;
