//! Domain layer: aggregates, value objects, events, and errors.

pub mod foundation;
pub mod game;
pub mod room;
