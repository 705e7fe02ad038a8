//! WebSocket adapter: connection registry, frame schema, session handler.

mod handler;
mod messages;
mod registry;

pub use handler::{router, WsState};
pub use messages::ClientCommand;
pub use registry::{ConnectionRegistry, EventSink};
