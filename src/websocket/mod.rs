//! WebSocket transport for the relay
//!
//! Every upgraded connection becomes a [`WebSocketSession`] actor that feeds
//! client frames to the shared relay and writes relayed events back out.

mod session;

pub use session::{websocket_route, WebSocketSession};
