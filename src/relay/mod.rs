//! Room relay for the chat server
//!
//! Connections join named rooms; messages and deletion notices sent to a
//! room are forwarded to every other member. Membership lives in memory only
//! and disappears with the connection.

mod protocol;
mod rooms;
mod server;

pub use protocol::{ClientEvent, EventKind, Relayed, RoomPayload, ServerEvent};
pub use rooms::{EventSender, RoomRegistry};
pub use server::RelayServer;
