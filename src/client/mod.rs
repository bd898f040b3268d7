//! Client side of the chat relay
//!
//! A [`ChatClient`] owns one [`MessageChannel`] and a [`MessageStore`].
//! The channel is chosen at construction: [`WsChannel`] for a real server,
//! [`MemoryChannel`] for an in-process relay.

mod channel;
mod chat;
mod memory;
mod store;
mod ws_channel;

pub use channel::{EventHandler, HandlerRegistry, MessageChannel};
pub use chat::ChatClient;
pub use memory::MemoryChannel;
pub use store::{ChatMessage, Conversation, MessageStore, EMPTY_PREVIEW};
pub use ws_channel::WsChannel;
