use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::relay::{ClientEvent, EventKind, ServerEvent};
use crate::Result;

pub type EventHandler = Box<dyn Fn(ServerEvent) + Send + Sync>;

/// A bidirectional event channel to the relay.
///
/// Implementations: [`WsChannel`](super::WsChannel) talks to a server over a
/// websocket, [`MemoryChannel`](super::MemoryChannel) is wired straight into
/// an in-process relay.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Opens the channel and returns the id the relay assigned to it.
    async fn connect(&mut self) -> Result<Uuid>;

    /// Fire-and-forget: `Ok` means the event left this side, nothing more.
    async fn emit(&self, event: ClientEvent) -> Result<()>;

    /// Registers the handler for `kind`, replacing any previous one.
    async fn on(&self, kind: EventKind, handler: EventHandler);

    async fn off(&self, kind: EventKind);

    async fn id(&self) -> Option<Uuid>;

    /// Closes the channel and drops every registered handler.
    async fn disconnect(&mut self) -> Result<()>;
}

/// Per-kind handler table shared between a channel and its reader.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<RwLock<HashMap<EventKind, EventHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, kind: EventKind, handler: EventHandler) {
        self.handlers.write().await.insert(kind, handler);
    }

    pub async fn remove(&self, kind: EventKind) -> bool {
        self.handlers.write().await.remove(&kind).is_some()
    }

    /// Drops every handler. Channels call this once their connection is gone,
    /// so anything a handler captured is released too.
    pub async fn clear(&self) {
        self.handlers.write().await.clear();
    }

    /// Returns `false` when nobody listens for this kind of event.
    pub async fn dispatch(&self, event: ServerEvent) -> bool {
        let handlers = self.handlers.read().await;
        match handlers.get(&event.kind()) {
            Some(handler) => {
                handler(event);
                true
            }
            None => false,
        }
    }
}
