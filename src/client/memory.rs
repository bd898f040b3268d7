use std::sync::Arc;
use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;
use uuid::Uuid;

use crate::client::{EventHandler, HandlerRegistry, MessageChannel};
use crate::error::WebSocketError;
use crate::relay::{ClientEvent, EventKind, RelayServer, ServerEvent};
use crate::Result;

/// [`MessageChannel`] bound directly to an in-process [`RelayServer`].
///
/// Emitted events reach the relay immediately. Events relayed back are
/// queued and only handed to handlers on [`flush`](Self::flush), so tests
/// decide exactly when delivery happens.
pub struct MemoryChannel {
    relay: Arc<RelayServer>,
    id: Option<Uuid>,
    inbox: Mutex<Option<mpsc::UnboundedReceiver<ServerEvent>>>,
    handlers: HandlerRegistry,
}

impl MemoryChannel {
    pub fn new(relay: Arc<RelayServer>) -> Self {
        Self {
            relay,
            id: None,
            inbox: Mutex::new(None),
            handlers: HandlerRegistry::new(),
        }
    }

    /// Dispatches every queued event to its handler and returns how many
    /// events were taken off the queue.
    pub async fn flush(&self) -> usize {
        let mut inbox = self.inbox.lock().await;
        let Some(rx) = inbox.as_mut() else {
            return 0;
        };

        let mut taken = 0;
        while let Ok(event) = rx.try_recv() {
            taken += 1;
            if !self.handlers.dispatch(event).await {
                debug!("Dropped event without handler on {:?}", self.id);
            }
        }
        taken
    }
}

#[async_trait]
impl MessageChannel for MemoryChannel {
    async fn connect(&mut self) -> Result<Uuid> {
        if let Some(id) = self.id {
            return Ok(id);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.relay.on_connect(tx).await;
        *self.inbox.lock().await = Some(rx);
        self.id = Some(id);

        // Hands the `connected` announcement to any early subscriber
        self.flush().await;
        Ok(id)
    }

    async fn emit(&self, event: ClientEvent) -> Result<()> {
        let id = self.id.ok_or(WebSocketError::NotConnected)?;
        self.relay.handle_event(id, event).await;
        Ok(())
    }

    async fn on(&self, kind: EventKind, handler: EventHandler) {
        self.handlers.set(kind, handler).await;
    }

    async fn off(&self, kind: EventKind) {
        self.handlers.remove(kind).await;
    }

    async fn id(&self) -> Option<Uuid> {
        self.id
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(id) = self.id.take() {
            self.relay.on_disconnect(id).await;
        }
        *self.inbox.lock().await = None;
        self.handlers.clear().await;
        Ok(())
    }
}
