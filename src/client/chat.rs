use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::client::{ChatMessage, MessageChannel, MessageStore};
use crate::relay::{ClientEvent, EventKind, RoomPayload, ServerEvent};
use crate::Result;

const SUBSCRIBED: [EventKind; 2] = [EventKind::ReceiveMessage, EventKind::DeleteMessage];

/// A chat participant: an injected channel plus the local message store.
///
/// Channel handlers only enqueue events; the store is changed in one place,
/// by [`process_pending`](Self::process_pending) or
/// [`recv_update`](Self::recv_update). The handlers hold the only senders of
/// that queue, so it closes once the channel drops them.
pub struct ChatClient<C: MessageChannel> {
    channel: C,
    store: MessageStore,
    updates: mpsc::UnboundedReceiver<ServerEvent>,
}

impl<C: MessageChannel> ChatClient<C> {
    pub fn new(channel: C) -> Self {
        // Closed until mounted
        let (_, updates) = mpsc::unbounded_channel();
        Self {
            channel,
            store: MessageStore::new(),
            updates,
        }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    /// Subscribes to relayed events and connects the channel.
    pub async fn mount(&mut self) -> Result<Uuid> {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        self.updates = updates_rx;
        for kind in SUBSCRIBED {
            let updates = updates_tx.clone();
            self.channel
                .on(kind, Box::new(move |event| {
                    if let Err(e) = updates.send(event) {
                        debug!("Chat client gone, dropping {:?}", e.0.kind());
                    }
                }))
                .await;
        }

        let id = self.channel.connect().await?;
        self.store.set_self_id(id);
        info!("Chat client mounted as {}", id);
        Ok(id)
    }

    pub async fn unmount(&mut self) -> Result<()> {
        for kind in SUBSCRIBED {
            self.channel.off(kind).await;
        }
        self.channel.disconnect().await
    }

    pub async fn join_room(&mut self, room: &str) -> Result<()> {
        self.store.open_conversation(room)?;
        self.channel
            .emit(ClientEvent::JoinRoom(room.to_string()))
            .await
    }

    pub fn focus(&mut self, room: &str) -> bool {
        self.store.set_active(room)
    }

    /// Appends the message locally, then hands it to the channel. A failed
    /// emit is only logged; the local copy stays.
    pub async fn send(&mut self, text: &str) -> Result<ChatMessage> {
        let message = self.store.send_local(text)?;
        let payload = RoomPayload::new(message.room.clone(), message.text.clone())
            .with_id(message.id);

        if let Err(e) = self.channel.emit(ClientEvent::SendMessage(payload)).await {
            warn!("Message {} may not have been delivered: {}", message.id, e);
        }
        Ok(message)
    }

    /// Removes a message from the active thread and tells the room about it.
    pub async fn delete(&mut self, id: Uuid) -> Result<Option<ChatMessage>> {
        let Some(removed) = self.store.delete_local(id) else {
            return Ok(None);
        };
        let payload = RoomPayload::new(removed.room.clone(), id.to_string());

        if let Err(e) = self.channel.emit(ClientEvent::DeleteMessage(payload)).await {
            warn!("Delete notice for {} may not have been delivered: {}", id, e);
        }
        Ok(Some(removed))
    }

    fn apply(&mut self, event: ServerEvent) -> bool {
        match event {
            ServerEvent::ReceiveMessage(relayed) => self.store.receive_remote(&relayed),
            ServerEvent::DeleteMessage(relayed) => self.store.apply_remote_delete(&relayed),
            ServerEvent::Connected { .. } => false,
        }
    }

    /// Applies every queued event. Returns how many changed the store.
    pub fn process_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.updates.try_recv() {
            if self.apply(event) {
                applied += 1;
            }
        }
        applied
    }

    /// Waits for the next relayed event and applies it. Returns whether the
    /// store changed, or `None` once the channel has closed.
    pub async fn recv_update(&mut self) -> Option<bool> {
        let event = self.updates.recv().await?;
        Some(self.apply(event))
    }
}
