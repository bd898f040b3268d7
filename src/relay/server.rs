use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::relay::{ClientEvent, EventSender, Relayed, RoomPayload, RoomRegistry, ServerEvent};

/// Room relay shared by every session.
///
/// Nothing is stored beyond membership: messages and deletion notices are
/// fanned out to the other members of a room and forgotten.
#[derive(Debug, Default)]
pub struct RelayServer {
    registry: Arc<RoomRegistry>,
}

impl RelayServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> Arc<RoomRegistry> {
        self.registry.clone()
    }

    /// Registers a new connection and tells it which id it was given.
    pub async fn on_connect(&self, sender: EventSender) -> Uuid {
        let id = Uuid::new_v4();
        self.registry.add(id, sender).await;
        if let Err(e) = self.registry.send_to(&id, ServerEvent::Connected { id }).await {
            warn!("Could not announce id to connection {}: {}", id, e);
        }
        info!("User connected: {}", id);
        id
    }

    pub async fn join_room(&self, id: Uuid, room: &str) -> bool {
        let joined = self.registry.join(id, room).await;
        if joined {
            info!("User {} joined room: {}", id, room);
        } else {
            debug!("User {} already in room: {}", id, room);
        }
        joined
    }

    pub async fn send_message(&self, id: Uuid, payload: RoomPayload) -> usize {
        info!("Msg to room {} from {}: {}", payload.room, id, payload.message);
        let room = payload.room.clone();
        let event = ServerEvent::ReceiveMessage(Relayed::from_payload(id, payload));
        self.registry.broadcast_to_room(&room, &event, Some(id)).await
    }

    /// Deletion is advisory: peers are told, nothing server-side changes.
    pub async fn delete_message(&self, id: Uuid, payload: RoomPayload) -> usize {
        info!("Delete notice to room {} from {}: {}", payload.room, id, payload.message);
        let room = payload.room.clone();
        let event = ServerEvent::DeleteMessage(Relayed::from_payload(id, payload));
        self.registry.broadcast_to_room(&room, &event, Some(id)).await
    }

    pub async fn on_disconnect(&self, id: Uuid) {
        if self.registry.remove(&id).await {
            info!("User disconnected: {}", id);
        }
    }

    pub async fn handle_event(&self, id: Uuid, event: ClientEvent) {
        match event {
            ClientEvent::JoinRoom(room) => {
                self.join_room(id, &room).await;
            }
            ClientEvent::SendMessage(payload) => {
                let peers = self.send_message(id, payload).await;
                debug!("Relayed message from {} to {} peers", id, peers);
            }
            ClientEvent::DeleteMessage(payload) => {
                let peers = self.delete_message(id, payload).await;
                debug!("Relayed delete notice from {} to {} peers", id, peers);
            }
        }
    }

    /// Parses one text frame. Frames that are not a known event are dropped.
    pub async fn handle_text(&self, id: Uuid, text: &str) {
        match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => self.handle_event(id, event).await,
            Err(e) => warn!("Dropping malformed frame from {}: {}", id, e),
        }
    }
}
