use std::collections::{HashMap, HashSet};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;
use crate::error::{AppError, WebSocketError};
use crate::relay::ServerEvent;
use tracing::{debug, warn};

pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Live connections and the rooms they belong to.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    connections: RwLock<HashMap<Uuid, EventSender>>,
    rooms: RwLock<HashMap<String, HashSet<Uuid>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, id: Uuid, sender: EventSender) {
        self.connections.write().await.insert(id, sender);
        debug!("Added connection {} to registry", id);
    }

    /// Drops the connection and its membership in every room. Rooms left
    /// without members are removed.
    pub async fn remove(&self, id: &Uuid) -> bool {
        let removed = self.connections.write().await.remove(id).is_some();

        let mut rooms = self.rooms.write().await;
        rooms.retain(|name, members| {
            if members.remove(id) {
                debug!("Connection {} left room {}", id, name);
            }
            !members.is_empty()
        });

        if removed {
            debug!("Removed connection {} from registry", id);
        }
        removed
    }

    /// Returns `true` when the connection was not yet a member.
    pub async fn join(&self, id: Uuid, room: &str) -> bool {
        if !self.connections.read().await.contains_key(&id) {
            warn!("Connection {} is not registered, ignoring join of {}", id, room);
            return false;
        }

        self.rooms
            .write()
            .await
            .entry(room.to_string())
            .or_default()
            .insert(id)
    }

    /// Queues `event` for every member of `room` except `exclude_id`.
    /// Returns how many members it was queued for.
    pub async fn broadcast_to_room(
        &self,
        room: &str,
        event: &ServerEvent,
        exclude_id: Option<Uuid>,
    ) -> usize {
        let rooms = self.rooms.read().await;
        let Some(members) = rooms.get(room) else {
            return 0;
        };
        let connections = self.connections.read().await;

        let mut delivered = 0;
        for id in members {
            if Some(*id) == exclude_id {
                continue;
            }

            match connections.get(id) {
                Some(sender) => {
                    if let Err(e) = sender.send(event.clone()) {
                        warn!("Failed to relay to connection {}: {}", id, e);
                    } else {
                        delivered += 1;
                    }
                }
                None => warn!("Room {} lists unknown connection {}", room, id),
            }
        }

        delivered
    }

    pub async fn send_to(&self, id: &Uuid, event: ServerEvent) -> Result<(), AppError> {
        if let Some(sender) = self.connections.read().await.get(id) {
            sender
                .send(event)
                .map_err(|e| WebSocketError::SendError(e.to_string()))?;
            Ok(())
        } else {
            Err(WebSocketError::ConnectionError(format!("Connection {} not found", id)).into())
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn members(&self, room: &str) -> Vec<Uuid> {
        self.rooms
            .read()
            .await
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub async fn rooms_of(&self, id: &Uuid) -> Vec<String> {
        let mut names: Vec<String> = self
            .rooms
            .read()
            .await
            .iter()
            .filter(|(_, members)| members.contains(id))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}
