use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Body of `send_message` and `delete_message` frames sent by a client.
///
/// `message` is opaque to the relay and forwarded verbatim, so any JSON value
/// is accepted. Missing fields deserialize to defaults instead of rejecting
/// the frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomPayload {
    #[serde(default)]
    pub room: String,
    #[serde(default)]
    pub message: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
}

impl RoomPayload {
    pub fn new(room: impl Into<String>, message: impl Into<Value>) -> Self {
        Self {
            room: room.into(),
            message: message.into(),
            id: None,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }
}

/// A payload as delivered to the other members of a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relayed {
    pub sender: Uuid,
    pub room: String,
    pub message: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
}

impl Relayed {
    pub fn from_payload(sender: Uuid, payload: RoomPayload) -> Self {
        Self {
            sender,
            room: payload.room,
            message: payload.message,
            id: payload.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientEvent {
    #[serde(rename = "join_room")]
    JoinRoom(String),
    #[serde(rename = "send_message")]
    SendMessage(RoomPayload),
    #[serde(rename = "delete_message")]
    DeleteMessage(RoomPayload),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerEvent {
    #[serde(rename = "connected")]
    Connected { id: Uuid },
    #[serde(rename = "receive_message")]
    ReceiveMessage(Relayed),
    #[serde(rename = "delete_message")]
    DeleteMessage(Relayed),
}

/// Names of server events a client can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    ReceiveMessage,
    DeleteMessage,
}

impl ServerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ServerEvent::Connected { .. } => EventKind::Connected,
            ServerEvent::ReceiveMessage(_) => EventKind::ReceiveMessage,
            ServerEvent::DeleteMessage(_) => EventKind::DeleteMessage,
        }
    }
}
