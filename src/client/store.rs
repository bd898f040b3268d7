use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::AppError;
use crate::relay::Relayed;
use crate::Result;

pub const EMPTY_PREVIEW: &str = "No messages yet";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub room: String,
    pub sender: Option<Uuid>,
    pub text: String,
    pub self_sent: bool,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub room: String,
    pub messages: Vec<ChatMessage>,
    pub preview: String,
    pub last_activity: Option<DateTime<Utc>>,
    pub unread: usize,
}

impl Conversation {
    fn new(room: &str) -> Self {
        Self {
            room: room.to_string(),
            messages: Vec::new(),
            preview: EMPTY_PREVIEW.to_string(),
            last_activity: None,
            unread: 0,
        }
    }

    fn contains(&self, id: Uuid) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }

    fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.refresh_summary();
    }

    fn remove(&mut self, id: Uuid) -> Option<ChatMessage> {
        let position = self.messages.iter().position(|m| m.id == id)?;
        let removed = self.messages.remove(position);
        self.refresh_summary();
        Some(removed)
    }

    fn refresh_summary(&mut self) {
        match self.messages.last() {
            Some(last) => {
                self.preview = last.text.clone();
                self.last_activity = Some(last.sent_at);
            }
            None => {
                self.preview = EMPTY_PREVIEW.to_string();
                self.last_activity = None;
            }
        }
    }
}

/// Text shown for a relayed payload. Strings are used as-is, anything else
/// is rendered as JSON.
fn display_text(message: &Value) -> String {
    match message {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Client-side conversations, keyed by room name.
///
/// Remote messages are placed by the room they were sent to. The active
/// conversation only decides what is displayed and which threads collect
/// unread counts.
#[derive(Debug, Default)]
pub struct MessageStore {
    conversations: Vec<Conversation>,
    active: Option<String>,
    self_id: Option<Uuid>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_self_id(&mut self, id: Uuid) {
        self.self_id = Some(id);
    }

    pub fn self_id(&self) -> Option<Uuid> {
        self.self_id
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn conversation(&self, room: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.room == room)
    }

    fn conversation_mut(&mut self, room: &str) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.room == room)
    }

    fn conversation_entry(&mut self, room: &str) -> &mut Conversation {
        let index = match self.conversations.iter().position(|c| c.room == room) {
            Some(index) => index,
            None => {
                self.conversations.push(Conversation::new(room));
                self.conversations.len() - 1
            }
        };
        &mut self.conversations[index]
    }

    pub fn active_room(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active_thread(&self) -> &[ChatMessage] {
        self.active
            .as_deref()
            .and_then(|room| self.conversation(room))
            .map(|c| c.messages.as_slice())
            .unwrap_or_default()
    }

    /// Creates the conversation if needed and focuses it. Blank names are
    /// rejected here so they never reach the relay.
    pub fn open_conversation(&mut self, room: &str) -> Result<&Conversation> {
        if room.trim().is_empty() {
            return Err(AppError::ValidationError("Room name must not be empty".to_string()));
        }

        self.conversation_entry(room).unread = 0;
        self.active = Some(room.to_string());
        self.conversation(room)
            .ok_or_else(|| AppError::InternalError(format!("Conversation {} vanished", room)))
    }

    /// Focuses an existing conversation. Returns `false` for unknown rooms.
    pub fn set_active(&mut self, room: &str) -> bool {
        match self.conversation_mut(room) {
            Some(conversation) => {
                conversation.unread = 0;
                self.active = Some(room.to_string());
                true
            }
            None => false,
        }
    }

    /// Optimistically appends a self-sent message to the active thread.
    pub fn send_local(&mut self, text: &str) -> Result<ChatMessage> {
        if text.trim().is_empty() {
            return Err(AppError::ValidationError("Message must not be empty".to_string()));
        }
        let room = self
            .active
            .clone()
            .ok_or_else(|| AppError::ValidationError("Join a room before sending".to_string()))?;

        let message = ChatMessage {
            id: Uuid::new_v4(),
            room: room.clone(),
            sender: self.self_id,
            text: text.to_string(),
            self_sent: true,
            sent_at: Utc::now(),
        };
        self.conversation_entry(&room).push(message.clone());
        Ok(message)
    }

    /// Appends a peer's message to the conversation of the room it was sent
    /// to. Own echoes and already known message ids are ignored.
    pub fn receive_remote(&mut self, relayed: &Relayed) -> bool {
        if self.self_id == Some(relayed.sender) {
            return false;
        }

        let is_active = self.active.as_deref() == Some(relayed.room.as_str());
        let conversation = self.conversation_entry(&relayed.room);
        if let Some(id) = relayed.id {
            if conversation.contains(id) {
                return false;
            }
        }

        conversation.push(ChatMessage {
            id: relayed.id.unwrap_or_else(Uuid::new_v4),
            room: relayed.room.clone(),
            sender: Some(relayed.sender),
            text: display_text(&relayed.message),
            self_sent: false,
            sent_at: Utc::now(),
        });
        if !is_active {
            conversation.unread += 1;
        }
        true
    }

    /// Removes a message from the active thread by id.
    pub fn delete_local(&mut self, id: Uuid) -> Option<ChatMessage> {
        let room = self.active.clone()?;
        self.conversation_mut(&room)?.remove(id)
    }

    /// Applies a peer's deletion notice. Only messages that peer sent in that
    /// room are removed; anything else is left alone.
    pub fn apply_remote_delete(&mut self, relayed: &Relayed) -> bool {
        let target = relayed.id.or_else(|| {
            relayed
                .message
                .as_str()
                .and_then(|text| Uuid::parse_str(text).ok())
        });
        let Some(target) = target else {
            return false;
        };
        let Some(conversation) = self.conversation_mut(&relayed.room) else {
            return false;
        };

        let owned_by_sender = conversation
            .messages
            .iter()
            .any(|m| m.id == target && m.sender == Some(relayed.sender));
        owned_by_sender && conversation.remove(target).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn relayed(sender: Uuid, room: &str, message: Value) -> Relayed {
        Relayed {
            sender,
            room: room.to_string(),
            message,
            id: None,
        }
    }

    #[test]
    fn test_blank_room_is_rejected() {
        let mut store = MessageStore::new();
        assert!(matches!(store.open_conversation(""), Err(AppError::ValidationError(_))));
        assert!(matches!(store.open_conversation("   "), Err(AppError::ValidationError(_))));
        assert!(store.conversations().is_empty());
        assert_eq!(store.active_room(), None);
    }

    #[test]
    fn test_send_local_appends_immediately() {
        let mut store = MessageStore::new();
        let me = Uuid::new_v4();
        store.set_self_id(me);
        store.open_conversation("general").unwrap();

        let sent = store.send_local("hi").unwrap();

        let thread = store.active_thread();
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0], sent);
        assert!(thread[0].self_sent);
        assert_eq!(thread[0].sender, Some(me));
        assert_eq!(store.conversation("general").unwrap().preview, "hi");
    }

    #[test]
    fn test_send_local_needs_text_and_room() {
        let mut store = MessageStore::new();
        assert!(matches!(store.send_local("hi"), Err(AppError::ValidationError(_))));

        store.open_conversation("general").unwrap();
        assert!(matches!(store.send_local("  \n"), Err(AppError::ValidationError(_))));
        assert!(store.active_thread().is_empty());
    }

    #[test]
    fn test_own_echo_is_ignored() {
        let mut store = MessageStore::new();
        let me = Uuid::new_v4();
        store.set_self_id(me);
        store.open_conversation("general").unwrap();

        assert!(!store.receive_remote(&relayed(me, "general", json!("echo"))));
        assert!(store.active_thread().is_empty());
    }

    #[test]
    fn test_remote_messages_route_by_room() {
        let mut store = MessageStore::new();
        let peer = Uuid::new_v4();
        store.open_conversation("x").unwrap();
        store.open_conversation("y").unwrap();

        assert!(store.receive_remote(&relayed(peer, "x", json!("for x"))));
        assert!(store.receive_remote(&relayed(peer, "z", json!({ "n": 1 }))));

        assert!(store.active_thread().is_empty());
        let x = store.conversation("x").unwrap();
        assert_eq!(x.messages[0].text, "for x");
        assert_eq!(x.unread, 1);
        assert_eq!(store.conversation("z").unwrap().messages[0].text, r#"{"n":1}"#);

        assert!(store.set_active("x"));
        assert_eq!(store.conversation("x").unwrap().unread, 0);
        assert_eq!(store.active_thread().len(), 1);
        assert!(!store.set_active("nowhere"));
    }

    #[test]
    fn test_duplicate_ids_are_not_appended_twice() {
        let mut store = MessageStore::new();
        let peer = Uuid::new_v4();
        let mut message = relayed(peer, "general", json!("once"));
        message.id = Some(Uuid::new_v4());

        assert!(store.receive_remote(&message));
        assert!(!store.receive_remote(&message));
        assert_eq!(store.conversation("general").unwrap().messages.len(), 1);
    }

    #[test]
    fn test_delete_from_middle_updates_preview() {
        let mut store = MessageStore::new();
        store.open_conversation("general").unwrap();
        store.send_local("one").unwrap();
        store.send_local("two").unwrap();
        store.send_local("three").unwrap();

        let target = store.active_thread()[1].id;
        let removed = store.delete_local(target).unwrap();
        assert_eq!(removed.text, "two");

        let texts: Vec<&str> = store.active_thread().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "three"]);
        assert_eq!(store.conversation("general").unwrap().preview, "three");
    }

    #[test]
    fn test_delete_last_updates_preview_to_previous() {
        let mut store = MessageStore::new();
        store.open_conversation("general").unwrap();
        store.send_local("one").unwrap();
        let last = store.send_local("two").unwrap();

        store.delete_local(last.id).unwrap();
        let conversation = store.conversation("general").unwrap();
        assert_eq!(conversation.preview, "one");
        assert_eq!(conversation.last_activity, Some(conversation.messages[0].sent_at));
    }

    #[test]
    fn test_delete_only_message_shows_placeholder() {
        let mut store = MessageStore::new();
        store.open_conversation("general").unwrap();
        let only = store.send_local("bye").unwrap();

        assert!(store.delete_local(only.id).is_some());
        assert!(store.delete_local(only.id).is_none());
        let conversation = store.conversation("general").unwrap();
        assert_eq!(conversation.preview, EMPTY_PREVIEW);
        assert_eq!(conversation.last_activity, None);
    }

    #[test]
    fn test_delete_by_id_survives_new_arrivals() {
        let mut store = MessageStore::new();
        let peer = Uuid::new_v4();
        store.open_conversation("general").unwrap();
        let mine = store.send_local("mine").unwrap();

        store.receive_remote(&relayed(peer, "general", json!("arrived first")));
        store.receive_remote(&relayed(peer, "general", json!("arrived second")));

        assert_eq!(store.delete_local(mine.id).unwrap().text, "mine");
        assert_eq!(store.active_thread().len(), 2);
    }

    #[test]
    fn test_remote_delete_only_touches_senders_messages() {
        let mut store = MessageStore::new();
        let peer = Uuid::new_v4();
        let other = Uuid::new_v4();
        store.open_conversation("general").unwrap();
        let mine = store.send_local("mine").unwrap();

        let mut theirs = relayed(peer, "general", json!("theirs"));
        let their_id = Uuid::new_v4();
        theirs.id = Some(their_id);
        store.receive_remote(&theirs);

        assert!(!store.apply_remote_delete(&relayed(peer, "general", json!(mine.id.to_string()))));
        assert!(!store.apply_remote_delete(&relayed(other, "general", json!(their_id.to_string()))));
        assert!(!store.apply_remote_delete(&relayed(peer, "general", json!(["not", "an", "id"]))));
        assert_eq!(store.active_thread().len(), 2);

        assert!(store.apply_remote_delete(&relayed(peer, "general", json!(their_id.to_string()))));
        assert_eq!(store.active_thread().len(), 1);
        assert_eq!(store.conversation("general").unwrap().preview, "mine");
    }
}
