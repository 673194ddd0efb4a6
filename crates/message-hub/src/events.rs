use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::{Message, PresenceEntry, Reaction, ReadPosition, Room};

/// Every real-time event the hub can push to a room's connected sessions.
/// Wire tag is `type`; see `session::outbound_frame` for the envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    Message(Message),
    MessageEdited {
        #[serde(flatten)]
        message: Message,
        edit_number: i64,
    },
    MessageDeleted { room_id: String, message_id: String },
    MessagePinned(Message),
    MessageUnpinned(Message),
    ReactionAdded(Reaction),
    ReactionRemoved { room_id: String, message_id: String, sender: String, emoji: String },
    Typing { room_id: String, sender: String, sender_type: Option<String> },
    PresenceJoined { room_id: String, entry: PresenceEntry },
    PresenceLeft { room_id: String, sender: String },
    ReadPositionUpdated(ReadPosition),
    RoomUpdated(Room),
    RoomArchived { room_id: String },
    RoomUnarchived { room_id: String },
    Heartbeat,
}

impl ChatEvent {
    /// The room this event belongs to, used to route it to the right
    /// `RoomState` broadcast channel. `None` events are not room-scoped.
    pub fn room_id(&self) -> Option<&str> {
        match self {
            ChatEvent::Message(m) => Some(&m.room_id),
            ChatEvent::MessageEdited { message, .. } => Some(&message.room_id),
            ChatEvent::MessageDeleted { room_id, .. } => Some(room_id),
            ChatEvent::MessagePinned(m) | ChatEvent::MessageUnpinned(m) => Some(&m.room_id),
            ChatEvent::ReactionAdded(r) => Some(&r.room_id),
            ChatEvent::ReactionRemoved { room_id, .. } => Some(room_id),
            ChatEvent::Typing { room_id, .. } => Some(room_id),
            ChatEvent::PresenceJoined { room_id, .. } => Some(room_id),
            ChatEvent::PresenceLeft { room_id, .. } => Some(room_id),
            ChatEvent::ReadPositionUpdated(r) => Some(&r.room_id),
            ChatEvent::RoomUpdated(r) => Some(&r.id),
            ChatEvent::RoomArchived { room_id } | ChatEvent::RoomUnarchived { room_id } => Some(room_id),
            ChatEvent::Heartbeat => None,
        }
    }
}

/// Process-wide fan-out used by webhook dispatch and cross-room features
/// (the activity feed, search reindex hooks). Per-room real-time delivery
/// goes through `hub::RoomState`'s own bounded channel instead.
pub struct EventBus {
    pub sender: broadcast::Sender<ChatEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);
        EventBus { sender }
    }

    pub fn publish(&self, event: ChatEvent) {
        let _ = self.sender.send(event);
    }
}
