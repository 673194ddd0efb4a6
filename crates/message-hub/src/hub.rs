use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex};

use crate::events::{ChatEvent, EventBus};

/// Outbound queue depth per session. A session that cannot keep up with
/// this many buffered events is disconnected rather than allowed to stall
/// the room's fan-out for everyone else.
pub const SESSION_QUEUE_CAPACITY: usize = 256;

pub type SessionId = String;

struct RoomState {
    subscribers: std::collections::HashMap<SessionId, mpsc::Sender<ChatEvent>>,
}

impl RoomState {
    fn new() -> Self {
        RoomState {
            subscribers: std::collections::HashMap::new(),
        }
    }
}

/// Arena of per-room subscriber registries, indexed by room id. Each room's
/// state is its own `Mutex`, so fan-out to one room never blocks on
/// another's lock — only individual sessions within a room contend.
pub struct Hub {
    rooms: DashMap<String, Arc<Mutex<RoomState>>>,
    /// Cross-cutting bus used by webhook dispatch and other consumers that
    /// want every event regardless of room, not just a single room's feed.
    pub events: Arc<EventBus>,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    pub fn new() -> Self {
        Hub {
            rooms: DashMap::new(),
            events: Arc::new(EventBus::new()),
        }
    }

    fn room(&self, room_id: &str) -> Arc<Mutex<RoomState>> {
        self.rooms
            .entry(room_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(RoomState::new())))
            .clone()
    }

    /// Registers a session's outbound queue for a room. Returns the
    /// receiver the session's writer task should drain.
    pub async fn subscribe(&self, room_id: &str, session_id: SessionId) -> mpsc::Receiver<ChatEvent> {
        let (tx, rx) = mpsc::channel(SESSION_QUEUE_CAPACITY);
        let room = self.room(room_id);
        let mut state = room.lock().await;
        state.subscribers.insert(session_id, tx);
        rx
    }

    pub async fn unsubscribe(&self, room_id: &str, session_id: &str) {
        if let Some(room) = self.rooms.get(room_id) {
            let mut state = room.lock().await;
            state.subscribers.remove(session_id);
        }
    }

    /// Publishes an event both to the room's live subscribers and to the
    /// process-wide bus. Subscribers whose queue is full are dropped on the
    /// spot — `try_send` never blocks the publisher waiting on a slow peer.
    pub async fn publish(&self, event: ChatEvent) {
        self.events.publish(event.clone());

        let Some(room_id) = event.room_id() else {
            return;
        };
        let Some(room) = self.rooms.get(room_id) else {
            return;
        };
        let room = room.clone();
        let mut state = room.lock().await;
        let mut dead = Vec::new();
        for (session_id, tx) in state.subscribers.iter() {
            if let Err(mpsc::error::TrySendError::Full(_) | mpsc::error::TrySendError::Closed(_)) =
                tx.try_send(event.clone())
            {
                dead.push(session_id.clone());
            }
        }
        for session_id in dead {
            tracing::warn!(room_id, session_id, "hub: disconnecting slow subscriber");
            state.subscribers.remove(&session_id);
        }
    }

    pub async fn subscriber_count(&self, room_id: &str) -> usize {
        match self.rooms.get(room_id) {
            Some(room) => room.lock().await.subscribers.len(),
            None => 0,
        }
    }
}
