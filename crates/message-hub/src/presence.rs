use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::events::ChatEvent;
use crate::hub::Hub;
use crate::models::PresenceEntry;

/// Grace period between a session's last connection dropping and the
/// `PresenceLeft` event firing — absorbs WebSocket reconnects (network
/// blips, client tab reload) without flapping presence for other viewers.
const LINGER: Duration = Duration::from_secs(5);

struct PresenceInner {
    sender: String,
    sender_type: Option<String>,
    connected_at: String,
    connections: usize,
    /// Bumped every time a connection opens; a pending linger-expiry check
    /// compares against this to detect a reconnect that happened in the
    /// meantime and abort the removal.
    generation: u64,
}

#[derive(Clone)]
pub struct PresenceTracker {
    inner: Arc<RwLock<HashMap<String, HashMap<String, PresenceInner>>>>,
}

impl Default for PresenceTracker {
    fn default() -> Self {
        PresenceTracker {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl PresenceTracker {
    /// Registers a connection. Returns `Some(entry)` the first time this
    /// sender appears in the room (fresh join, should be broadcast).
    pub fn join(&self, room_id: &str, sender: &str, sender_type: Option<&str>) -> Option<PresenceEntry> {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let room = map.entry(room_id.to_string()).or_default();
        let is_new = !room.contains_key(sender);
        let entry = room.entry(sender.to_string()).or_insert_with(|| PresenceInner {
            sender: sender.to_string(),
            sender_type: sender_type.map(String::from),
            connected_at: chrono::Utc::now().to_rfc3339(),
            connections: 0,
            generation: 0,
        });
        entry.connections += 1;
        entry.generation += 1;
        if sender_type.is_some() && entry.sender_type.is_none() {
            entry.sender_type = sender_type.map(String::from);
        }
        is_new.then(|| PresenceEntry {
            sender: entry.sender.clone(),
            sender_type: entry.sender_type.clone(),
            connected_at: entry.connected_at.clone(),
        })
    }

    /// Drops a connection. If this was the last one, schedules a linger
    /// task that emits `PresenceLeft` through `hub` unless the sender
    /// reconnects before the grace period elapses.
    pub fn leave(&self, hub: Arc<Hub>, room_id: String, sender: String) {
        let generation_at_drop = {
            let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
            let Some(room) = map.get_mut(&room_id) else {
                return;
            };
            let Some(entry) = room.get_mut(&sender) else {
                return;
            };
            entry.connections = entry.connections.saturating_sub(1);
            if entry.connections > 0 {
                return;
            }
            entry.generation
        };

        let tracker = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(LINGER).await;
            let still_gone = {
                let mut map = tracker.inner.write().unwrap_or_else(|e| e.into_inner());
                match map.get_mut(&room_id) {
                    Some(room) => match room.get(&sender) {
                        Some(entry) if entry.connections == 0 && entry.generation == generation_at_drop => {
                            room.remove(&sender);
                            if room.is_empty() {
                                map.remove(&room_id);
                            }
                            true
                        }
                        _ => false,
                    },
                    None => false,
                }
            };
            if still_gone {
                hub.publish(ChatEvent::PresenceLeft { room_id, sender }).await;
            }
        });
    }

    pub fn get_room(&self, room_id: &str) -> Vec<PresenceEntry> {
        let map = self.inner.read().unwrap_or_else(|e| e.into_inner());
        map.get(room_id)
            .map(|room| {
                room.values()
                    .map(|e| PresenceEntry {
                        sender: e.sender.clone(),
                        sender_type: e.sender_type.clone(),
                        connected_at: e.connected_at.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_all(&self) -> HashMap<String, Vec<PresenceEntry>> {
        let map = self.inner.read().unwrap_or_else(|e| e.into_inner());
        map.iter()
            .map(|(room_id, room)| {
                (
                    room_id.clone(),
                    room.values()
                        .map(|e| PresenceEntry {
                            sender: e.sender.clone(),
                            sender_type: e.sender_type.clone(),
                            connected_at: e.connected_at.clone(),
                        })
                        .collect(),
                )
            })
            .collect()
    }
}
