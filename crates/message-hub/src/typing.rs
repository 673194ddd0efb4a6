use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use crate::events::ChatEvent;
use crate::hub::Hub;

/// Minimum gap between typing notifications the hub will forward for the
/// same (room, sender) pair.
const DEDUP_WINDOW_SECS: u64 = 2;
/// Entries older than this are stale and swept by the janitor, bounding
/// memory growth from senders who typed once and never came back.
const SWEEP_AFTER_SECS: u64 = 300;

pub struct TypingTracker {
    last_typing: StdMutex<HashMap<String, u64>>,
}

impl Default for TypingTracker {
    fn default() -> Self {
        TypingTracker {
            last_typing: StdMutex::new(HashMap::new()),
        }
    }
}

impl TypingTracker {
    /// Publishes a `Typing` event through `hub` unless this sender already
    /// notified within the dedup window. Returns whether it was forwarded.
    pub async fn notify(
        &self,
        hub: &Hub,
        room_id: &str,
        sender: &str,
        sender_type: Option<String>,
    ) -> bool {
        let key = format!("{room_id}:{sender}");
        let now = now_secs();
        {
            let mut map = self.last_typing.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(&last) = map.get(&key) {
                if now.saturating_sub(last) < DEDUP_WINDOW_SECS {
                    return false;
                }
            }
            map.insert(key, now);
        }
        hub.publish(ChatEvent::Typing {
            room_id: room_id.to_string(),
            sender: sender.to_string(),
            sender_type,
        })
        .await;
        true
    }

    fn sweep(&self) {
        let now = now_secs();
        let mut map = self.last_typing.lock().unwrap_or_else(|e| e.into_inner());
        map.retain(|_, &mut last| now.saturating_sub(last) < SWEEP_AFTER_SECS);
    }
}

fn now_secs() -> u64 {
    chrono::Utc::now().timestamp() as u64
}

pub fn spawn_sweeper(tracker: Arc<TypingTracker>) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(60)).await;
            tracker.sweep();
        }
    });
}
