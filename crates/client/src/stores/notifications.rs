//! Ephemeral toast notification queue.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::random_token;

/// Maximum number of notifications kept at once; oldest evicted first.
pub const MAX_NOTIFICATIONS: usize = 3;
/// How long a notification stays visible.
pub const NOTIFICATION_TTL: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub message: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

/// Capped, auto-expiring queue of user-facing toasts.
///
/// Expiry timers are independent and keyed by id, so a timer firing for an
/// already-evicted entry is a harmless no-op.
#[derive(Clone)]
pub struct NotificationQueue {
    inner: Arc<Mutex<Vec<Notification>>>,
    events: broadcast::Sender<Vec<Notification>>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
            events,
        }
    }

    /// Push a toast; it schedules its own removal after [`NOTIFICATION_TTL`].
    pub fn push(&self, message: impl Into<String>, severity: Severity) -> Notification {
        let note = Notification {
            id: random_token(),
            message: message.into(),
            severity,
            created_at: Utc::now(),
        };
        {
            let mut queue = self.inner.lock().unwrap();
            queue.insert(0, note.clone());
            queue.truncate(MAX_NOTIFICATIONS);
        }
        let _ = self.events.send(self.snapshot());

        let queue = self.clone();
        let id = note.id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(NOTIFICATION_TTL).await;
            queue.remove(&id);
        });

        note
    }

    /// Remove by id; a stale or evicted id is a no-op.
    pub fn remove(&self, id: &str) {
        let changed = {
            let mut queue = self.inner.lock().unwrap();
            let before = queue.len();
            queue.retain(|n| n.id != id);
            queue.len() != before
        };
        if changed {
            let _ = self.events.send(self.snapshot());
        }
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        self.inner.lock().unwrap().clone()
    }

    /// Observe queue changes; each message is the full queue contents.
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<Notification>> {
        self.events.subscribe()
    }
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn queue_is_capped_at_three_newest() {
        let queue = NotificationQueue::new();
        for i in 0..5 {
            queue.push(format!("message {i}"), Severity::Info);
        }
        let snapshot = queue.snapshot();
        assert_eq!(snapshot.len(), MAX_NOTIFICATIONS);
        assert_eq!(snapshot[0].message, "message 4");
        assert_eq!(snapshot[2].message, "message 2");
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_the_ttl() {
        let queue = NotificationQueue::new();
        queue.push("one", Severity::Success);

        tokio::time::sleep(Duration::from_millis(4900)).await;
        assert_eq!(queue.snapshot().len(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(queue.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn evicted_entry_timer_is_a_noop() {
        let queue = NotificationQueue::new();
        let first = queue.push("first", Severity::Info);
        for i in 0..3 {
            queue.push(format!("later {i}"), Severity::Info);
        }
        // "first" was evicted by the cap; its timer must not disturb the rest
        queue.remove(&first.id);
        tokio::time::sleep(Duration::from_millis(4000)).await;
        assert_eq!(queue.snapshot().len(), 3);
    }
}
