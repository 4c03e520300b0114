// In-process pub/sub. Every event carries a topic; subscribers filter by
// topic prefix. Delivery is best-effort: a subscriber whose bounded channel
// overflows is dropped and counted, never blocks a publisher.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub topic: String,
    pub ts: chrono::DateTime<chrono::Utc>,
    pub payload: serde_json::Value,
}

impl Event {
    pub fn new(topic: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            topic: topic.into(),
            ts: chrono::Utc::now(),
            payload,
        }
    }

    pub fn heartbeat() -> Self {
        Self {
            topic: "_heartbeat".into(),
            ts: chrono::Utc::now(),
            payload: serde_json::Value::Null,
        }
    }
}

#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    dropped: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SUBSCRIBER_BUFFER)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            dropped: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, event: Event) {
        if self.sender.send(event).is_err() {
            // No subscribers currently attached; not a drop, just a no-op.
        }
    }

    /// A raw subscription; callers filter by topic prefix themselves so the
    /// bus never inspects topic strings beyond routing.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn record_dropped(&self, n: u64) {
        self.dropped.fetch_add(n, Ordering::Relaxed);
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

pub fn topic_matches(filter: &str, topic: &str) -> bool {
    if filter.is_empty() || filter == "*" {
        return true;
    }
    match filter.strip_suffix(".*") {
        Some(prefix) => topic.starts_with(prefix),
        None => filter == topic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_is_received_by_subscriber() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(Event::new("agent.state", serde_json::json!({"id": "dev-A"})));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.topic, "agent.state");
    }

    #[test]
    fn topic_wildcard_matches_prefix() {
        assert!(topic_matches("log.*", "log.warn"));
        assert!(!topic_matches("log.*", "agent.state"));
        assert!(topic_matches("agent.state", "agent.state"));
    }
}
