//! Topic-scoped publish/subscribe bus for outbound notifications.
//!
//! One broadcast channel per topic, created lazily on first subscribe.
//! Publishing to a topic with no current subscribers is a silent no-op:
//! notifications are never queued or replayed for late joiners. The
//! [`WILDCARD_TOPIC`] receives every session's notifications, so a single
//! registration can observe all sessions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use tracing::{trace, warn};

use crate::channel::events::{Notification, OutboundEnvelope};

/// Topic matching every session.
pub const WILDCARD_TOPIC: &str = "session:*";

/// Per-topic broadcast buffer depth. Slow subscribers that fall further
/// behind than this lose the oldest notifications.
const CHANNEL_CAPACITY: usize = 256;

/// Publish/subscribe fan-out of [`OutboundEnvelope`]s.
#[derive(Debug, Default, Clone)]
pub struct EventBus {
    topics: Arc<Mutex<HashMap<String, broadcast::Sender<OutboundEnvelope>>>>,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a topic (or [`WILDCARD_TOPIC`] for all sessions).
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<OutboundEnvelope> {
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        topics
            .entry(topic.to_owned())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Validate and broadcast a notification on `session:<session_id>`.
    ///
    /// The notification is serialized once up front; if that fails the frame
    /// is dropped with a warning rather than forwarded malformed.
    pub fn publish(&self, session_id: &str, notification: Notification) {
        let envelope = OutboundEnvelope {
            topic: format!("session:{session_id}"),
            notification,
        };

        if let Err(err) = serde_json::to_string(&envelope) {
            warn!(session_id, %err, "dropping unserializable notification");
            return;
        }

        let topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        let mut delivered = 0usize;
        if let Some(sender) = topics.get(&envelope.topic) {
            delivered += sender.send(envelope.clone()).unwrap_or(0);
        }
        if let Some(sender) = topics.get(WILDCARD_TOPIC) {
            delivered += sender.send(envelope).unwrap_or(0);
        }
        trace!(session_id, delivered, "notification published");
    }
}
