//! # Event System
//!
//! Ephemeral status events and the session-keyed broadcaster that fans them
//! out to live subscribers. Events are delivered to whoever is subscribed at
//! publish time and then discarded - this is a live status feed, not a
//! durable log.

pub mod broadcaster;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use broadcaster::{StatusBroadcaster, SubscribeError, SubscriptionHandle};

/// Tag identifying what a status event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Progress,
    Ping,
    Pong,
    Error,
    Complete,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Progress => "progress",
            EventKind::Ping => "ping",
            EventKind::Pong => "pong",
            EventKind::Error => "error",
            EventKind::Complete => "complete",
        }
    }

    /// Terminal kinds tell well-behaved clients to stop listening.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::Complete | EventKind::Error)
    }
}

/// A status event published under a session id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub session_id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub payload: Value,
    pub published_at: DateTime<Utc>,
}

impl StatusEvent {
    pub fn new(session_id: impl Into<String>, kind: EventKind, payload: Value) -> Self {
        Self {
            session_id: session_id.into(),
            kind,
            payload,
            published_at: Utc::now(),
        }
    }

    /// A pong carrying the current time as an ISO-8601 string payload.
    pub fn pong(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            kind: EventKind::Pong,
            payload: serde_json::json!({ "timestamp": now.to_rfc3339() }),
            published_at: now,
        }
    }
}

/// Opaque routing key partitioning published events: `"<feed>_<session_id>"`.
///
/// Feeds use disjoint name prefixes, so two feeds never share a topic even
/// when their session ids collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic(String);

impl Topic {
    pub fn new(feed: &str, session_id: &str) -> Self {
        Self(format!("{feed}_{session_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_serialization() {
        let json = serde_json::to_string(&EventKind::Progress).unwrap();
        assert_eq!(json, "\"progress\"");
        assert_eq!(EventKind::Pong.as_str(), "pong");
        assert!(EventKind::Complete.is_terminal());
        assert!(!EventKind::Ping.is_terminal());
    }

    #[test]
    fn test_event_serializes_kind_as_type() {
        let event = StatusEvent::new("abc123", EventKind::Complete, serde_json::json!({}));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "complete");
        assert_eq!(value["session_id"], "abc123");
    }

    #[test]
    fn test_topics_with_distinct_feeds_never_collide() {
        let doc = Topic::new("document_status", "abc");
        let health = Topic::new("system_health", "abc");
        assert_ne!(doc, health);
        assert_eq!(doc.as_str(), "document_status_abc");
    }

    #[test]
    fn test_pong_payload_carries_rfc3339_timestamp() {
        let pong = StatusEvent::pong("abc");
        let stamp = pong.payload["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());
    }
}
