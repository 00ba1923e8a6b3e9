//! # Status Broadcaster
//!
//! Session-keyed publish/subscribe fan-out for live status feeds.
//!
//! ## Overview
//!
//! The broadcaster maintains a concurrency-safe registry mapping topics
//! (feed name + session id) to the live subscriber channels for that topic.
//! Producers (the processing pipeline, the health monitor) publish events
//! tagged with a session id; every current subscriber of that session
//! receives them in publish order. Subscribers that join late miss earlier
//! events and a dead subscriber never blocks delivery to the others.
//!
//! ## Ownership
//!
//! The registry holds only the sending half of each subscription; the
//! transport layer owns the [`SubscriptionHandle`] with the receiving half.
//! Dropping the handle ends delivery, and the dead sender is pruned on the
//! next publish to that session.

use std::collections::HashMap;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{EventKind, StatusEvent, Topic};
use crate::error::DocstreamError;

/// Error types for subscription requests
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscribeError {
    #[error("subscription requires a session id")]
    MissingSessionId,
}

impl From<SubscribeError> for DocstreamError {
    fn from(err: SubscribeError) -> Self {
        DocstreamError::BroadcastError(err.to_string())
    }
}

/// A live subscription to one session's status feed.
///
/// Owns the receiving half of the subscription channel. Dropping the handle
/// (or the transport connection behind it) terminates the subscription.
#[derive(Debug)]
pub struct SubscriptionHandle {
    id: Uuid,
    session_id: String,
    receiver: mpsc::UnboundedReceiver<StatusEvent>,
}

impl SubscriptionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Receive the next event, waiting until one is published or the
    /// broadcaster drops the sending half.
    pub async fn recv(&mut self) -> Option<StatusEvent> {
        self.receiver.recv().await
    }

    /// Non-blocking receive for callers polling between transport writes.
    pub fn try_recv(&mut self) -> Option<StatusEvent> {
        self.receiver.try_recv().ok()
    }
}

/// In-process topic registry fanning out [`StatusEvent`]s per session id.
#[derive(Debug)]
pub struct StatusBroadcaster {
    feed: String,
    topics: DashMap<String, HashMap<Uuid, mpsc::UnboundedSender<StatusEvent>>>,
}

impl StatusBroadcaster {
    /// Create a broadcaster for the given feed name prefix.
    pub fn new(feed: impl Into<String>) -> Self {
        Self {
            feed: feed.into(),
            topics: DashMap::new(),
        }
    }

    pub fn feed(&self) -> &str {
        &self.feed
    }

    fn topic(&self, session_id: &str) -> Topic {
        Topic::new(&self.feed, session_id)
    }

    /// Register a subscriber for all future events under `session_id`.
    ///
    /// Rejects an empty or blank session id synchronously; nothing is
    /// registered in that case. Subscription is purely additive - events
    /// published before the subscribe call are not replayed.
    pub fn subscribe(&self, session_id: &str) -> Result<SubscriptionHandle, SubscribeError> {
        if session_id.trim().is_empty() {
            warn!(feed = %self.feed, "Rejecting subscription without a session id");
            return Err(SubscribeError::MissingSessionId);
        }

        let id = Uuid::new_v4();
        let (sender, receiver) = mpsc::unbounded_channel();
        let topic = self.topic(session_id);

        self.topics
            .entry(topic.as_str().to_string())
            .or_default()
            .insert(id, sender);

        debug!(topic = %topic, subscription_id = %id, "Registered subscriber");

        Ok(SubscriptionHandle {
            id,
            session_id: session_id.to_string(),
            receiver,
        })
    }

    /// Remove a subscription. Idempotent: unsubscribing a handle that was
    /// already removed (or never registered) is a no-op.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) {
        let topic = self.topic(&handle.session_id);
        if let Some(mut subscribers) = self.topics.get_mut(topic.as_str()) {
            if subscribers.remove(&handle.id).is_some() {
                debug!(topic = %topic, subscription_id = %handle.id, "Unregistered subscriber");
            }
            if subscribers.is_empty() {
                drop(subscribers);
                self.topics
                    .remove_if(topic.as_str(), |_, subs| subs.is_empty());
            }
        }
    }

    /// Deliver an event to every live subscriber of `session_id`, in publish
    /// order for that session. Returns the number of subscribers reached.
    ///
    /// Delivery is best-effort and at-most-once: a subscriber whose
    /// transport is gone is skipped (and pruned) without affecting the
    /// others, and publishing to a session with no subscribers is fine.
    pub fn publish(&self, session_id: &str, kind: EventKind, payload: Value) -> usize {
        let event = StatusEvent::new(session_id, kind, payload);
        self.publish_event(event)
    }

    /// Deliver an already-built event under its own session id.
    pub fn publish_event(&self, event: StatusEvent) -> usize {
        let topic = self.topic(&event.session_id);

        // Snapshot the subscriber set, then deliver outside the map guard so
        // a slow pruning pass never holds up other sessions' publishers.
        let subscribers: Vec<(Uuid, mpsc::UnboundedSender<StatusEvent>)> =
            match self.topics.get(topic.as_str()) {
                Some(entry) => entry.iter().map(|(id, tx)| (*id, tx.clone())).collect(),
                None => {
                    debug!(topic = %topic, "No subscribers for published event");
                    return 0;
                }
            };

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (id, sender) in subscribers {
            if sender.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(id);
            }
        }

        if !dead.is_empty() {
            if let Some(mut entry) = self.topics.get_mut(topic.as_str()) {
                for id in &dead {
                    entry.remove(id);
                }
            }
            debug!(topic = %topic, pruned = dead.len(), "Pruned dead subscribers");
        }

        delivered
    }

    /// Answer a subscriber-initiated liveness probe.
    ///
    /// Immediately returns (and best-effort delivers) a pong event stamped
    /// with the current time, without touching the session's event flow.
    pub fn ping(&self, handle: &SubscriptionHandle) -> StatusEvent {
        let pong = StatusEvent::pong(&handle.session_id);
        let topic = self.topic(&handle.session_id);

        if let Some(entry) = self.topics.get(topic.as_str()) {
            if let Some(sender) = entry.get(&handle.id) {
                let _ = sender.send(pong.clone());
            }
        }

        pong
    }

    /// Number of live subscribers for a session.
    pub fn subscriber_count(&self, session_id: &str) -> usize {
        self.topics
            .get(self.topic(session_id).as_str())
            .map(|entry| entry.len())
            .unwrap_or(0)
    }

    /// Number of sessions with at least one subscriber.
    pub fn session_count(&self) -> usize {
        self.topics.len()
    }
}
