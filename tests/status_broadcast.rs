//! Status broadcaster delivery guarantees, exercised the way the dashboard
//! transport layer drives it: many subscribers, concurrent publishers,
//! sessions in isolation.

use std::sync::Arc;

use serde_json::json;

use docstream_core::events::{EventKind, StatusBroadcaster};

#[tokio::test]
async fn per_session_fifo_for_every_subscriber() {
    let bus = StatusBroadcaster::new("document_status");
    let mut first = bus.subscribe("upload-1").unwrap();
    let mut second = bus.subscribe("upload-1").unwrap();

    for i in 0..10 {
        bus.publish("upload-1", EventKind::Progress, json!({ "seq": i }));
    }
    bus.publish("upload-1", EventKind::Complete, json!({}));

    for handle in [&mut first, &mut second] {
        for i in 0..10 {
            let event = handle.recv().await.unwrap();
            assert_eq!(event.kind, EventKind::Progress);
            assert_eq!(event.payload["seq"], i);
        }
        assert_eq!(handle.recv().await.unwrap().kind, EventKind::Complete);
    }
}

#[tokio::test]
async fn sessions_are_fully_isolated() {
    let bus = StatusBroadcaster::new("document_status");
    let mut abc = bus.subscribe("abc123").unwrap();
    let mut xyz = bus.subscribe("xyz789").unwrap();

    bus.publish("abc123", EventKind::Progress, json!({"done": 3, "total": 10}));
    bus.publish("abc123", EventKind::Complete, json!({}));
    bus.publish("xyz789", EventKind::Error, json!({"message": "parse failure"}));

    let first = abc.recv().await.unwrap();
    assert_eq!(first.kind, EventKind::Progress);
    assert_eq!(first.session_id, "abc123");
    assert_eq!(abc.recv().await.unwrap().kind, EventKind::Complete);
    assert!(abc.try_recv().is_none());

    let other = xyz.recv().await.unwrap();
    assert_eq!(other.kind, EventKind::Error);
    assert_eq!(other.session_id, "xyz789");
    assert!(xyz.try_recv().is_none());
}

#[tokio::test]
async fn no_replay_for_late_subscribers() {
    let bus = StatusBroadcaster::new("document_status");
    bus.publish("upload-1", EventKind::Progress, json!({"seq": 0}));

    let mut late = bus.subscribe("upload-1").unwrap();
    bus.publish("upload-1", EventKind::Progress, json!({"seq": 1}));

    let event = late.recv().await.unwrap();
    assert_eq!(event.payload["seq"], 1);
    assert!(late.try_recv().is_none());
}

#[tokio::test]
async fn rejected_subscription_never_receives_anything() {
    let bus = StatusBroadcaster::new("document_status");
    assert!(bus.subscribe("").is_err());
    assert_eq!(bus.session_count(), 0);

    // Publishing afterwards reaches nobody
    assert_eq!(bus.publish("", EventKind::Progress, json!({})), 0);
}

#[tokio::test]
async fn unsubscribe_stops_delivery_and_is_idempotent() {
    let bus = StatusBroadcaster::new("document_status");
    let mut kept = bus.subscribe("upload-1").unwrap();
    let removed = bus.subscribe("upload-1").unwrap();

    bus.unsubscribe(&removed);
    bus.unsubscribe(&removed); // no-op

    assert_eq!(bus.publish("upload-1", EventKind::Progress, json!({})), 1);
    assert!(kept.try_recv().is_some());
}

#[tokio::test]
async fn pong_timestamp_is_at_or_after_ping_time() {
    let bus = StatusBroadcaster::new("document_status");
    let handle = bus.subscribe("upload-1").unwrap();

    // Concurrent publishes to the same session must not disturb the probe
    bus.publish("upload-1", EventKind::Progress, json!({}));
    let issued = chrono::Utc::now();
    let pong = bus.ping(&handle);

    assert_eq!(pong.kind, EventKind::Pong);
    assert!(pong.published_at >= issued);
    let stamp = pong.payload["timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());
}

#[tokio::test]
async fn concurrent_publishers_one_session_each_stay_ordered() {
    let bus = Arc::new(StatusBroadcaster::new("document_status"));
    let sessions = ["upload-a", "upload-b", "upload-c"];
    let mut handles = Vec::new();
    for session in sessions {
        handles.push((session, bus.subscribe(session).unwrap()));
    }

    let mut publishers = Vec::new();
    for session in sessions {
        let bus = Arc::clone(&bus);
        publishers.push(tokio::spawn(async move {
            for i in 0..50 {
                bus.publish(session, EventKind::Progress, json!({ "seq": i }));
            }
            bus.publish(session, EventKind::Complete, json!({}));
        }));
    }
    for publisher in publishers {
        publisher.await.unwrap();
    }

    for (session, mut handle) in handles {
        for i in 0..50 {
            let event = handle.recv().await.unwrap();
            assert_eq!(event.session_id, session);
            assert_eq!(event.payload["seq"], i);
        }
        assert_eq!(handle.recv().await.unwrap().kind, EventKind::Complete);
    }
}

#[tokio::test]
async fn disjoint_feeds_do_not_leak_even_with_equal_session_ids() {
    let doc_bus = StatusBroadcaster::new("document_status");
    let health_bus = StatusBroadcaster::new("system_health");

    let mut doc = doc_bus.subscribe("abc").unwrap();
    let mut health = health_bus.subscribe("abc").unwrap();

    doc_bus.publish("abc", EventKind::Progress, json!({}));

    assert!(doc.try_recv().is_some());
    assert!(health.try_recv().is_none());
}
