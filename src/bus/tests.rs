//! Event bus and streaming session tests.
//!
//! These tests verify:
//! - Per-subscriber delivery order and overflow-drop policy
//! - Registry cleanup on drop, including cancelled sessions
//! - SSE framing, hello frames, and heartbeat cadence

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use tokio::io::{AsyncReadExt, DuplexStream};
    use tokio::time::Instant;

    use crate::bus::{EventBus, StreamSession, HEARTBEAT_INTERVAL};

    /// Read one `data: ...\n\n` frame and return the payload between the
    /// prefix and the terminator.
    async fn read_frame(reader: &mut DuplexStream) -> String {
        let mut buf = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            reader.read_exact(&mut byte).await.expect("frame read");
            buf.push(byte[0]);
            if buf.ends_with(b"\n\n") {
                break;
            }
        }
        let text = String::from_utf8(buf).expect("utf-8 frame");
        let payload = text
            .strip_prefix("data: ")
            .and_then(|rest| rest.strip_suffix("\n\n"))
            .expect("well-formed frame");
        payload.to_string()
    }

    #[tokio::test]
    async fn test_subscriber_receives_events_in_publish_order() {
        let bus = Arc::new(EventBus::new());
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.publish(&json!({ "seq": i })).unwrap();
        }

        for i in 0..5 {
            let payload = sub.recv().await.expect("queued event");
            let value: Value = serde_json::from_str(&payload).unwrap();
            assert_eq!(value["seq"], i);
        }
    }

    #[tokio::test]
    async fn test_overflow_drops_for_slow_subscriber_only() {
        let bus = Arc::new(EventBus::with_capacity(4));
        let mut slow = bus.subscribe();
        let mut live = bus.subscribe();

        // Fill both queues past the slow subscriber's capacity while only
        // draining the live one.
        for i in 0..10 {
            let delivered = bus.publish(&json!({ "seq": i })).unwrap();
            assert!(delivered >= 1, "live subscriber must always be reachable");
            let payload = live.recv().await.expect("live event");
            let value: Value = serde_json::from_str(&payload).unwrap();
            assert_eq!(value["seq"], i);
        }

        // The slow subscriber kept its first 4 events and silently lost the
        // rest, but was not unregistered.
        assert_eq!(bus.subscriber_count(), 2);
        for i in 0..4 {
            let payload = slow.try_recv().expect("buffered event");
            let value: Value = serde_json::from_str(&payload).unwrap();
            assert_eq!(value["seq"], i);
        }
        assert!(slow.try_recv().is_none());

        // Once drained it resumes receiving.
        bus.publish(&json!({ "seq": "resumed" })).unwrap();
        let payload = slow.recv().await.expect("post-drain event");
        let value: Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["seq"], "resumed");
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let bus = Arc::new(EventBus::new());
        let first = bus.subscribe();
        let second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        drop(first);
        assert_eq!(bus.subscriber_count(), 1);
        drop(second);
        assert_eq!(bus.subscriber_count(), 0);

        // Publishing to an empty registry is fine.
        assert_eq!(bus.publish(&json!({ "type": "noop" })).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_subscribe_publish_unsubscribe() {
        let bus = Arc::new(EventBus::new());

        let publisher = {
            let bus = bus.clone();
            tokio::spawn(async move {
                for i in 0..200 {
                    bus.publish(&json!({ "seq": i })).unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        let churner = {
            let bus = bus.clone();
            tokio::spawn(async move {
                for _ in 0..100 {
                    let sub = bus.subscribe();
                    tokio::task::yield_now().await;
                    drop(sub);
                }
            })
        };

        publisher.await.unwrap();
        churner.await.unwrap();
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_session_emits_hello_then_relays_events() {
        let bus = Arc::new(EventBus::new());
        let (downstream, mut client) = tokio::io::duplex(4096);
        let session = StreamSession::open(&bus, downstream);
        let handle = tokio::spawn(session.run());

        let hello: Value = serde_json::from_str(&read_frame(&mut client).await).unwrap();
        assert_eq!(hello["type"], "hello");
        assert!(hello["ts"].is_string());

        bus.publish(&json!({ "type": "project_updated", "project": { "id": "p1" } }))
            .unwrap();
        let event: Value = serde_json::from_str(&read_frame(&mut client).await).unwrap();
        assert_eq!(event["type"], "project_updated");
        assert_eq!(event["project"]["id"], "p1");

        handle.abort();
        let _ = handle.await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_session_heartbeats_every_fifteen_seconds() {
        let bus = Arc::new(EventBus::new());
        let (downstream, mut client) = tokio::io::duplex(4096);
        let session = StreamSession::open(&bus, downstream);
        let handle = tokio::spawn(session.run());

        let hello: Value = serde_json::from_str(&read_frame(&mut client).await).unwrap();
        assert_eq!(hello["type"], "hello");
        let start = Instant::now();

        let first: Value = serde_json::from_str(&read_frame(&mut client).await).unwrap();
        assert_eq!(first["type"], "heartbeat");
        let first_at = start.elapsed();
        assert!(first_at >= HEARTBEAT_INTERVAL);
        assert!(first_at < Duration::from_secs(20));

        let second: Value = serde_json::from_str(&read_frame(&mut client).await).unwrap();
        assert_eq!(second["type"], "heartbeat");
        assert!(start.elapsed() >= first_at + HEARTBEAT_INTERVAL);

        handle.abort();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn test_disconnect_terminates_session_and_unsubscribes() {
        let bus = Arc::new(EventBus::new());
        let (downstream, client) = tokio::io::duplex(64);
        let session = StreamSession::open(&bus, downstream);
        assert_eq!(bus.subscriber_count(), 1);

        drop(client);
        let result = session.run().await;
        assert!(result.is_err(), "write to a dropped peer must fail");
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_session_unsubscribes() {
        let bus = Arc::new(EventBus::new());
        let (downstream, mut client) = tokio::io::duplex(4096);
        let session = StreamSession::open(&bus, downstream);
        let handle = tokio::spawn(session.run());

        // Make sure the session is up before cancelling it.
        let _ = read_frame(&mut client).await;
        assert_eq!(bus.subscriber_count(), 1);

        handle.abort();
        let _ = handle.await;
        assert_eq!(bus.subscriber_count(), 0);
    }
}
