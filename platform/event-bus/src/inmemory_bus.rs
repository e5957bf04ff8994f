//! In-memory implementation of the EventBus trait for testing and development

use crate::{BusMessage, BusResult, EventBus};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;

/// EventBus implementation using in-memory channels
///
/// This implementation is suitable for:
/// - Unit tests (no external dependencies)
/// - Local development without Docker
/// - Integration tests that need fast, isolated message buses
///
/// Messages are broadcast to all subscribers via Tokio broadcast channels;
/// each subscriber filters by its topic pattern. Delivery is in publish
/// order, which for a single-process bus also means per-key order.
#[derive(Clone)]
pub struct InMemoryBus {
    sender: Arc<broadcast::Sender<BusMessage>>,
}

impl InMemoryBus {
    /// Create a new in-memory event bus with a buffer of 1000 messages.
    /// If the buffer is exceeded, the oldest messages are dropped.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1000);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create a new in-memory event bus with a custom buffer size
    pub fn with_capacity(buffer_size: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer_size);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Check if a topic matches a subscription pattern
    ///
    /// Supports NATS-style wildcards:
    /// - `*` matches exactly one token
    /// - `>` matches one or more tokens
    ///
    /// # Examples
    /// - `trips.>` matches `trips.assigned`
    /// - `events.*` matches `events.carrier_location`
    /// - `events.*` does NOT match `events.batch.delivered` (too many tokens)
    fn matches_pattern(topic: &str, pattern: &str) -> bool {
        let topic_tokens: Vec<&str> = topic.split('.').collect();
        let pattern_tokens: Vec<&str> = pattern.split('.').collect();

        let mut t_idx = 0;
        let mut p_idx = 0;

        while t_idx < topic_tokens.len() && p_idx < pattern_tokens.len() {
            let pattern_token = pattern_tokens[p_idx];

            if pattern_token == ">" {
                return true;
            } else if pattern_token == "*" {
                t_idx += 1;
                p_idx += 1;
            } else if topic_tokens[t_idx] == pattern_token {
                t_idx += 1;
                p_idx += 1;
            } else {
                return false;
            }
        }

        t_idx == topic_tokens.len() && p_idx == pattern_tokens.len()
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for InMemoryBus {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> BusResult<()> {
        let msg = BusMessage::new(topic.to_string(), key.to_string(), payload);

        // Ignore the error when there are no receivers yet
        let _ = self.sender.send(msg);

        Ok(())
    }

    async fn subscribe(&self, pattern: &str) -> BusResult<BoxStream<'static, BusMessage>> {
        let mut receiver = self.sender.subscribe();
        let pattern = pattern.to_string();

        let stream = async_stream::stream! {
            loop {
                match receiver.recv().await {
                    Ok(msg) => {
                        if Self::matches_pattern(&msg.topic, &pattern) {
                            yield msg;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "InMemoryBus subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        };

        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_pattern_matching() {
        // Exact match
        assert!(InMemoryBus::matches_pattern("trips.assigned", "trips.assigned"));

        // Single wildcard
        assert!(InMemoryBus::matches_pattern("events.carrier_location", "events.*"));
        assert!(InMemoryBus::matches_pattern("trips.assigned", "*.assigned"));
        assert!(!InMemoryBus::matches_pattern("events.batch.delivered", "events.*"));

        // Multi-level wildcard
        assert!(InMemoryBus::matches_pattern("trips.assigned", "trips.>"));
        assert!(InMemoryBus::matches_pattern("events.batch.delivered", "events.>"));
        assert!(!InMemoryBus::matches_pattern("trips.assigned", "commands.>"));

        // Edge cases
        assert!(InMemoryBus::matches_pattern("single", "single"));
        assert!(InMemoryBus::matches_pattern("single", "*"));
        assert!(InMemoryBus::matches_pattern("single", ">"));
        assert!(!InMemoryBus::matches_pattern("one.two", "one"));
    }

    #[tokio::test]
    async fn test_publish_and_subscribe() {
        let bus = InMemoryBus::new();

        let mut stream = bus.subscribe("orders.created").await.unwrap();

        let payload = b"test message".to_vec();
        bus.publish("orders.created", "order-1", payload.clone())
            .await
            .unwrap();

        let msg = tokio::time::timeout(std::time::Duration::from_secs(1), stream.next())
            .await
            .expect("timeout")
            .expect("stream ended");

        assert_eq!(msg.topic, "orders.created");
        assert_eq!(msg.key, "order-1");
        assert_eq!(msg.payload, payload);
    }

    #[tokio::test]
    async fn test_multiple_messages_in_order() {
        let bus = InMemoryBus::new();
        let mut stream = bus.subscribe("test.>").await.unwrap();

        for i in 0..5 {
            let payload = format!("message {}", i).into_bytes();
            bus.publish(&format!("test.msg.{}", i), "k", payload)
                .await
                .unwrap();
        }

        for i in 0..5 {
            let msg = tokio::time::timeout(std::time::Duration::from_secs(1), stream.next())
                .await
                .expect("timeout")
                .expect("stream ended");

            assert_eq!(msg.topic, format!("test.msg.{}", i));
            assert_eq!(msg.payload, format!("message {}", i).into_bytes());
        }
    }

    #[tokio::test]
    async fn test_wildcard_filtering() {
        let bus = InMemoryBus::new();

        let mut stream = bus.subscribe("trips.*").await.unwrap();

        bus.publish("trips.assigned", "t1", b"match".to_vec())
            .await
            .unwrap();
        bus.publish("trips.completed", "t1", b"match".to_vec())
            .await
            .unwrap();
        bus.publish("trips.state.changed", "t1", b"no match".to_vec())
            .await
            .unwrap(); // Too deep
        bus.publish("batches.formed", "b1", b"no match".to_vec())
            .await
            .unwrap(); // Wrong prefix

        let msg1 = tokio::time::timeout(std::time::Duration::from_millis(100), stream.next())
            .await
            .expect("timeout")
            .expect("stream ended");
        assert_eq!(msg1.topic, "trips.assigned");

        let msg2 = tokio::time::timeout(std::time::Duration::from_millis(100), stream.next())
            .await
            .expect("timeout")
            .expect("stream ended");
        assert_eq!(msg2.topic, "trips.completed");

        let result =
            tokio::time::timeout(std::time::Duration::from_millis(100), stream.next()).await;
        assert!(result.is_err(), "should timeout, no more messages");
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = InMemoryBus::new();

        let mut stream1 = bus.subscribe("test.>").await.unwrap();
        let mut stream2 = bus.subscribe("test.>").await.unwrap();

        let payload = b"broadcast".to_vec();
        bus.publish("test.msg", "k", payload.clone()).await.unwrap();

        let msg1 = tokio::time::timeout(std::time::Duration::from_secs(1), stream1.next())
            .await
            .expect("timeout")
            .expect("stream ended");
        let msg2 = tokio::time::timeout(std::time::Duration::from_secs(1), stream2.next())
            .await
            .expect("timeout")
            .expect("stream ended");

        assert_eq!(msg1.payload, payload);
        assert_eq!(msg2.payload, payload);
    }
}
