//! NATS-based implementation of the EventBus trait

use crate::{BusError, BusMessage, BusResult, EventBus};
use async_nats::Client;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};

/// Header carrying the producer-chosen partition key across NATS.
const PARTITION_KEY_HEADER: &str = "Partition-Key";

/// EventBus implementation backed by a NATS server.
///
/// Wraps an `async_nats::Client` and implements the `EventBus` trait. The
/// partition key travels in a message header so subscribers can recover it.
#[derive(Clone)]
pub struct NatsBus {
    client: Client,
}

impl NatsBus {
    /// Create a new NatsBus from an already-connected client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Direct access to the underlying NATS client for advanced use cases
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl EventBus for NatsBus {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> BusResult<()> {
        let mut headers = async_nats::HeaderMap::new();
        headers.insert(PARTITION_KEY_HEADER, key);

        self.client
            .publish_with_headers(topic.to_string(), headers, payload.into())
            .await
            .map_err(|e| BusError::PublishError(e.to_string()))?;

        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> BusResult<BoxStream<'static, BusMessage>> {
        let subscriber = self
            .client
            .subscribe(topic.to_string())
            .await
            .map_err(|e| BusError::SubscribeError(e.to_string()))?;

        let stream = subscriber.map(|nats_msg| {
            let mut key = String::new();
            let mut headers = std::collections::HashMap::new();

            if let Some(nats_headers) = nats_msg.headers {
                for (name, values) in nats_headers.iter() {
                    if let Some(value) = values.first() {
                        if name.to_string() == PARTITION_KEY_HEADER {
                            key = value.to_string();
                        }
                        headers.insert(name.to_string(), value.to_string());
                    }
                }
            }

            let mut msg =
                BusMessage::new(nats_msg.subject.to_string(), key, nats_msg.payload.to_vec());
            if !headers.is_empty() {
                msg = msg.with_headers(headers);
            }

            msg
        });

        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    // These tests require a running NATS server; CI exercises InMemoryBus
    // instead. For manual testing: docker run -p 4222:4222 nats:2.10-alpine

    #[tokio::test]
    #[ignore] // Requires NATS server
    async fn test_nats_bus_publish_subscribe() {
        let client = async_nats::connect("nats://localhost:4222")
            .await
            .expect("NATS server must be running on localhost:4222");

        let bus = NatsBus::new(client);

        let mut stream = bus.subscribe("test.nats.>").await.unwrap();

        let payload = b"test message".to_vec();
        bus.publish("test.nats.hello", "key-1", payload.clone())
            .await
            .unwrap();

        let msg = tokio::time::timeout(std::time::Duration::from_secs(2), stream.next())
            .await
            .expect("timeout waiting for message")
            .expect("stream ended");

        assert_eq!(msg.topic, "test.nats.hello");
        assert_eq!(msg.key, "key-1");
        assert_eq!(msg.payload, payload);
    }
}
