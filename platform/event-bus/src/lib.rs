//! # EventBus Abstraction
//!
//! A platform-level abstraction for the message broker shared by all
//! delivery services.
//!
//! ## Why This Lives in `platform/`
//!
//! The broker is a **shared runtime capability**: batching, trip and
//! reassignment services all publish and consume through it, but none of
//! them may depend on another service. Placing the abstraction in
//! `platform/` allows:
//! - Services to depend on platform crates without circular dependencies
//! - Config-driven swap between NATS (production) and InMemory (dev/test)
//!
//! ## Implementations
//!
//! - **NatsBus**: Production implementation using async-nats
//! - **InMemoryBus**: Test/dev implementation using in-memory channels
//!
//! ## Partition keys
//!
//! Every publish carries a partition key alongside the topic. Consumers may
//! rely on per-key ordering (batch events keyed by batch_id, trip events by
//! trip_id, order events by order_id, carrier telemetry by carrier_id) but
//! never on ordering across keys.

pub mod consumer_retry;

mod inmemory_bus;
mod nats_bus;

pub use inmemory_bus::InMemoryBus;
pub use nats_bus::NatsBus;

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt;

/// A message received from the event bus
#[derive(Debug, Clone)]
pub struct BusMessage {
    /// The topic this message was published to
    pub topic: String,
    /// Partition key chosen by the producer; empty when the producer set none
    pub key: String,
    /// The message payload (raw bytes)
    pub payload: Vec<u8>,
    /// Optional headers
    pub headers: Option<std::collections::HashMap<String, String>>,
}

impl BusMessage {
    pub fn new(topic: String, key: String, payload: Vec<u8>) -> Self {
        Self {
            topic,
            key,
            payload,
            headers: None,
        }
    }

    pub fn with_headers(mut self, headers: std::collections::HashMap<String, String>) -> Self {
        self.headers = Some(headers);
        self
    }
}

/// Errors that can occur when using the event bus
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("failed to publish message: {0}")]
    PublishError(String),

    #[error("failed to subscribe to topic: {0}")]
    SubscribeError(String),

    #[error("connection error: {0}")]
    ConnectionError(String),

    #[error("invalid topic pattern: {0}")]
    InvalidTopic(String),
}

/// Result type for event bus operations
pub type BusResult<T> = Result<T, BusError>;

/// Core event bus abstraction for publish-subscribe messaging
///
/// All broker I/O in the services goes through this trait so the core logic
/// stays decoupled from the concrete broker.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish a message to a topic under a partition key.
    ///
    /// Implementations preserve ordering within a key where the underlying
    /// broker supports it; there is no ordering guarantee across keys.
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> BusResult<()>;

    /// Subscribe to messages matching a topic pattern.
    ///
    /// Patterns support NATS-style wildcards:
    /// - `*` matches a single dot-separated token
    /// - `>` matches one or more trailing tokens
    async fn subscribe(&self, topic: &str) -> BusResult<BoxStream<'static, BusMessage>>;
}

impl fmt::Debug for dyn EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventBus")
    }
}
