//! Consumer adapter
//!
//! Per-topic long-running fetch loop: each message is dispatched to the
//! service's handler inside a tracing span. Transient failures are retried
//! with exponential backoff; validation failures and exhausted retries are
//! routed to the service's dead-letter topic through the same outbox that
//! carries regular events.

use async_trait::async_trait;
use event_bus::consumer_retry::RetryConfig;
use event_bus::{BusMessage, EventBus};
use futures::StreamExt;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::Instrument;

use crate::envelope::{CodecError, EventEnvelope};
use crate::outbox::{self, NewOutboxEvent, OutboxError};

/// Handler failure taxonomy, as seen by the consumer adapter
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Malformed envelope, missing fields, reference-data gap: not worth
    /// retrying, goes straight to the dead-letter topic
    #[error("validation error: {0}")]
    Validation(String),

    /// Storage or broker hiccup: retried with backoff before dead-lettering
    #[error("transient error: {0}")]
    Transient(String),
}

impl From<sqlx::Error> for HandlerError {
    fn from(e: sqlx::Error) -> Self {
        HandlerError::Transient(format!("database error: {}", e))
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        HandlerError::Validation(format!("malformed payload: {}", e))
    }
}

impl From<CodecError> for HandlerError {
    fn from(e: CodecError) -> Self {
        HandlerError::Validation(e.to_string())
    }
}

impl From<OutboxError> for HandlerError {
    fn from(e: OutboxError) -> Self {
        match e {
            OutboxError::Database(e) => HandlerError::Transient(format!("database error: {}", e)),
            other => HandlerError::Validation(other.to_string()),
        }
    }
}

/// A service's dispatch function for consumed events
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, topic: &str, msg: &BusMessage) -> Result<(), HandlerError>;
}

/// Routes poison messages to the service's dead-letter topic via the outbox
#[derive(Clone)]
pub struct DeadLetterSink {
    pool: PgPool,
    dlq_topic: String,
}

impl DeadLetterSink {
    pub fn new(pool: PgPool, dlq_topic: impl Into<String>) -> Self {
        Self {
            pool,
            dlq_topic: dlq_topic.into(),
        }
    }

    /// Record a failed message. The dead-letter envelope carries the original
    /// topic, the error and the raw payload, and rides the outbox so it is
    /// delivered with the same reliability as regular events.
    pub async fn record(&self, msg: &BusMessage, error: &str) {
        // Correlate on the original event id when the envelope is readable,
        // falling back to the partition key
        let correlation_id = EventEnvelope::decode(&msg.payload)
            .map(|e| e.event_id.to_string())
            .unwrap_or_else(|_| msg.key.clone());

        let envelope = EventEnvelope::new(
            "dlq",
            correlation_id,
            serde_json::json!({
                "original_topic": msg.topic,
                "error": error,
                "payload": String::from_utf8_lossy(&msg.payload),
            }),
        );

        let new_event = match NewOutboxEvent::from_envelope(&envelope, &self.dlq_topic, &msg.key) {
            Ok(evt) => evt,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build dead-letter envelope");
                return;
            }
        };

        let result = async {
            let mut tx = self.pool.begin().await?;
            match outbox::enqueue_tx(&mut tx, new_event).await {
                Ok(_) | Err(OutboxError::DuplicateEvent { .. }) => {}
                Err(OutboxError::Database(e)) => return Err(e),
                Err(OutboxError::Codec(e)) => {
                    tracing::error!(error = %e, "Failed to encode dead-letter payload");
                    return Ok(());
                }
            }
            tx.commit().await
        }
        .await;

        match result {
            Ok(()) => {
                tracing::error!(
                    topic = %msg.topic,
                    dlq_topic = %self.dlq_topic,
                    error = %error,
                    "Message routed to dead-letter topic"
                );
            }
            Err(e) => {
                tracing::error!(
                    topic = %msg.topic,
                    error = %error,
                    dlq_error = %e,
                    "Failed to record dead letter - message may be lost!"
                );
            }
        }
    }
}

/// Spawn a background task consuming one topic into a handler.
///
/// The loop survives handler failures; it only ends when the bus stream
/// closes or the owning task is aborted at shutdown.
pub fn spawn_consumer(
    bus: Arc<dyn EventBus>,
    topic: String,
    handler: Arc<dyn EventHandler>,
    dead_letters: DeadLetterSink,
    retry: RetryConfig,
) {
    tokio::spawn(async move {
        let mut stream = match bus.subscribe(&topic).await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(topic = %topic, error = %e, "Failed to subscribe");
                return;
            }
        };

        tracing::info!(topic = %topic, "Consumer subscribed");

        while let Some(msg) = stream.next().await {
            let span = tracing::info_span!(
                "handle_event",
                topic = %msg.topic,
                key = %msg.key,
            );

            async {
                if let Err(error) = process_with_retry(&*handler, &msg, &retry).await {
                    dead_letters.record(&msg, &error.to_string()).await;
                }
            }
            .instrument(span)
            .await;
        }

        tracing::warn!(topic = %topic, "Consumer stream ended");
    });
}

/// Dispatch one message, retrying transient failures with exponential
/// backoff. Validation failures are returned immediately.
async fn process_with_retry(
    handler: &dyn EventHandler,
    msg: &BusMessage,
    retry: &RetryConfig,
) -> Result<(), HandlerError> {
    let mut attempt = 0;
    let mut backoff = retry.initial_backoff;

    loop {
        attempt += 1;

        match handler.handle(&msg.topic, msg).await {
            Ok(()) => return Ok(()),
            Err(e @ HandlerError::Validation(_)) => return Err(e),
            Err(e @ HandlerError::Transient(_)) => {
                if attempt >= retry.max_attempts {
                    tracing::error!(
                        attempts = attempt,
                        error = %e,
                        "Handler failed after retries"
                    );
                    return Err(e);
                }

                tracing::warn!(
                    attempt = attempt,
                    max_attempts = retry.max_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Handler failed, retrying"
                );

                tokio::time::sleep(backoff).await;
                backoff = std::cmp::min(backoff * 2, retry.max_backoff);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyHandler {
        calls: AtomicU32,
        fail_first: u32,
        validation: bool,
    }

    #[async_trait]
    impl EventHandler for FlakyHandler {
        async fn handle(&self, _topic: &str, _msg: &BusMessage) -> Result<(), HandlerError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.fail_first {
                if self.validation {
                    Err(HandlerError::Validation("bad envelope".into()))
                } else {
                    Err(HandlerError::Transient("db down".into()))
                }
            } else {
                Ok(())
            }
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_backoff: std::time::Duration::from_millis(1),
            max_backoff: std::time::Duration::from_millis(4),
        }
    }

    fn msg() -> BusMessage {
        BusMessage::new("orders.created".into(), "o-1".into(), b"{}".to_vec())
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let handler = FlakyHandler {
            calls: AtomicU32::new(0),
            fail_first: 2,
            validation: false,
        };

        let result = process_with_retry(&handler, &msg(), &fast_retry()).await;

        assert!(result.is_ok());
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_validation_failure_is_not_retried() {
        let handler = FlakyHandler {
            calls: AtomicU32::new(0),
            fail_first: 1,
            validation: true,
        };

        let result = process_with_retry(&handler, &msg(), &fast_retry()).await;

        assert!(matches!(result, Err(HandlerError::Validation(_))));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_exhaust_retries() {
        let handler = FlakyHandler {
            calls: AtomicU32::new(0),
            fail_first: 10,
            validation: false,
        };

        let result = process_with_retry(&handler, &msg(), &fast_retry()).await;

        assert!(matches!(result, Err(HandlerError::Transient(_))));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_handler_error_classification() {
        let e: HandlerError = serde_json::from_str::<serde_json::Value>("not json")
            .unwrap_err()
            .into();
        assert!(matches!(e, HandlerError::Validation(_)));

        let e: HandlerError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(e, HandlerError::Transient(_)));
    }
}
