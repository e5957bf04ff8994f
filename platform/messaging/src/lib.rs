//! # Reliable Messaging Core
//!
//! The asynchronous event-processing fabric shared by every delivery
//! service: a transactional outbox with retry and dead-letter quarantine,
//! an at-least-once background publisher, an idempotent consumer discipline
//! backed by a processed-events ledger, and a consumer adapter that routes
//! poison messages to a per-service dead-letter topic.
//!
//! ## Guarantees
//!
//! - An event enqueued with [`outbox::enqueue_tx`] inside a committed
//!   business transaction becomes broker-visible within bounded time, and is
//!   retried with bucketed backoff until published or quarantined.
//! - A consumer that claims the event id via [`idempotency::claim_event`]
//!   at the start of its transaction applies business side effects at most
//!   once, regardless of redeliveries.
//! - The `(event_type, correlation_id)` unique key on the outbox makes
//!   enqueues naturally deduplicated, which periodic emitters (e.g. timeout
//!   watchdogs) rely on for exactly-once commands.

pub mod consumer;
pub mod envelope;
pub mod idempotency;
pub mod outbox;
pub mod publisher;

pub use consumer::{spawn_consumer, DeadLetterSink, EventHandler, HandlerError};
pub use envelope::{CodecError, EventEnvelope};
pub use outbox::{enqueue_tx, NewOutboxEvent, OutboxError};
pub use publisher::{run_publisher, PublisherConfig};
