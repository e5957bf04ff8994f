//! Background outbox publisher
//!
//! A single cooperative loop that wakes at a fixed cadence, fetches due
//! outbox rows under a short transaction, then publishes each to the broker
//! and records the outcome in its own short transaction. Broker I/O is never
//! performed while holding a row lock.
//!
//! Ordering is FIFO by `next_attempt_time`, not by insertion time; callers
//! must not depend on cross-correlation ordering beyond per-key broker
//! ordering.

use event_bus::EventBus;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

use crate::outbox::{self, OutboxError};

/// Publisher loop tuning
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Wake-up cadence
    pub tick: Duration,
    /// Max rows fetched per tick
    pub batch_size: i64,
    /// Per-publish broker timeout
    pub publish_timeout: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            batch_size: 50,
            publish_timeout: Duration::from_secs(5),
        }
    }
}

/// Run the publisher loop until the owning task is aborted.
///
/// Publish failures are always recoverable up to the attempt cap; the outbox
/// row survives until `mark_published` commits, so nothing is lost if the
/// process dies mid-flight.
pub async fn run_publisher(pool: PgPool, bus: Arc<dyn EventBus>, config: PublisherConfig) {
    tracing::info!(
        tick_ms = config.tick.as_millis() as u64,
        batch_size = config.batch_size,
        "Starting outbox publisher"
    );

    let mut interval = tokio::time::interval(config.tick);

    loop {
        interval.tick().await;

        match publish_due(&pool, &bus, &config).await {
            Ok(count) if count > 0 => {
                tracing::debug!(published = count, "Outbox publisher pass complete");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "Outbox publisher pass failed");
            }
        }
    }
}

/// One publisher pass: fetch due rows, publish, record outcomes.
///
/// Exposed for tests that drive a single deterministic pass instead of the
/// timed loop.
pub async fn publish_due(
    pool: &PgPool,
    bus: &Arc<dyn EventBus>,
    config: &PublisherConfig,
) -> Result<usize, OutboxError> {
    // Fetch under a short transaction so the row locks never span broker I/O
    let mut tx = pool.begin().await?;
    let due = outbox::fetch_due(&mut tx, config.batch_size).await?;
    tx.commit().await?;

    let mut published = 0;

    for evt in due {
        let payload = match serde_json::to_vec(&evt.payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                outbox::mark_failed(pool, evt.id, &format!("payload encode: {}", e)).await?;
                continue;
            }
        };

        let result = tokio::time::timeout(
            config.publish_timeout,
            bus.publish(&evt.topic, &evt.partition_key, payload),
        )
        .await;

        match result {
            Ok(Ok(())) => {
                outbox::mark_published(pool, evt.id, &evt.event_type, &evt.correlation_id)
                    .await?;
                published += 1;

                tracing::debug!(
                    outbox_id = %evt.id,
                    event_type = %evt.event_type,
                    topic = %evt.topic,
                    "Event published"
                );
            }
            Ok(Err(e)) => {
                outbox::mark_failed(pool, evt.id, &e.to_string()).await?;
            }
            Err(_) => {
                outbox::mark_failed(pool, evt.id, "publish timed out").await?;
            }
        }
    }

    Ok(published)
}
