//! Transactional outbox store
//!
//! Outbound events are inserted into `outbox_events` within the same
//! transaction as the business state change, then drained asynchronously by
//! the publisher. Rows that keep failing are quarantined into
//! `dead_letter_queue` after [`MAX_PUBLISH_ATTEMPTS`] attempts.
//!
//! Invariants:
//! - `(event_type, correlation_id)` is unique; a second enqueue surfaces as
//!   [`OutboxError::DuplicateEvent`]
//! - a row transitions to `published` at most once, and the
//!   `published_events` ledger inserts at most one row per key
//! - arrival in the dead-letter queue implies removal from the outbox

use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::envelope::{CodecError, EventEnvelope};

/// Attempt cap after which a row is moved to the dead-letter queue
pub const MAX_PUBLISH_ATTEMPTS: i32 = 10;

/// Errors from outbox operations
#[derive(Debug, thiserror::Error)]
pub enum OutboxError {
    #[error("event ({event_type}, {correlation_id}) already enqueued")]
    DuplicateEvent {
        event_type: String,
        correlation_id: String,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// An event ready to be enqueued
#[derive(Debug, Clone)]
pub struct NewOutboxEvent {
    pub event_type: String,
    pub correlation_id: String,
    pub topic: String,
    pub partition_key: String,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl NewOutboxEvent {
    /// Build an outbox row from an envelope; the envelope itself is the
    /// payload stored and later published verbatim.
    pub fn from_envelope(
        envelope: &EventEnvelope,
        topic: impl Into<String>,
        partition_key: impl Into<String>,
    ) -> Result<Self, CodecError> {
        Ok(Self {
            event_type: envelope.event_type.clone(),
            correlation_id: envelope.correlation_id.clone(),
            topic: topic.into(),
            partition_key: partition_key.into(),
            payload: serde_json::to_value(envelope).map_err(CodecError::Json)?,
            occurred_at: envelope.occurred_at,
        })
    }
}

/// An outbox row due for publishing
#[derive(Debug, sqlx::FromRow)]
pub struct DueEvent {
    pub id: Uuid,
    pub event_type: String,
    pub correlation_id: String,
    pub topic: String,
    pub partition_key: String,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
    pub attempts: i32,
}

/// Bucketed backoff for a row that has failed `attempts` times
pub fn backoff_for(attempts: i32) -> Duration {
    match attempts {
        a if a <= 3 => Duration::seconds(1),
        a if a <= 6 => Duration::seconds(5),
        _ => Duration::seconds(30),
    }
}

/// Enqueue one pending event under the caller's business transaction.
///
/// The row becomes visible to the publisher only if the caller commits.
/// This is the sole primitive by which a service emits an external event.
pub async fn enqueue_tx(
    tx: &mut Transaction<'_, Postgres>,
    evt: NewOutboxEvent,
) -> Result<Uuid, OutboxError> {
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO outbox_events
            (id, event_type, correlation_id, topic, partition_key, payload,
             occurred_at, status, attempts, next_attempt_time)
        VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', 0, NOW())
        "#,
    )
    .bind(id)
    .bind(&evt.event_type)
    .bind(&evt.correlation_id)
    .bind(&evt.topic)
    .bind(&evt.partition_key)
    .bind(&evt.payload)
    .bind(evt.occurred_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                return OutboxError::DuplicateEvent {
                    event_type: evt.event_type.clone(),
                    correlation_id: evt.correlation_id.clone(),
                };
            }
        }
        OutboxError::Database(e)
    })?;

    tracing::debug!(
        outbox_id = %id,
        event_type = %evt.event_type,
        correlation_id = %evt.correlation_id,
        topic = %evt.topic,
        "Event enqueued to outbox"
    );

    Ok(id)
}

/// Fetch up to `limit` rows due for publishing, oldest deadline first.
///
/// Rows are locked with FOR UPDATE SKIP LOCKED so concurrent publisher
/// instances fetch disjoint sets; the locks are released when the caller's
/// transaction ends.
pub async fn fetch_due(
    tx: &mut Transaction<'_, Postgres>,
    limit: i64,
) -> Result<Vec<DueEvent>, OutboxError> {
    let rows = sqlx::query_as::<_, DueEvent>(
        r#"
        SELECT id, event_type, correlation_id, topic, partition_key, payload,
               occurred_at, attempts
        FROM outbox_events
        WHERE status IN ('pending', 'error') AND next_attempt_time <= NOW()
        ORDER BY next_attempt_time
        LIMIT $1
        FOR UPDATE SKIP LOCKED
        "#,
    )
    .bind(limit)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows)
}

/// Mark a row published and record it in the published-events ledger.
pub async fn mark_published(
    pool: &PgPool,
    id: Uuid,
    event_type: &str,
    correlation_id: &str,
) -> Result<(), OutboxError> {
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE outbox_events SET status = 'published' WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO published_events (event_type, correlation_id, occurred_at)
        VALUES ($1, $2, NOW())
        ON CONFLICT (event_type, correlation_id) DO NOTHING
        "#,
    )
    .bind(event_type)
    .bind(correlation_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(())
}

/// Record a publish failure: advance the retry deadline, or quarantine the
/// row into the dead-letter queue once the attempt cap is reached.
pub async fn mark_failed(pool: &PgPool, id: Uuid, last_error: &str) -> Result<(), OutboxError> {
    let mut tx = pool.begin().await?;

    let row: Option<(i32, String)> =
        sqlx::query_as("SELECT attempts, topic FROM outbox_events WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

    // Row already published or quarantined by another instance
    let Some((attempts, topic)) = row else {
        return Ok(());
    };

    let new_attempts = attempts + 1;

    if new_attempts >= MAX_PUBLISH_ATTEMPTS {
        sqlx::query(
            r#"
            INSERT INTO dead_letter_queue
                (id, source_id, event_type, topic, partition_key, payload,
                 last_error, attempts)
            SELECT $2, id, event_type, topic, partition_key, payload, $3, $4
            FROM outbox_events
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(Uuid::new_v4())
        .bind(last_error)
        .bind(new_attempts)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM outbox_events WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::error!(
            outbox_id = %id,
            topic = %topic,
            attempts = new_attempts,
            error = %last_error,
            "Outbox event moved to dead-letter queue after exhausting attempts"
        );

        return Ok(());
    }

    let next_attempt_time = Utc::now() + backoff_for(new_attempts);

    sqlx::query(
        r#"
        UPDATE outbox_events
        SET status = 'error', attempts = $2, last_error = $3, next_attempt_time = $4
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(new_attempts)
    .bind(last_error)
    .bind(next_attempt_time)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::warn!(
        outbox_id = %id,
        topic = %topic,
        attempts = new_attempts,
        error = %last_error,
        "Outbox publish failed, retry scheduled"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_buckets() {
        assert_eq!(backoff_for(1), Duration::seconds(1));
        assert_eq!(backoff_for(2), Duration::seconds(1));
        assert_eq!(backoff_for(3), Duration::seconds(1));
        assert_eq!(backoff_for(4), Duration::seconds(5));
        assert_eq!(backoff_for(5), Duration::seconds(5));
        assert_eq!(backoff_for(6), Duration::seconds(5));
        assert_eq!(backoff_for(7), Duration::seconds(30));
        assert_eq!(backoff_for(9), Duration::seconds(30));
        assert_eq!(backoff_for(42), Duration::seconds(30));
    }

    #[test]
    fn test_new_outbox_event_from_envelope() {
        let envelope = EventEnvelope::new(
            "trips.assigned",
            "trip-1",
            serde_json::json!({"trip_id": "trip-1"}),
        );

        let evt = NewOutboxEvent::from_envelope(&envelope, "trips.assigned", "trip-1").unwrap();

        assert_eq!(evt.event_type, "trips.assigned");
        assert_eq!(evt.correlation_id, "trip-1");
        assert_eq!(evt.topic, "trips.assigned");
        assert_eq!(evt.partition_key, "trip-1");
        assert_eq!(evt.payload["data"]["trip_id"], "trip-1");
        assert_eq!(evt.occurred_at, envelope.occurred_at);
    }
}
