//! Idempotent consumer discipline
//!
//! Every handler opens a transaction and first claims the event id in the
//! processed-events ledger. A failed claim means the delivery is a replay:
//! the handler commits the no-op and acknowledges. All side effects of a
//! successful claim — business mutations and outbox enqueues — share the
//! claiming transaction, which gives at-least-once delivery an effective
//! exactly-once outcome.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Claim an event id within the handler's transaction.
///
/// Returns `true` when this delivery is the first one, `false` on replay.
pub async fn claim_event(
    tx: &mut Transaction<'_, Postgres>,
    event_id: Uuid,
    occurred_at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let claimed: Option<Uuid> = sqlx::query_scalar(
        r#"
        INSERT INTO processed_events (event_id, occurred_at)
        VALUES ($1, $2)
        ON CONFLICT (event_id) DO NOTHING
        RETURNING event_id
        "#,
    )
    .bind(event_id)
    .bind(occurred_at)
    .fetch_optional(&mut **tx)
    .await?;

    if claimed.is_none() {
        tracing::debug!(event_id = %event_id, "Duplicate event ignored (already processed)");
    }

    Ok(claimed.is_some())
}

/// Check whether an event id has already been processed
pub async fn is_processed(pool: &PgPool, event_id: Uuid) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM processed_events WHERE event_id = $1)",
    )
    .bind(event_id)
    .fetch_one(pool)
    .await
}
