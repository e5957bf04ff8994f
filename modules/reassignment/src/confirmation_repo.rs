//! Pending-confirmation storage
//!
//! One row per assignment awaiting confirmation. The watchdog claims due
//! rows with FOR UPDATE SKIP LOCKED so multiple instances can coexist.

use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};

/// A confirmation deadline that has expired
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DueConfirmation {
    pub trip_id: String,
    pub batch_id: String,
    pub carrier_id: String,
}

/// Upsert the pending row on assignment (re-assignment of the same trip
/// resets the deadline)
pub async fn upsert(
    tx: &mut Transaction<'_, Postgres>,
    trip_id: &str,
    batch_id: &str,
    carrier_id: &str,
    assigned_at: DateTime<Utc>,
    timeout_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO pending_confirmations
            (trip_id, batch_id, carrier_id, assigned_at, timeout_at, status)
        VALUES ($1, $2, $3, $4, $5, 'pending')
        ON CONFLICT (trip_id) DO UPDATE
        SET batch_id = EXCLUDED.batch_id, carrier_id = EXCLUDED.carrier_id,
            assigned_at = EXCLUDED.assigned_at, timeout_at = EXCLUDED.timeout_at,
            status = 'pending'
        "#,
    )
    .bind(trip_id)
    .bind(batch_id)
    .bind(carrier_id)
    .bind(assigned_at)
    .bind(timeout_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Remove the row on confirmation or rejection
pub async fn delete(
    tx: &mut Transaction<'_, Postgres>,
    trip_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM pending_confirmations WHERE trip_id = $1")
        .bind(trip_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Expired pending rows, locked for this transaction
pub async fn due(
    tx: &mut Transaction<'_, Postgres>,
    limit: i64,
) -> Result<Vec<DueConfirmation>, sqlx::Error> {
    sqlx::query_as::<_, DueConfirmation>(
        r#"
        SELECT trip_id, batch_id, carrier_id
        FROM pending_confirmations
        WHERE timeout_at <= NOW() AND status = 'pending'
        ORDER BY timeout_at
        LIMIT $1
        FOR UPDATE SKIP LOCKED
        "#,
    )
    .bind(limit)
    .fetch_all(&mut **tx)
    .await
}

/// Record that the reassign command for this trip has been emitted
pub async fn mark_reassigned(
    tx: &mut Transaction<'_, Postgres>,
    trip_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE pending_confirmations SET status = 'reassigned' WHERE trip_id = $1")
        .bind(trip_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}
