//! Pending-assignment storage
//!
//! One row per PENDING trip. The retry loop claims due rows with
//! FOR UPDATE SKIP LOCKED so multiple service instances can coexist.

use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

/// Insert (or reset) the pending row for a trip
pub async fn upsert(
    tx: &mut Transaction<'_, Postgres>,
    trip_id: Uuid,
    timeout_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO pending_assignments (trip_id, timeout_at, attempt_count)
        VALUES ($1, $2, 0)
        ON CONFLICT (trip_id) DO UPDATE SET timeout_at = EXCLUDED.timeout_at
        "#,
    )
    .bind(trip_id)
    .bind(timeout_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Due pending rows, oldest deadline first, locked for this transaction
pub async fn due(
    tx: &mut Transaction<'_, Postgres>,
    limit: i64,
) -> Result<Vec<(Uuid, i32)>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT trip_id, attempt_count
        FROM pending_assignments
        WHERE timeout_at <= NOW()
        ORDER BY timeout_at
        LIMIT $1
        FOR UPDATE SKIP LOCKED
        "#,
    )
    .bind(limit)
    .fetch_all(&mut **tx)
    .await
}

/// Record a failed attempt and schedule the next one
pub async fn schedule_retry(
    tx: &mut Transaction<'_, Postgres>,
    trip_id: Uuid,
    attempt_count: i32,
    timeout_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE pending_assignments SET attempt_count = $2, timeout_at = $3 WHERE trip_id = $1",
    )
    .bind(trip_id)
    .bind(attempt_count)
    .bind(timeout_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Remove the pending row once the trip leaves PENDING
pub async fn delete(
    tx: &mut Transaction<'_, Postgres>,
    trip_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM pending_assignments WHERE trip_id = $1")
        .bind(trip_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Make the retry loop pick the trip up on its next tick
pub async fn trigger_now(
    tx: &mut Transaction<'_, Postgres>,
    trip_id: Uuid,
) -> Result<u64, sqlx::Error> {
    let result =
        sqlx::query("UPDATE pending_assignments SET timeout_at = NOW() WHERE trip_id = $1")
            .bind(trip_id)
            .execute(&mut **tx)
            .await?;

    Ok(result.rows_affected())
}
