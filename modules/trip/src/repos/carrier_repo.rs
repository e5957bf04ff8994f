//! Carrier activity and position projections
//!
//! Both tables are best-effort projections of upstream reference and
//! telemetry events; stale reads only cost another pending cycle.

use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};

/// An active carrier joined with its last known position (if any)
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CarrierCandidate {
    pub carrier_id: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Carriers marked active with activity fresher than one hour, ordered by
/// carrier_id so distance ties break deterministically
pub async fn active_candidates(
    tx: &mut Transaction<'_, Postgres>,
) -> Result<Vec<CarrierCandidate>, sqlx::Error> {
    sqlx::query_as::<_, CarrierCandidate>(
        r#"
        SELECT a.carrier_id, p.latitude, p.longitude
        FROM carrier_activity_cache a
        LEFT JOIN carrier_positions p ON p.carrier_id = a.carrier_id
        WHERE a.is_active = TRUE AND a.updated_at > NOW() - INTERVAL '1 hour'
        ORDER BY a.carrier_id
        "#,
    )
    .fetch_all(&mut **tx)
    .await
}

pub async fn upsert_activity(
    tx: &mut Transaction<'_, Postgres>,
    carrier_id: &str,
    is_active: bool,
    updated_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO carrier_activity_cache (carrier_id, is_active, updated_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (carrier_id) DO UPDATE
        SET is_active = EXCLUDED.is_active, updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(carrier_id)
    .bind(is_active)
    .bind(updated_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub async fn upsert_position(
    tx: &mut Transaction<'_, Postgres>,
    carrier_id: &str,
    latitude: f64,
    longitude: f64,
    last_seen: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO carrier_positions (carrier_id, latitude, longitude, last_seen)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (carrier_id) DO UPDATE
        SET latitude = EXCLUDED.latitude, longitude = EXCLUDED.longitude,
            last_seen = EXCLUDED.last_seen
        "#,
    )
    .bind(carrier_id)
    .bind(latitude)
    .bind(longitude)
    .bind(last_seen)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
