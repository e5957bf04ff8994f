//! Reference-data projections (warehouses and pickup points)
//!
//! Populated from `events.reference_updated`; read at flush and disband time.
//! A missing row is a reference-data gap and fails the flush, which is
//! retried on the next delivery once the upstream event arrives.

use sqlx::{PgExecutor, Postgres, Transaction};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PickupPoint {
    pub pvp_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub is_hub: bool,
}

/// Warehouse coordinates, or None when the warehouse is unknown
pub async fn warehouse_coords<'e, E>(
    executor: E,
    warehouse_id: &str,
) -> Result<Option<(f64, f64)>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as(
        "SELECT latitude, longitude FROM ref_warehouses WHERE warehouse_id = $1",
    )
    .bind(warehouse_id)
    .fetch_optional(executor)
    .await
}

/// Look up one pickup point
pub async fn pickup_point<'e, E>(
    executor: E,
    pvp_id: &str,
) -> Result<Option<PickupPoint>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, PickupPoint>(
        "SELECT pvp_id, latitude, longitude, is_hub FROM ref_pickup_points WHERE pvp_id = $1",
    )
    .bind(pvp_id)
    .fetch_optional(executor)
    .await
}

/// All hubs, ordered by pvp_id so nearest-hub ties break deterministically
pub async fn hubs<'e, E>(executor: E) -> Result<Vec<PickupPoint>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, PickupPoint>(
        r#"
        SELECT pvp_id, latitude, longitude, is_hub
        FROM ref_pickup_points
        WHERE is_hub = TRUE
        ORDER BY pvp_id
        "#,
    )
    .fetch_all(executor)
    .await
}

pub async fn upsert_warehouse(
    tx: &mut Transaction<'_, Postgres>,
    warehouse_id: &str,
    name: &str,
    latitude: f64,
    longitude: f64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO ref_warehouses (warehouse_id, name, latitude, longitude, updated_at)
        VALUES ($1, $2, $3, $4, NOW())
        ON CONFLICT (warehouse_id) DO UPDATE
        SET name = EXCLUDED.name, latitude = EXCLUDED.latitude,
            longitude = EXCLUDED.longitude, updated_at = NOW()
        "#,
    )
    .bind(warehouse_id)
    .bind(name)
    .bind(latitude)
    .bind(longitude)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub async fn upsert_pickup_point(
    tx: &mut Transaction<'_, Postgres>,
    pvp_id: &str,
    name: &str,
    latitude: f64,
    longitude: f64,
    is_hub: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO ref_pickup_points (pvp_id, name, latitude, longitude, is_hub, updated_at)
        VALUES ($1, $2, $3, $4, $5, NOW())
        ON CONFLICT (pvp_id) DO UPDATE
        SET name = EXCLUDED.name, latitude = EXCLUDED.latitude,
            longitude = EXCLUDED.longitude, is_hub = EXCLUDED.is_hub, updated_at = NOW()
        "#,
    )
    .bind(pvp_id)
    .bind(name)
    .bind(latitude)
    .bind(longitude)
    .bind(is_hub)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
