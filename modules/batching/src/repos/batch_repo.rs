//! Formed-batch storage

use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

/// A batch row to insert at flush or disband time
#[derive(Debug, Clone)]
pub struct NewBatch {
    pub id: Uuid,
    pub origin_type: String,
    pub origin_id: String,
    pub destination_id: String,
    pub origin_lat: f64,
    pub origin_lng: f64,
    pub destination_lat: f64,
    pub destination_lng: f64,
    pub is_hub_destination: bool,
    pub formed_at: DateTime<Utc>,
}

pub async fn insert_batch(
    tx: &mut Transaction<'_, Postgres>,
    batch: &NewBatch,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO batches
            (id, origin_type, origin_id, destination_id, origin_lat, origin_lng,
             destination_lat, destination_lng, is_hub_destination, formed_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(batch.id)
    .bind(&batch.origin_type)
    .bind(&batch.origin_id)
    .bind(&batch.destination_id)
    .bind(batch.origin_lat)
    .bind(batch.origin_lng)
    .bind(batch.destination_lat)
    .bind(batch.destination_lng)
    .bind(batch.is_hub_destination)
    .bind(batch.formed_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Attach an order to a batch, remembering its original destination so a hub
/// can later disband the batch per destination
pub async fn insert_batch_order(
    tx: &mut Transaction<'_, Postgres>,
    batch_id: Uuid,
    order_id: &str,
    destination_pvp_id: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO batch_orders (batch_id, order_id, destination_pvp_id) VALUES ($1, $2, $3)",
    )
    .bind(batch_id)
    .bind(order_id)
    .bind(destination_pvp_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Load a delivered batch's orders with their original destinations
pub async fn orders_with_destinations(
    tx: &mut Transaction<'_, Postgres>,
    batch_id: Uuid,
) -> Result<Vec<(String, Option<String>)>, sqlx::Error> {
    sqlx::query_as(
        "SELECT order_id, destination_pvp_id FROM batch_orders WHERE batch_id = $1",
    )
    .bind(batch_id)
    .fetch_all(&mut **tx)
    .await
}
