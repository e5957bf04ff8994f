//! Durable batch-group storage
//!
//! `batch_group_items` is the source of truth for open groups; the in-memory
//! projection in [`crate::groups`] is only an optimisation. Rows are keyed by
//! (warehouse, pickup point, order); the flush unit is the warehouse, with
//! each item's pickup point retained for routing and hub disband.

use chrono::Duration;
use sqlx::{PgPool, Postgres, Transaction};

/// One order waiting in a group
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GroupItem {
    pub order_id: String,
    pub pvp_id: String,
    pub customer_phone: String,
    pub customer_email: String,
}

/// Upsert one order into its group within the handler's transaction
pub async fn upsert_item(
    tx: &mut Transaction<'_, Postgres>,
    warehouse_id: &str,
    pvp_id: &str,
    order_id: &str,
    customer_phone: &str,
    customer_email: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO batch_group_items
            (warehouse_id, pvp_id, order_id, customer_phone, customer_email, updated_at)
        VALUES ($1, $2, $3, $4, $5, NOW())
        ON CONFLICT (warehouse_id, pvp_id, order_id)
        DO UPDATE SET customer_phone = EXCLUDED.customer_phone,
                      customer_email = EXCLUDED.customer_email,
                      updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(warehouse_id)
    .bind(pvp_id)
    .bind(order_id)
    .bind(customer_phone)
    .bind(customer_email)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Count the orders currently waiting at a warehouse
pub async fn count_items(pool: &PgPool, warehouse_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM batch_group_items WHERE warehouse_id = $1")
        .bind(warehouse_id)
        .fetch_one(pool)
        .await
}

/// Load a warehouse's waiting items in arrival order
pub async fn load_items(
    pool: &PgPool,
    warehouse_id: &str,
) -> Result<Vec<GroupItem>, sqlx::Error> {
    sqlx::query_as::<_, GroupItem>(
        r#"
        SELECT order_id, pvp_id,
               COALESCE(customer_phone, '') AS customer_phone,
               COALESCE(customer_email, '') AS customer_email
        FROM batch_group_items
        WHERE warehouse_id = $1
        ORDER BY updated_at
        "#,
    )
    .bind(warehouse_id)
    .fetch_all(pool)
    .await
}

/// Delete a warehouse's items within the flush transaction
pub async fn delete_group(
    tx: &mut Transaction<'_, Postgres>,
    warehouse_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM batch_group_items WHERE warehouse_id = $1")
        .bind(warehouse_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Warehouses eligible for flushing: at least `max_size` waiting items, or
/// idle since before `now - flush_interval`
pub async fn due_groups(
    pool: &PgPool,
    max_size: i64,
    flush_interval: Duration,
) -> Result<Vec<String>, sqlx::Error> {
    let cutoff = chrono::Utc::now() - flush_interval;

    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT warehouse_id
        FROM (
            SELECT warehouse_id, COUNT(*) AS cnt, MAX(updated_at) AS last_upd
            FROM batch_group_items
            GROUP BY warehouse_id
        ) t
        WHERE cnt >= $1 OR last_upd <= $2
        "#,
    )
    .bind(max_size)
    .bind(cutoff)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(warehouse_id,)| warehouse_id).collect())
}
