//! Group flushing
//!
//! A warehouse's waiting orders are flushed into a batch when they reach
//! `max_size` (checked synchronously after each add) or when the group has
//! been idle for `flush_interval` (periodic scan). Both paths run the same
//! procedure: load the items, resolve routing, and atomically delete the
//! group, insert the batch and enqueue `batches.formed`.
//!
//! Routing: a group homogeneous in pickup point within `direct_radius_meters`
//! of the warehouse is served directly; anything else is consolidated
//! through the hub nearest to the warehouse and split per destination there.

use chrono::Utc;
use messaging::consumer::HandlerError;
use messaging::envelope::{CodecError, EventEnvelope};
use messaging::outbox::{self, NewOutboxEvent, OutboxError};
use sqlx::PgPool;
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::contracts::{BatchFormedV1, OrderContact};
use crate::geo::haversine;
use crate::groups::GroupsCache;
use crate::repos::reference_repo::PickupPoint;
use crate::repos::{batch_repo, group_repo, reference_repo};
use crate::services::BatchingSettings;

/// Errors from the flush procedure
#[derive(Debug, thiserror::Error)]
pub enum FlushError {
    #[error("warehouse {0} not found in reference data")]
    UnknownWarehouse(String),

    #[error("pickup point {0} not found in reference data")]
    UnknownPickupPoint(String),

    #[error("no hub available for routing")]
    NoHubAvailable,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Outbox(#[from] OutboxError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("payload encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<FlushError> for HandlerError {
    fn from(e: FlushError) -> Self {
        match e {
            FlushError::Database(e) => HandlerError::Transient(format!("database error: {}", e)),
            FlushError::Outbox(e) => e.into(),
            other => HandlerError::Validation(other.to_string()),
        }
    }
}

/// Where a flushed batch is headed
#[derive(Debug, Clone, PartialEq)]
pub struct Destination {
    pub pvp_id: String,
    pub lat: f64,
    pub lng: f64,
    pub is_hub: bool,
}

/// Decide the destination for a group originating at the given warehouse.
///
/// A group homogeneous in pickup point (`sole_pvp`) within the direct radius
/// is served directly. Everything else goes to the nearest hub; ties break
/// on the hubs' pvp_id order (callers pass the list sorted ascending).
pub fn pick_destination(
    origin_lat: f64,
    origin_lng: f64,
    sole_pvp: Option<&PickupPoint>,
    hubs: &[PickupPoint],
    direct_radius_meters: f64,
) -> Result<Destination, FlushError> {
    if let Some(pvp) = sole_pvp {
        let direct_distance = haversine(origin_lat, origin_lng, pvp.latitude, pvp.longitude);
        if direct_distance <= direct_radius_meters {
            return Ok(Destination {
                pvp_id: pvp.pvp_id.clone(),
                lat: pvp.latitude,
                lng: pvp.longitude,
                is_hub: pvp.is_hub,
            });
        }
    }

    let mut best: Option<(&PickupPoint, f64)> = None;
    for hub in hubs {
        let d = haversine(origin_lat, origin_lng, hub.latitude, hub.longitude);
        match best {
            Some((_, best_d)) if d >= best_d => {}
            _ => best = Some((hub, d)),
        }
    }

    best.map(|(hub, _)| Destination {
        pvp_id: hub.pvp_id.clone(),
        lat: hub.latitude,
        lng: hub.longitude,
        is_hub: true,
    })
    .ok_or(FlushError::NoHubAvailable)
}

/// Flush a warehouse's waiting orders into a batch.
///
/// Returns the new batch id, or None when the group is already empty (e.g.
/// flushed by a competing trigger). Deleting the items, inserting the batch
/// and enqueueing `batches.formed` commit atomically, so a failure leaves no
/// partial state and the next delivery or scan retries cleanly.
pub async fn flush_group(
    pool: &PgPool,
    settings: &BatchingSettings,
    warehouse_id: &str,
) -> Result<Option<Uuid>, FlushError> {
    let items = group_repo::load_items(pool, warehouse_id).await?;
    if items.is_empty() {
        return Ok(None);
    }

    let (origin_lat, origin_lng) = reference_repo::warehouse_coords(pool, warehouse_id)
        .await?
        .ok_or_else(|| FlushError::UnknownWarehouse(warehouse_id.to_string()))?;

    let destinations: BTreeSet<&str> = items.iter().map(|i| i.pvp_id.as_str()).collect();

    let sole_pvp = match destinations.iter().next() {
        Some(pvp_id) if destinations.len() == 1 => Some(
            reference_repo::pickup_point(pool, pvp_id)
                .await?
                .ok_or_else(|| FlushError::UnknownPickupPoint(pvp_id.to_string()))?,
        ),
        _ => None,
    };

    let hubs = reference_repo::hubs(pool).await?;

    let destination = pick_destination(
        origin_lat,
        origin_lng,
        sole_pvp.as_ref(),
        &hubs,
        settings.direct_radius_meters,
    )?;

    let batch_id = Uuid::new_v4();
    let formed_at = Utc::now();

    let payload = BatchFormedV1 {
        batch_id: batch_id.to_string(),
        origin_type: "warehouse".to_string(),
        origin_id: warehouse_id.to_string(),
        origin_lat,
        origin_lng,
        destination_type: "pvp".to_string(),
        destination_id: destination.pvp_id.clone(),
        destination_lat: destination.lat,
        destination_lng: destination.lng,
        is_hub_destination: destination.is_hub,
        order_ids: items.iter().map(|i| i.order_id.clone()).collect(),
        order_contacts: items
            .iter()
            .map(|i| OrderContact {
                order_id: i.order_id.clone(),
                customer_phone: i.customer_phone.clone(),
                customer_email: i.customer_email.clone(),
            })
            .collect(),
        formed_at,
    };

    let envelope = EventEnvelope::new(
        "batches.formed",
        batch_id.to_string(),
        serde_json::to_value(&payload)?,
    );

    let mut tx = pool.begin().await?;

    group_repo::delete_group(&mut tx, warehouse_id).await?;

    batch_repo::insert_batch(
        &mut tx,
        &batch_repo::NewBatch {
            id: batch_id,
            origin_type: "warehouse".to_string(),
            origin_id: warehouse_id.to_string(),
            destination_id: destination.pvp_id.clone(),
            origin_lat,
            origin_lng,
            destination_lat: destination.lat,
            destination_lng: destination.lng,
            is_hub_destination: destination.is_hub,
            formed_at,
        },
    )
    .await?;

    // destination_pvp_id keeps each order's original pickup point so a hub
    // can disband the batch per destination later
    for item in &items {
        batch_repo::insert_batch_order(&mut tx, batch_id, &item.order_id, Some(&item.pvp_id))
            .await?;
    }

    let new_event =
        NewOutboxEvent::from_envelope(&envelope, &settings.out_topic, &batch_id.to_string())?;
    outbox::enqueue_tx(&mut tx, new_event).await?;

    tx.commit().await?;

    tracing::info!(
        batch_id = %batch_id,
        warehouse_id = %warehouse_id,
        destination_id = %destination.pvp_id,
        is_hub_destination = destination.is_hub,
        orders = items.len(),
        "Batch formed"
    );

    Ok(Some(batch_id))
}

/// Size-triggered flush, attempted synchronously after each add
pub async fn try_flush_by_size(
    pool: &PgPool,
    settings: &BatchingSettings,
    warehouse_id: &str,
) -> Result<Option<Uuid>, FlushError> {
    let count = group_repo::count_items(pool, warehouse_id).await?;
    if count >= settings.max_size {
        flush_group(pool, settings, warehouse_id).await
    } else {
        Ok(None)
    }
}

/// Flush every group that is over size or has gone idle
pub async fn flush_expired(pool: &PgPool, settings: &BatchingSettings, groups: &GroupsCache) {
    let due = match group_repo::due_groups(pool, settings.max_size, settings.flush_interval).await
    {
        Ok(due) => due,
        Err(e) => {
            tracing::error!(error = %e, "Failed to scan for due groups");
            return;
        }
    };

    for warehouse_id in due {
        match flush_group(pool, settings, &warehouse_id).await {
            Ok(Some(batch_id)) => {
                groups.clear(&warehouse_id);
                tracing::info!(
                    batch_id = %batch_id,
                    warehouse_id = %warehouse_id,
                    "Batch formed by time trigger"
                );
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(
                    warehouse_id = %warehouse_id,
                    error = %e,
                    "Time flush failed for group"
                );
            }
        }
    }
}

/// Periodic time-flush driver
pub async fn run_time_flush_loop(
    pool: PgPool,
    settings: Arc<BatchingSettings>,
    groups: Arc<GroupsCache>,
) {
    let tick = settings
        .flush_interval
        .to_std()
        .unwrap_or(std::time::Duration::from_secs(60));

    tracing::info!(tick_secs = tick.as_secs(), "Starting time flush loop");

    let mut interval = tokio::time::interval(tick);

    loop {
        interval.tick().await;
        flush_expired(&pool, &settings, &groups).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pvp(id: &str, lat: f64, lng: f64, is_hub: bool) -> PickupPoint {
        PickupPoint {
            pvp_id: id.to_string(),
            latitude: lat,
            longitude: lng,
            is_hub,
        }
    }

    #[test]
    fn test_direct_routing_within_radius() {
        // ~14 km from the warehouse
        let sole = pvp("pvp-1", 54.00, 27.70, false);
        let hubs = vec![pvp("hub-1", 53.90, 27.56, true)];

        let dest = pick_destination(53.90, 27.56, Some(&sole), &hubs, 200_000.0).unwrap();

        assert_eq!(dest.pvp_id, "pvp-1");
        assert!(!dest.is_hub);
    }

    #[test]
    fn test_hub_routing_beyond_radius() {
        // Vitebsk warehouse, Brest pickup point (~570 km), Minsk hub
        let sole = pvp("pvp-brest", 52.10, 23.70, false);
        let hubs = vec![pvp("hub-minsk", 53.90, 27.56, true)];

        let dest = pick_destination(55.18, 30.20, Some(&sole), &hubs, 200_000.0).unwrap();

        assert_eq!(dest.pvp_id, "hub-minsk");
        assert!(dest.is_hub);
    }

    #[test]
    fn test_heterogeneous_group_routes_to_hub() {
        // No sole destination: mixed pickup points always consolidate
        let hubs = vec![pvp("hub-minsk", 53.90, 27.56, true)];

        let dest = pick_destination(55.18, 30.20, None, &hubs, 200_000.0).unwrap();

        assert_eq!(dest.pvp_id, "hub-minsk");
        assert!(dest.is_hub);
    }

    #[test]
    fn test_nearest_hub_wins() {
        let hubs = vec![
            pvp("hub-a", 53.90, 27.56, true), // Minsk, ~222 km from Vitebsk
            pvp("hub-b", 55.00, 30.00, true), // ~24 km from Vitebsk
        ];

        let dest = pick_destination(55.18, 30.20, None, &hubs, 200_000.0).unwrap();

        assert_eq!(dest.pvp_id, "hub-b");
    }

    #[test]
    fn test_hub_tie_breaks_on_id() {
        // Two hubs at identical coordinates; the list arrives sorted by id
        let hubs = vec![
            pvp("hub-a", 53.90, 27.56, true),
            pvp("hub-b", 53.90, 27.56, true),
        ];

        let dest = pick_destination(55.18, 30.20, None, &hubs, 200_000.0).unwrap();

        assert_eq!(dest.pvp_id, "hub-a");
    }

    #[test]
    fn test_no_hub_available() {
        let sole = pvp("pvp-far", 52.10, 23.70, false);

        let result = pick_destination(55.18, 30.20, Some(&sole), &[], 200_000.0);

        assert!(matches!(result, Err(FlushError::NoHubAvailable)));
    }

    #[test]
    fn test_direct_destination_may_itself_be_a_hub() {
        let sole = pvp("hub-near", 53.95, 27.60, true);
        let hubs = vec![sole.clone()];

        let dest = pick_destination(53.90, 27.56, Some(&sole), &hubs, 200_000.0).unwrap();

        assert_eq!(dest.pvp_id, "hub-near");
        assert!(dest.is_hub);
    }

    #[test]
    fn test_flush_error_maps_to_handler_taxonomy() {
        let e: HandlerError = FlushError::NoHubAvailable.into();
        assert!(matches!(e, HandlerError::Validation(_)));

        let e: HandlerError = FlushError::Database(sqlx::Error::PoolTimedOut).into();
        assert!(matches!(e, HandlerError::Transient(_)));
    }
}
