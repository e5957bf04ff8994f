//! Hub disband
//!
//! When a batch routed through a hub arrives, its orders are regrouped by
//! their original destination pickup point and re-batched for the last mile.
//! The inbound batch row is retained as a historical record.

use chrono::Utc;
use messaging::envelope::EventEnvelope;
use messaging::outbox::{self, NewOutboxEvent};
use sqlx::{Postgres, Transaction};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::contracts::BatchFormedV1;
use crate::repos::{batch_repo, reference_repo};
use crate::services::flush_service::FlushError;

/// Split an inbound hub batch into one outbound batch per destination.
///
/// Runs entirely within the caller's (idempotency-gated) transaction.
/// Returns the number of batches formed. Orders whose destination is unknown
/// in the reference data are skipped with a warning; an unknown hub fails
/// the whole disband so the delivery is retried after the reference event
/// arrives.
pub async fn disband_batch(
    tx: &mut Transaction<'_, Postgres>,
    out_topic: &str,
    hub_pvp_id: &str,
    batch_id: Uuid,
) -> Result<usize, FlushError> {
    let orders = batch_repo::orders_with_destinations(tx, batch_id).await?;

    // BTreeMap keeps destination processing order deterministic
    let mut by_destination: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (order_id, destination) in orders {
        if let Some(dest) = destination {
            by_destination.entry(dest).or_default().push(order_id);
        }
    }

    let hub = reference_repo::pickup_point(&mut **tx, hub_pvp_id)
        .await?
        .ok_or_else(|| FlushError::UnknownPickupPoint(hub_pvp_id.to_string()))?;

    let mut formed = 0;

    for (destination_id, order_ids) in by_destination {
        if order_ids.is_empty() {
            continue;
        }

        let Some(destination) = reference_repo::pickup_point(&mut **tx, &destination_id).await?
        else {
            tracing::warn!(
                batch_id = %batch_id,
                destination_id = %destination_id,
                "Skipping unknown destination during disband"
            );
            continue;
        };

        let new_batch_id = Uuid::new_v4();
        let formed_at = Utc::now();

        batch_repo::insert_batch(
            tx,
            &batch_repo::NewBatch {
                id: new_batch_id,
                origin_type: "pvp".to_string(),
                origin_id: hub.pvp_id.clone(),
                destination_id: destination.pvp_id.clone(),
                origin_lat: hub.latitude,
                origin_lng: hub.longitude,
                destination_lat: destination.latitude,
                destination_lng: destination.longitude,
                is_hub_destination: false,
                formed_at,
            },
        )
        .await?;

        for order_id in &order_ids {
            batch_repo::insert_batch_order(tx, new_batch_id, order_id, Some(&destination_id))
                .await?;
        }

        let payload = BatchFormedV1 {
            batch_id: new_batch_id.to_string(),
            origin_type: "pvp".to_string(),
            origin_id: hub.pvp_id.clone(),
            origin_lat: hub.latitude,
            origin_lng: hub.longitude,
            destination_type: "pvp".to_string(),
            destination_id: destination.pvp_id.clone(),
            destination_lat: destination.latitude,
            destination_lng: destination.longitude,
            is_hub_destination: false,
            order_ids: order_ids.clone(),
            order_contacts: vec![],
            formed_at,
        };

        let envelope = EventEnvelope::new(
            "batches.formed",
            new_batch_id.to_string(),
            serde_json::to_value(&payload)?,
        );

        let new_event =
            NewOutboxEvent::from_envelope(&envelope, out_topic, &new_batch_id.to_string())?;
        outbox::enqueue_tx(tx, new_event).await?;

        tracing::info!(
            inbound_batch_id = %batch_id,
            batch_id = %new_batch_id,
            hub = %hub.pvp_id,
            destination_id = %destination.pvp_id,
            orders = order_ids.len(),
            "Outbound batch formed at hub"
        );

        formed += 1;
    }

    Ok(formed)
}
