//! Dispatch function for the batching service's consumed topics

use async_trait::async_trait;
use event_bus::BusMessage;
use messaging::consumer::{EventHandler, HandlerError};
use messaging::envelope::EventEnvelope;
use messaging::idempotency::claim_event;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::contracts::{BatchDeliveredV1, OrderCreatedV1, ReferenceUpdatedV1};
use crate::groups::GroupsCache;
use crate::repos::{group_repo, reference_repo};
use crate::services::{disband_service, flush_service, BatchingSettings};

/// Handles `orders.created`, `events.reference_updated` and
/// `events.batch_delivered_to_pvp`
pub struct BatchingHandler {
    pool: PgPool,
    settings: Arc<BatchingSettings>,
    groups: Arc<GroupsCache>,
}

impl BatchingHandler {
    pub fn new(pool: PgPool, settings: Arc<BatchingSettings>, groups: Arc<GroupsCache>) -> Self {
        Self {
            pool,
            settings,
            groups,
        }
    }

    async fn handle_order_created(&self, envelope: &EventEnvelope) -> Result<(), HandlerError> {
        let payload: OrderCreatedV1 = envelope.decode_data()?;

        let mut tx = self.pool.begin().await?;

        if !claim_event(&mut tx, envelope.event_id, envelope.occurred_at).await? {
            tx.commit().await?;
            return Ok(());
        }

        group_repo::upsert_item(
            &mut tx,
            &payload.seller_warehouse_id,
            &payload.pickup_point_id,
            &payload.order_id,
            &payload.customer_phone,
            &payload.customer_email,
        )
        .await?;

        tx.commit().await?;

        self.groups.touch(&payload.seller_warehouse_id);

        tracing::info!(
            order_id = %payload.order_id,
            warehouse_id = %payload.seller_warehouse_id,
            pvp_id = %payload.pickup_point_id,
            "Order added to batch group"
        );

        // Size-triggered flush runs after the add commits, in its own
        // transaction
        if let Some(batch_id) = flush_service::try_flush_by_size(
            &self.pool,
            &self.settings,
            &payload.seller_warehouse_id,
        )
        .await?
        {
            self.groups.clear(&payload.seller_warehouse_id);
            tracing::info!(batch_id = %batch_id, "Batch formed by size trigger");
        }

        Ok(())
    }

    async fn handle_reference_updated(&self, envelope: &EventEnvelope) -> Result<(), HandlerError> {
        let payload: ReferenceUpdatedV1 = envelope.decode_data()?;

        let mut tx = self.pool.begin().await?;

        if !claim_event(&mut tx, envelope.event_id, envelope.occurred_at).await? {
            tx.commit().await?;
            return Ok(());
        }

        match payload.update_type.as_str() {
            "warehouse" => {
                if let Some(w) = &payload.warehouse {
                    reference_repo::upsert_warehouse(
                        &mut tx,
                        &w.warehouse_id,
                        &w.name,
                        w.latitude,
                        w.longitude,
                    )
                    .await?;
                }
            }
            "pickup_point" => {
                if let Some(p) = &payload.pickup_point {
                    reference_repo::upsert_pickup_point(
                        &mut tx,
                        &p.pvp_id,
                        &p.name,
                        p.latitude,
                        p.longitude,
                        p.is_hub,
                    )
                    .await?;
                }
            }
            _ => {}
        }

        tx.commit().await?;

        Ok(())
    }

    async fn handle_batch_delivered(&self, envelope: &EventEnvelope) -> Result<(), HandlerError> {
        let payload: BatchDeliveredV1 = envelope.decode_data()?;

        let mut tx = self.pool.begin().await?;

        if !claim_event(&mut tx, envelope.event_id, envelope.occurred_at).await? {
            tx.commit().await?;
            return Ok(());
        }

        // Only deliveries to a hub trigger disband
        if !payload.is_hub {
            tx.commit().await?;
            return Ok(());
        }

        let batch_id = Uuid::parse_str(&payload.batch_id)
            .map_err(|e| HandlerError::Validation(format!("invalid batch_id: {}", e)))?;

        let formed =
            disband_service::disband_batch(&mut tx, &self.settings.out_topic, &payload.pvp_id, batch_id)
                .await?;

        tx.commit().await?;

        tracing::info!(
            batch_id = %payload.batch_id,
            hub = %payload.pvp_id,
            outbound_batches = formed,
            "Hub disband complete"
        );

        Ok(())
    }
}

#[async_trait]
impl EventHandler for BatchingHandler {
    async fn handle(&self, topic: &str, msg: &BusMessage) -> Result<(), HandlerError> {
        let envelope = EventEnvelope::decode(&msg.payload)?;

        match topic {
            "orders.created" => self.handle_order_created(&envelope).await,
            "events.reference_updated" => self.handle_reference_updated(&envelope).await,
            "events.batch_delivered_to_pvp" => self.handle_batch_delivered(&envelope).await,
            // Unknown topics are skippable by design
            _ => Ok(()),
        }
    }
}
