//! Dispatch function for the trip service's consumed topics

use async_trait::async_trait;
use event_bus::BusMessage;
use messaging::consumer::{EventHandler, HandlerError};
use messaging::envelope::EventEnvelope;
use sqlx::PgPool;
use std::sync::Arc;

use crate::services::{assignment_service, carrier_service, lifecycle_service, TripSettings};

/// Handles `batches.formed`, batch lifecycle events, carrier telemetry,
/// carrier reference updates and reassignment commands
pub struct TripHandler {
    pool: PgPool,
    settings: Arc<TripSettings>,
}

impl TripHandler {
    pub fn new(pool: PgPool, settings: Arc<TripSettings>) -> Self {
        Self { pool, settings }
    }
}

#[async_trait]
impl EventHandler for TripHandler {
    async fn handle(&self, topic: &str, msg: &BusMessage) -> Result<(), HandlerError> {
        let envelope = EventEnvelope::decode(&msg.payload)?;

        match topic {
            "batches.formed" => {
                assignment_service::create_or_pend_trip(&self.pool, &self.settings, &envelope)
                    .await?
            }
            "events.batch_picked_up" => {
                lifecycle_service::handle_batch_picked_up(&self.pool, &self.settings, &envelope)
                    .await?
            }
            "events.batch_delivered_to_pvp" => {
                lifecycle_service::handle_batch_delivered(&self.pool, &self.settings, &envelope)
                    .await?
            }
            "events.carrier_location" => {
                carrier_service::handle_carrier_location(&self.pool, &envelope).await?
            }
            "events.reference_updated" => {
                carrier_service::handle_reference_updated(&self.pool, &envelope).await?
            }
            "commands.trip.reassign" => {
                assignment_service::handle_reassign(&self.pool, &self.settings, &envelope).await?
            }
            // Unknown topics are skippable by design
            _ => {}
        }

        Ok(())
    }
}
