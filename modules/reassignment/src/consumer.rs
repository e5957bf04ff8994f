//! Dispatch function for the reassignment service's consumed topics

use async_trait::async_trait;
use chrono::Duration;
use event_bus::BusMessage;
use messaging::consumer::{EventHandler, HandlerError};
use messaging::envelope::EventEnvelope;
use sqlx::PgPool;

use crate::service;

/// Handles assignment, confirmation, rejection and reassignment-command
/// events
pub struct ReassignmentHandler {
    pool: PgPool,
    command_topic: String,
    confirmation_timeout: Duration,
}

impl ReassignmentHandler {
    pub fn new(pool: PgPool, command_topic: String, confirmation_timeout: Duration) -> Self {
        Self {
            pool,
            command_topic,
            confirmation_timeout,
        }
    }
}

#[async_trait]
impl EventHandler for ReassignmentHandler {
    async fn handle(&self, topic: &str, msg: &BusMessage) -> Result<(), HandlerError> {
        let envelope = EventEnvelope::decode(&msg.payload)?;

        match topic {
            "trips.assigned" => {
                service::handle_trip_assigned(&self.pool, self.confirmation_timeout, &envelope)
                    .await?
            }
            "trips.confirmed" | "trips.declined" => {
                service::handle_trip_resolved(&self.pool, &envelope).await?
            }
            "commands.trip.reassign" => {
                service::handle_reassign_command(&self.pool, &self.command_topic, &envelope)
                    .await?
            }
            // Unknown topics are skippable by design
            _ => {}
        }

        Ok(())
    }
}
