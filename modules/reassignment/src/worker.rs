//! Confirmation timeout watchdog
//!
//! Periodically sweeps expired confirmation windows and enqueues one
//! reassignment command per trip. Exactly-once emission is carried by the
//! outbox's (event_type, correlation_id) unique key: a swept row whose
//! command was already enqueued surfaces as a duplicate and is absorbed.

use chrono::Utc;
use messaging::envelope::EventEnvelope;
use messaging::outbox::{self, NewOutboxEvent, OutboxError};
use sqlx::PgPool;
use std::sync::Arc;

use crate::confirmation_repo;
use crate::contracts::ReassignCommandV1;
use crate::service::ConfirmationError;

const WATCHDOG_BATCH_SIZE: i64 = 50;

/// One watchdog pass; returns the number of commands emitted
pub async fn process_due_confirmations(
    pool: &PgPool,
    command_topic: &str,
) -> Result<usize, ConfirmationError> {
    let mut tx = pool.begin().await?;

    let due = confirmation_repo::due(&mut tx, WATCHDOG_BATCH_SIZE).await?;

    let mut emitted = 0;

    for row in due {
        let payload = ReassignCommandV1 {
            original_trip_id: row.trip_id.clone(),
            batch_id: row.batch_id.clone(),
            reason: "confirmation_timeout".to_string(),
        };

        let envelope = EventEnvelope::new(
            "команды.переназначить",
            row.trip_id.clone(),
            serde_json::to_value(&payload)?,
        );

        let new_event =
            NewOutboxEvent::from_envelope(&envelope, command_topic, &row.trip_id)?;

        match outbox::enqueue_tx(&mut tx, new_event).await {
            Ok(_) => {
                emitted += 1;
                tracing::warn!(
                    trip_id = %row.trip_id,
                    carrier_id = %row.carrier_id,
                    "Confirmation timed out, reassignment command enqueued"
                );
            }
            // Command already enqueued for this trip
            Err(OutboxError::DuplicateEvent { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        confirmation_repo::mark_reassigned(&mut tx, &row.trip_id).await?;
    }

    tx.commit().await?;

    if emitted > 0 {
        tracing::info!(emitted, at = %Utc::now(), "Watchdog pass complete");
    }

    Ok(emitted)
}

/// Periodic driver for the watchdog
pub async fn run_watchdog_loop(
    pool: PgPool,
    command_topic: Arc<String>,
    tick: std::time::Duration,
) {
    tracing::info!(tick_secs = tick.as_secs(), "Starting confirmation watchdog");

    let mut interval = tokio::time::interval(tick);

    loop {
        interval.tick().await;

        if let Err(e) = process_due_confirmations(&pool, &command_topic).await {
            tracing::error!(error = %e, "Watchdog pass failed");
        }
    }
}
