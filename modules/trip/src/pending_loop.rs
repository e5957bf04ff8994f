//! Pending-assignment retry loop
//!
//! Periodically claims due pending rows (FOR UPDATE SKIP LOCKED, so multiple
//! instances cooperate) and retries carrier selection for each. A trip that
//! exhausts its attempts is flagged for manual assignment and an operator
//! alert is enqueued.

use chrono::Utc;
use messaging::envelope::EventEnvelope;
use messaging::outbox::{self, NewOutboxEvent};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::contracts::TripRequiresManualV1;
use crate::repos::trip_repo::{self, TripStatus};
use crate::repos::{carrier_repo, pending_repo};
use crate::services::assignment_service::{choose_carrier, TripError};
use crate::services::{TripSettings, MAX_ASSIGNMENT_ATTEMPTS};

const PENDING_BATCH_SIZE: i64 = 50;

/// One pass over due pending assignments, all within a single transaction
pub async fn process_pending_assignments(
    pool: &PgPool,
    settings: &TripSettings,
) -> Result<(), TripError> {
    let mut tx = pool.begin().await?;

    let due = pending_repo::due(&mut tx, PENDING_BATCH_SIZE).await?;

    for (trip_id, attempt_count) in due {
        let Some(context) = trip_repo::trip_context(&mut tx, trip_id).await? else {
            tracing::warn!(trip_id = %trip_id, "Pending trip has no batch link, skipping");
            continue;
        };

        let candidates = carrier_repo::active_candidates(&mut tx).await?;
        let selection = choose_carrier(
            context.origin_lat,
            context.origin_lng,
            &candidates,
            settings.carrier_radius_meters,
        );

        match selection {
            Some(selected) => {
                trip_repo::assign_trip(&mut tx, trip_id, &selected.carrier_id, selected.distance_meters)
                    .await?;
                pending_repo::delete(&mut tx, trip_id).await?;

                enqueue_assigned_from_context(&mut tx, settings, trip_id, &context, &selected)
                    .await?;

                tracing::info!(
                    trip_id = %trip_id,
                    carrier_id = %selected.carrier_id,
                    attempts = attempt_count,
                    "Pending trip assigned to carrier"
                );
            }
            None => {
                let attempts = attempt_count + 1;

                if attempts >= MAX_ASSIGNMENT_ATTEMPTS {
                    trip_repo::set_status(&mut tx, trip_id, TripStatus::RequiresManualAssignment)
                        .await?;
                    pending_repo::delete(&mut tx, trip_id).await?;

                    enqueue_manual_alert(&mut tx, settings, trip_id).await?;

                    tracing::warn!(
                        trip_id = %trip_id,
                        attempts = attempts,
                        "Trip requires manual assignment after exhausting attempts"
                    );
                } else {
                    pending_repo::schedule_retry(
                        &mut tx,
                        trip_id,
                        attempts,
                        Utc::now() + settings.pending_retry,
                    )
                    .await?;

                    tracing::info!(
                        trip_id = %trip_id,
                        attempt = attempts,
                        "No eligible carrier yet, retry scheduled"
                    );
                }
            }
        }
    }

    tx.commit().await?;

    Ok(())
}

async fn enqueue_assigned_from_context(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    settings: &TripSettings,
    trip_id: Uuid,
    context: &trip_repo::TripContext,
    selected: &crate::services::assignment_service::SelectedCarrier,
) -> Result<(), TripError> {
    let payload = crate::contracts::TripAssignedV1 {
        trip_id: trip_id.to_string(),
        batch_id: context.batch_id.clone(),
        carrier_id: selected.carrier_id.clone(),
        origin_lat: context.origin_lat,
        origin_lng: context.origin_lng,
        destination_lat: context.dest_lat,
        destination_lng: context.dest_lng,
        assigned_distance_meters: selected.distance_meters,
        assigned_at: Utc::now(),
    };

    let envelope = EventEnvelope::new(
        "trips.assigned",
        trip_id.to_string(),
        serde_json::to_value(&payload)?,
    );
    let new_event =
        NewOutboxEvent::from_envelope(&envelope, &settings.assigned_topic, &trip_id.to_string())?;
    outbox::enqueue_tx(tx, new_event).await?;

    Ok(())
}

async fn enqueue_manual_alert(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    settings: &TripSettings,
    trip_id: Uuid,
) -> Result<(), TripError> {
    let payload = TripRequiresManualV1 {
        trip_id: trip_id.to_string(),
        reason: "max_attempts_reached".to_string(),
    };

    let envelope = EventEnvelope::new(
        "trip_requires_manual_assignment",
        trip_id.to_string(),
        serde_json::to_value(&payload)?,
    );
    let new_event =
        NewOutboxEvent::from_envelope(&envelope, &settings.alerts_topic, &trip_id.to_string())?;
    outbox::enqueue_tx(tx, new_event).await?;

    Ok(())
}

/// Periodic driver for the retry loop
pub async fn run_pending_assignment_loop(
    pool: PgPool,
    settings: Arc<TripSettings>,
    tick: std::time::Duration,
) {
    tracing::info!(tick_secs = tick.as_secs(), "Starting pending assignment loop");

    let mut interval = tokio::time::interval(tick);

    loop {
        interval.tick().await;

        if let Err(e) = process_pending_assignments(&pool, &settings).await {
            tracing::error!(error = %e, "Pending assignment pass failed");
        }
    }
}
