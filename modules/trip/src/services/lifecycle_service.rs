//! Batch-event-driven trip state transitions
//!
//! `events.batch_picked_up` moves the batch's trip ASSIGNED → IN_PROGRESS;
//! `events.batch_delivered_to_pvp` moves it IN_PROGRESS → COMPLETED. An
//! event arriving while the trip is in any other state is absorbed
//! idempotently: the claim commits and nothing else changes.

use chrono::Utc;
use messaging::envelope::EventEnvelope;
use messaging::idempotency::claim_event;
use messaging::outbox::{self, NewOutboxEvent};
use sqlx::PgPool;

use crate::contracts::{BatchLifecycleV1, TripCompletedV1, TripStartedV1};
use crate::repos::trip_repo::{self, TripStatus};
use crate::services::assignment_service::TripError;
use crate::services::TripSettings;

pub async fn handle_batch_picked_up(
    pool: &PgPool,
    settings: &TripSettings,
    envelope: &EventEnvelope,
) -> Result<(), TripError> {
    let payload: BatchLifecycleV1 = envelope.decode_data()?;

    let mut tx = pool.begin().await?;

    if !claim_event(&mut tx, envelope.event_id, envelope.occurred_at).await? {
        tx.commit().await?;
        return Ok(());
    }

    let transitioned = trip_repo::transition_by_batch(
        &mut tx,
        &payload.batch_id,
        TripStatus::Assigned,
        TripStatus::InProgress,
    )
    .await?;

    if let Some((trip_id, carrier_id)) = transitioned {
        let started_at = Utc::now();
        let event_payload = TripStartedV1 {
            trip_id: trip_id.to_string(),
            batch_id: payload.batch_id.clone(),
            carrier_id,
            started_at,
        };

        let out = EventEnvelope::new(
            "trips.started",
            trip_id.to_string(),
            serde_json::to_value(&event_payload)?,
        );
        let new_event =
            NewOutboxEvent::from_envelope(&out, &settings.started_topic, &trip_id.to_string())?;
        outbox::enqueue_tx(&mut tx, new_event).await?;

        tracing::info!(
            trip_id = %trip_id,
            batch_id = %payload.batch_id,
            "Trip started"
        );
    } else {
        tracing::debug!(
            batch_id = %payload.batch_id,
            "Pickup event ignored, no trip in ASSIGNED state for batch"
        );
    }

    tx.commit().await?;

    Ok(())
}

pub async fn handle_batch_delivered(
    pool: &PgPool,
    settings: &TripSettings,
    envelope: &EventEnvelope,
) -> Result<(), TripError> {
    let payload: BatchLifecycleV1 = envelope.decode_data()?;

    let mut tx = pool.begin().await?;

    if !claim_event(&mut tx, envelope.event_id, envelope.occurred_at).await? {
        tx.commit().await?;
        return Ok(());
    }

    let transitioned = trip_repo::transition_by_batch(
        &mut tx,
        &payload.batch_id,
        TripStatus::InProgress,
        TripStatus::Completed,
    )
    .await?;

    if let Some((trip_id, carrier_id)) = transitioned {
        let completed_at = Utc::now();
        let event_payload = TripCompletedV1 {
            trip_id: trip_id.to_string(),
            batch_id: payload.batch_id.clone(),
            carrier_id,
            completed_at,
        };

        let out = EventEnvelope::new(
            "trips.completed",
            trip_id.to_string(),
            serde_json::to_value(&event_payload)?,
        );
        let new_event =
            NewOutboxEvent::from_envelope(&out, &settings.completed_topic, &trip_id.to_string())?;
        outbox::enqueue_tx(&mut tx, new_event).await?;

        tracing::info!(
            trip_id = %trip_id,
            batch_id = %payload.batch_id,
            "Trip completed"
        );
    } else {
        tracing::debug!(
            batch_id = %payload.batch_id,
            "Delivery event ignored, no trip in IN_PROGRESS state for batch"
        );
    }

    tx.commit().await?;

    Ok(())
}
