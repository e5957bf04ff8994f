//! Confirmation tracking
//!
//! Assignments open a pending-confirmation window; confirmations and
//! rejections close it. An inbound reassignment command is re-emitted
//! through the outbox so it propagates reliably; the processed-events ledger
//! keeps the consume-produce cycle from looping, because the re-emitted
//! envelope keeps its original event_id.

use chrono::Duration;
use messaging::consumer::HandlerError;
use messaging::envelope::{CodecError, EventEnvelope};
use messaging::idempotency::claim_event;
use messaging::outbox::{self, NewOutboxEvent, OutboxError};
use sqlx::PgPool;

use crate::confirmation_repo;
use crate::contracts::{TripAssignmentV1, TripRefV1};

/// Errors from confirmation tracking
#[derive(Debug, thiserror::Error)]
pub enum ConfirmationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Outbox(#[from] OutboxError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("payload encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<ConfirmationError> for HandlerError {
    fn from(e: ConfirmationError) -> Self {
        match e {
            ConfirmationError::Database(e) => {
                HandlerError::Transient(format!("database error: {}", e))
            }
            ConfirmationError::Outbox(e) => e.into(),
            other => HandlerError::Validation(other.to_string()),
        }
    }
}

/// Open (or reset) the confirmation window for an assigned trip
pub async fn handle_trip_assigned(
    pool: &PgPool,
    confirmation_timeout: Duration,
    envelope: &EventEnvelope,
) -> Result<(), ConfirmationError> {
    let payload: TripAssignmentV1 = envelope.decode_data()?;

    let mut tx = pool.begin().await?;

    if !claim_event(&mut tx, envelope.event_id, envelope.occurred_at).await? {
        tx.commit().await?;
        return Ok(());
    }

    let timeout_at = payload.assigned_at + confirmation_timeout;

    confirmation_repo::upsert(
        &mut tx,
        &payload.trip_id,
        &payload.batch_id,
        &payload.carrier_id,
        payload.assigned_at,
        timeout_at,
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        trip_id = %payload.trip_id,
        carrier_id = %payload.carrier_id,
        timeout_at = %timeout_at,
        "Confirmation window opened"
    );

    Ok(())
}

/// Close the confirmation window (trip confirmed or rejected)
pub async fn handle_trip_resolved(
    pool: &PgPool,
    envelope: &EventEnvelope,
) -> Result<(), ConfirmationError> {
    let payload: TripRefV1 = envelope.decode_data()?;

    let mut tx = pool.begin().await?;

    if !claim_event(&mut tx, envelope.event_id, envelope.occurred_at).await? {
        tx.commit().await?;
        return Ok(());
    }

    confirmation_repo::delete(&mut tx, &payload.trip_id).await?;

    tx.commit().await?;

    tracing::info!(trip_id = %payload.trip_id, "Confirmation window closed");

    Ok(())
}

/// Re-emit an inbound reassignment command through the outbox.
///
/// The raw envelope is forwarded verbatim (unknown fields included) so
/// downstream consumers see the original event_id and deduplicate.
pub async fn handle_reassign_command(
    pool: &PgPool,
    command_topic: &str,
    envelope: &EventEnvelope,
) -> Result<(), ConfirmationError> {
    let mut tx = pool.begin().await?;

    if !claim_event(&mut tx, envelope.event_id, envelope.occurred_at).await? {
        tx.commit().await?;
        return Ok(());
    }

    let new_event = NewOutboxEvent {
        event_type: "commands.trip.reassign".to_string(),
        correlation_id: envelope.correlation_id.clone(),
        topic: command_topic.to_string(),
        partition_key: envelope.correlation_id.clone(),
        payload: serde_json::to_value(envelope)?,
        occurred_at: envelope.occurred_at,
    };

    match outbox::enqueue_tx(&mut tx, new_event).await {
        Ok(_) => {}
        // Already propagated for this trip
        Err(OutboxError::DuplicateEvent { .. }) => {}
        Err(e) => return Err(e.into()),
    }

    tx.commit().await?;

    Ok(())
}
