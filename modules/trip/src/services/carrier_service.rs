//! Carrier projections
//!
//! `events.reference_updated` (update_type=carrier) projects activity flags;
//! `events.carrier_location` projects positions and doubles as an implicit
//! liveness signal.

use messaging::envelope::EventEnvelope;
use messaging::idempotency::claim_event;
use sqlx::PgPool;

use crate::contracts::{CarrierLocationV1, CarrierReferenceV1};
use crate::repos::carrier_repo;
use crate::services::assignment_service::TripError;

pub async fn handle_reference_updated(
    pool: &PgPool,
    envelope: &EventEnvelope,
) -> Result<(), TripError> {
    let payload: CarrierReferenceV1 = envelope.decode_data()?;

    if payload.update_type != "carrier" {
        return Ok(());
    }
    let Some(carrier) = &payload.carrier else {
        return Ok(());
    };

    let mut tx = pool.begin().await?;

    if !claim_event(&mut tx, envelope.event_id, envelope.occurred_at).await? {
        tx.commit().await?;
        return Ok(());
    }

    carrier_repo::upsert_activity(&mut tx, &carrier.id, carrier.is_active, envelope.occurred_at)
        .await?;

    tx.commit().await?;

    tracing::info!(
        carrier_id = %carrier.id,
        is_active = carrier.is_active,
        reason = %payload.reason.as_deref().unwrap_or(""),
        "Carrier activity updated"
    );

    Ok(())
}

pub async fn handle_carrier_location(
    pool: &PgPool,
    envelope: &EventEnvelope,
) -> Result<(), TripError> {
    let payload: CarrierLocationV1 = envelope.decode_data()?;

    let mut tx = pool.begin().await?;

    if !claim_event(&mut tx, envelope.event_id, envelope.occurred_at).await? {
        tx.commit().await?;
        return Ok(());
    }

    carrier_repo::upsert_position(
        &mut tx,
        &payload.carrier_id,
        payload.latitude,
        payload.longitude,
        payload.timestamp,
    )
    .await?;

    // A carrier that reports its position is alive
    carrier_repo::upsert_activity(&mut tx, &payload.carrier_id, true, payload.timestamp).await?;

    tx.commit().await?;

    Ok(())
}
