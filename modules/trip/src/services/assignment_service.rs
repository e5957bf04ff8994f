//! Carrier selection and trip creation
//!
//! A newly formed batch gets a trip immediately: assigned to the nearest
//! eligible carrier when one exists, otherwise created PENDING with a retry
//! record the pending-assignment loop picks up. Reassignment commands follow
//! the same selection but spawn a fresh trip, leaving the old one's history
//! in place.

use chrono::{DateTime, Utc};
use messaging::consumer::HandlerError;
use messaging::envelope::{CodecError, EventEnvelope};
use messaging::idempotency::claim_event;
use messaging::outbox::{self, NewOutboxEvent, OutboxError};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::contracts::{BatchFormedV1, ReassignCommandV1, TripAssignedV1};
use crate::geo::haversine;
use crate::repos::carrier_repo::{self, CarrierCandidate};
use crate::repos::trip_repo::{self, NewTrip, TripStatus};
use crate::repos::pending_repo;
use crate::services::TripSettings;

/// Errors from trip operations
#[derive(Debug, thiserror::Error)]
pub enum TripError {
    #[error("trip {0} not found")]
    UnknownTrip(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Outbox(#[from] OutboxError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("payload encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<TripError> for HandlerError {
    fn from(e: TripError) -> Self {
        match e {
            TripError::Database(e) => HandlerError::Transient(format!("database error: {}", e)),
            TripError::Outbox(e) => e.into(),
            other => HandlerError::Validation(other.to_string()),
        }
    }
}

/// Outcome of carrier selection
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedCarrier {
    pub carrier_id: String,
    pub distance_meters: i32,
}

/// Pick the nearest eligible carrier.
///
/// Candidates without a known position are skipped, as is anything farther
/// than `radius_meters` from the origin. Ties break on carrier_id ascending
/// (callers pass the list sorted). None means no eligible carrier.
pub fn choose_carrier(
    origin_lat: f64,
    origin_lng: f64,
    candidates: &[CarrierCandidate],
    radius_meters: f64,
) -> Option<SelectedCarrier> {
    let mut best: Option<(&CarrierCandidate, f64)> = None;

    for candidate in candidates {
        let (Some(lat), Some(lng)) = (candidate.latitude, candidate.longitude) else {
            continue;
        };

        let distance = haversine(origin_lat, origin_lng, lat, lng);
        if distance > radius_meters {
            continue;
        }

        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((candidate, distance)),
        }
    }

    best.map(|(candidate, distance)| SelectedCarrier {
        carrier_id: candidate.carrier_id.clone(),
        distance_meters: distance.round() as i32,
    })
}

/// Enqueue a `trips.assigned` envelope for a freshly assigned trip
async fn enqueue_assigned(
    tx: &mut Transaction<'_, Postgres>,
    topic: &str,
    trip_id: Uuid,
    batch_id: &str,
    carrier_id: &str,
    distance_meters: i32,
    origin: (f64, f64),
    dest: (f64, f64),
    assigned_at: DateTime<Utc>,
) -> Result<(), TripError> {
    let payload = TripAssignedV1 {
        trip_id: trip_id.to_string(),
        batch_id: batch_id.to_string(),
        carrier_id: carrier_id.to_string(),
        origin_lat: origin.0,
        origin_lng: origin.1,
        destination_lat: dest.0,
        destination_lng: dest.1,
        assigned_distance_meters: distance_meters,
        assigned_at,
    };

    let envelope = EventEnvelope::new(
        "trips.assigned",
        trip_id.to_string(),
        serde_json::to_value(&payload)?,
    );

    let new_event = NewOutboxEvent::from_envelope(&envelope, topic, &trip_id.to_string())?;
    outbox::enqueue_tx(tx, new_event).await?;

    Ok(())
}

/// React to `batches.formed`: create an ASSIGNED trip when a carrier is
/// available, a PENDING trip with an immediate retry record otherwise.
pub async fn create_or_pend_trip(
    pool: &PgPool,
    settings: &TripSettings,
    envelope: &EventEnvelope,
) -> Result<(), TripError> {
    let payload: BatchFormedV1 = envelope.decode_data()?;

    let mut tx = pool.begin().await?;

    if !claim_event(&mut tx, envelope.event_id, envelope.occurred_at).await? {
        tx.commit().await?;
        return Ok(());
    }

    let candidates = carrier_repo::active_candidates(&mut tx).await?;
    let selection = choose_carrier(
        payload.origin_lat,
        payload.origin_lng,
        &candidates,
        settings.carrier_radius_meters,
    );

    let origin = (payload.origin_lat, payload.origin_lng);
    let dest = (payload.destination_lat, payload.destination_lng);

    match selection {
        Some(selected) => {
            let trip = NewTrip::assigned(&selected.carrier_id, selected.distance_meters, origin, dest);
            trip_repo::insert_trip(&mut tx, &trip).await?;
            trip_repo::link_batch(&mut tx, trip.id, &payload.batch_id).await?;

            enqueue_assigned(
                &mut tx,
                &settings.assigned_topic,
                trip.id,
                &payload.batch_id,
                &selected.carrier_id,
                selected.distance_meters,
                origin,
                dest,
                trip.assigned_at.unwrap_or_else(Utc::now),
            )
            .await?;

            tracing::info!(
                trip_id = %trip.id,
                batch_id = %payload.batch_id,
                carrier_id = %selected.carrier_id,
                distance_meters = selected.distance_meters,
                "Trip assigned to carrier"
            );
        }
        None => {
            let trip = NewTrip::pending(origin, dest);
            trip_repo::insert_trip(&mut tx, &trip).await?;
            trip_repo::link_batch(&mut tx, trip.id, &payload.batch_id).await?;

            // timeout_at = NOW() so the retry loop picks it up immediately
            pending_repo::upsert(&mut tx, trip.id, Utc::now()).await?;

            tracing::info!(
                trip_id = %trip.id,
                batch_id = %payload.batch_id,
                "No eligible carrier, trip created PENDING"
            );
        }
    }

    tx.commit().await?;

    Ok(())
}

/// React to a reassignment command.
///
/// A PENDING target just gets its retry deadline pulled forward. Any other
/// status gets a fresh trip: ASSIGNED when a carrier is available (the old
/// trip becomes REASSIGNED), PENDING otherwise (the old trip keeps its
/// status).
pub async fn handle_reassign(
    pool: &PgPool,
    settings: &TripSettings,
    envelope: &EventEnvelope,
) -> Result<(), TripError> {
    let payload: ReassignCommandV1 = envelope.decode_data()?;

    let trip_id = Uuid::parse_str(&payload.original_trip_id)
        .map_err(|_| TripError::InvalidId(payload.original_trip_id.clone()))?;

    let mut tx = pool.begin().await?;

    if !claim_event(&mut tx, envelope.event_id, envelope.occurred_at).await? {
        tx.commit().await?;
        return Ok(());
    }

    let trip = trip_repo::load_trip(&mut tx, trip_id)
        .await?
        .ok_or_else(|| TripError::UnknownTrip(payload.original_trip_id.clone()))?;

    if trip.status == TripStatus::Pending {
        pending_repo::trigger_now(&mut tx, trip_id).await?;
        tx.commit().await?;

        tracing::info!(
            trip_id = %trip_id,
            reason = %payload.reason,
            "Reassignment pulled pending retry forward"
        );

        return Ok(());
    }

    let candidates = carrier_repo::active_candidates(&mut tx).await?;
    let selection = choose_carrier(
        trip.origin_lat,
        trip.origin_lng,
        &candidates,
        settings.carrier_radius_meters,
    );

    let origin = (trip.origin_lat, trip.origin_lng);
    let dest = (trip.dest_lat, trip.dest_lng);

    match selection {
        None => {
            // No carrier: queue a replacement trip; the old trip keeps its
            // prior status
            let replacement = NewTrip::pending(origin, dest);
            trip_repo::insert_trip(&mut tx, &replacement).await?;
            trip_repo::link_batch(&mut tx, replacement.id, &payload.batch_id).await?;
            pending_repo::upsert(&mut tx, replacement.id, Utc::now()).await?;

            tracing::info!(
                original_trip_id = %trip_id,
                trip_id = %replacement.id,
                "Reassignment found no carrier, replacement trip created PENDING"
            );
        }
        Some(selected) => {
            let replacement =
                NewTrip::assigned(&selected.carrier_id, selected.distance_meters, origin, dest);
            trip_repo::insert_trip(&mut tx, &replacement).await?;
            trip_repo::link_batch(&mut tx, replacement.id, &payload.batch_id).await?;
            trip_repo::set_status(&mut tx, trip_id, TripStatus::Reassigned).await?;

            enqueue_assigned(
                &mut tx,
                &settings.assigned_topic,
                replacement.id,
                &payload.batch_id,
                &selected.carrier_id,
                selected.distance_meters,
                origin,
                dest,
                replacement.assigned_at.unwrap_or_else(Utc::now),
            )
            .await?;

            tracing::info!(
                original_trip_id = %trip_id,
                trip_id = %replacement.id,
                carrier_id = %selected.carrier_id,
                "Trip reassigned to new carrier"
            );
        }
    }

    tx.commit().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, lat: f64, lng: f64) -> CarrierCandidate {
        CarrierCandidate {
            carrier_id: id.to_string(),
            latitude: Some(lat),
            longitude: Some(lng),
        }
    }

    #[test]
    fn test_nearest_carrier_wins() {
        let candidates = vec![
            candidate("c-far", 53.93, 27.56),  // ~3.3 km
            candidate("c-near", 53.91, 27.56), // ~1.1 km
        ];

        let selected = choose_carrier(53.90, 27.56, &candidates, 5_000.0).unwrap();

        assert_eq!(selected.carrier_id, "c-near");
        assert!(selected.distance_meters > 1_000 && selected.distance_meters < 1_300);
    }

    #[test]
    fn test_radius_filter() {
        // ~11 km away, outside the 5 km radius
        let candidates = vec![candidate("c-1", 54.00, 27.56)];

        assert_eq!(choose_carrier(53.90, 27.56, &candidates, 5_000.0), None);
    }

    #[test]
    fn test_missing_position_is_skipped() {
        let candidates = vec![
            CarrierCandidate {
                carrier_id: "c-unpositioned".to_string(),
                latitude: None,
                longitude: None,
            },
            candidate("c-positioned", 53.91, 27.56),
        ];

        let selected = choose_carrier(53.90, 27.56, &candidates, 5_000.0).unwrap();

        assert_eq!(selected.carrier_id, "c-positioned");
    }

    #[test]
    fn test_tie_breaks_on_carrier_id() {
        // Identical positions; the list arrives sorted by carrier_id
        let candidates = vec![
            candidate("c-a", 53.91, 27.56),
            candidate("c-b", 53.91, 27.56),
        ];

        let selected = choose_carrier(53.90, 27.56, &candidates, 5_000.0).unwrap();

        assert_eq!(selected.carrier_id, "c-a");
    }

    #[test]
    fn test_no_candidates() {
        assert_eq!(choose_carrier(53.90, 27.56, &[], 5_000.0), None);
    }

    #[test]
    fn test_trip_error_maps_to_handler_taxonomy() {
        let e: HandlerError = TripError::UnknownTrip("t-1".into()).into();
        assert!(matches!(e, HandlerError::Validation(_)));

        let e: HandlerError = TripError::Database(sqlx::Error::PoolTimedOut).into();
        assert!(matches!(e, HandlerError::Transient(_)));
    }
}
