//! Trip storage

use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Trip lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Reassigned,
    RequiresManualAssignment,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Pending => "PENDING",
            TripStatus::Assigned => "ASSIGNED",
            TripStatus::InProgress => "IN_PROGRESS",
            TripStatus::Completed => "COMPLETED",
            TripStatus::Reassigned => "REASSIGNED",
            TripStatus::RequiresManualAssignment => "REQUIRES_MANUAL_ASSIGNMENT",
        }
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TripStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TripStatus::Pending),
            "ASSIGNED" => Ok(TripStatus::Assigned),
            "IN_PROGRESS" => Ok(TripStatus::InProgress),
            "COMPLETED" => Ok(TripStatus::Completed),
            "REASSIGNED" => Ok(TripStatus::Reassigned),
            "REQUIRES_MANUAL_ASSIGNMENT" => Ok(TripStatus::RequiresManualAssignment),
            invalid => Err(format!("{} is not a valid trip status", invalid)),
        }
    }
}

/// A trip row to insert
#[derive(Debug, Clone)]
pub struct NewTrip {
    pub id: Uuid,
    pub carrier_id: Option<String>,
    pub status: TripStatus,
    pub assigned_at: Option<DateTime<Utc>>,
    pub assigned_distance_meters: i32,
    pub origin_lat: f64,
    pub origin_lng: f64,
    pub dest_lat: f64,
    pub dest_lng: f64,
}

impl NewTrip {
    /// A trip assigned to a carrier at creation time
    pub fn assigned(
        carrier_id: &str,
        distance_meters: i32,
        origin: (f64, f64),
        dest: (f64, f64),
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            carrier_id: Some(carrier_id.to_string()),
            status: TripStatus::Assigned,
            assigned_at: Some(Utc::now()),
            assigned_distance_meters: distance_meters,
            origin_lat: origin.0,
            origin_lng: origin.1,
            dest_lat: dest.0,
            dest_lng: dest.1,
        }
    }

    /// A trip waiting for any eligible carrier
    pub fn pending(origin: (f64, f64), dest: (f64, f64)) -> Self {
        Self {
            id: Uuid::new_v4(),
            carrier_id: None,
            status: TripStatus::Pending,
            assigned_at: None,
            assigned_distance_meters: 0,
            origin_lat: origin.0,
            origin_lng: origin.1,
            dest_lat: dest.0,
            dest_lng: dest.1,
        }
    }
}

/// A loaded trip, as needed by reassignment
#[derive(Debug, Clone)]
pub struct TripRow {
    pub id: Uuid,
    pub status: TripStatus,
    pub origin_lat: f64,
    pub origin_lng: f64,
    pub dest_lat: f64,
    pub dest_lng: f64,
}

/// Trip coordinates plus its first bound batch, as needed by the pending
/// assignment loop
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TripContext {
    pub origin_lat: f64,
    pub origin_lng: f64,
    pub dest_lat: f64,
    pub dest_lng: f64,
    pub batch_id: String,
}

pub async fn insert_trip(
    tx: &mut Transaction<'_, Postgres>,
    trip: &NewTrip,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO trips
            (id, carrier_id, status, assigned_at, assigned_distance_meters,
             origin_lat, origin_lng, dest_lat, dest_lng)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(trip.id)
    .bind(&trip.carrier_id)
    .bind(trip.status.as_str())
    .bind(trip.assigned_at)
    .bind(trip.assigned_distance_meters)
    .bind(trip.origin_lat)
    .bind(trip.origin_lng)
    .bind(trip.dest_lat)
    .bind(trip.dest_lng)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub async fn link_batch(
    tx: &mut Transaction<'_, Postgres>,
    trip_id: Uuid,
    batch_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO trip_batches (trip_id, batch_id) VALUES ($1, $2)")
        .bind(trip_id)
        .bind(batch_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Load a trip's status and endpoints
pub async fn load_trip(
    tx: &mut Transaction<'_, Postgres>,
    trip_id: Uuid,
) -> Result<Option<TripRow>, sqlx::Error> {
    let row: Option<(String, f64, f64, f64, f64)> = sqlx::query_as(
        "SELECT status, origin_lat, origin_lng, dest_lat, dest_lng FROM trips WHERE id = $1",
    )
    .bind(trip_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(row.map(|(status, origin_lat, origin_lng, dest_lat, dest_lng)| TripRow {
        id: trip_id,
        status: status.parse().unwrap_or(TripStatus::Pending),
        origin_lat,
        origin_lng,
        dest_lat,
        dest_lng,
    }))
}

/// Coordinates and first bound batch for a pending trip
pub async fn trip_context(
    tx: &mut Transaction<'_, Postgres>,
    trip_id: Uuid,
) -> Result<Option<TripContext>, sqlx::Error> {
    sqlx::query_as::<_, TripContext>(
        r#"
        SELECT t.origin_lat, t.origin_lng, t.dest_lat, t.dest_lng, tb.batch_id
        FROM trips t
        JOIN trip_batches tb ON t.id = tb.trip_id
        WHERE t.id = $1
        ORDER BY tb.batch_id
        LIMIT 1
        "#,
    )
    .bind(trip_id)
    .fetch_optional(&mut **tx)
    .await
}

/// Promote a pending trip to ASSIGNED
pub async fn assign_trip(
    tx: &mut Transaction<'_, Postgres>,
    trip_id: Uuid,
    carrier_id: &str,
    distance_meters: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE trips
        SET status = 'ASSIGNED', carrier_id = $2, assigned_at = NOW(),
            assigned_distance_meters = $3
        WHERE id = $1
        "#,
    )
    .bind(trip_id)
    .bind(carrier_id)
    .bind(distance_meters)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub async fn set_status(
    tx: &mut Transaction<'_, Postgres>,
    trip_id: Uuid,
    status: TripStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE trips SET status = $2 WHERE id = $1")
        .bind(trip_id)
        .bind(status.as_str())
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Transition the unique trip bound to a batch from one status to another.
///
/// Returns the trip and its carrier when the transition applied; None when
/// no trip is in the expected state (the event is absorbed idempotently).
pub async fn transition_by_batch(
    tx: &mut Transaction<'_, Postgres>,
    batch_id: &str,
    from: TripStatus,
    to: TripStatus,
) -> Result<Option<(Uuid, String)>, sqlx::Error> {
    let row: Option<(Uuid, Option<String>)> = sqlx::query_as(
        r#"
        UPDATE trips t
        SET status = $3
        FROM trip_batches tb
        WHERE t.id = tb.trip_id AND tb.batch_id = $1 AND t.status = $2
        RETURNING t.id, t.carrier_id
        "#,
    )
    .bind(batch_id)
    .bind(from.as_str())
    .bind(to.as_str())
    .fetch_optional(&mut **tx)
    .await?;

    Ok(row.map(|(id, carrier_id)| (id, carrier_id.unwrap_or_default())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            TripStatus::Pending,
            TripStatus::Assigned,
            TripStatus::InProgress,
            TripStatus::Completed,
            TripStatus::Reassigned,
            TripStatus::RequiresManualAssignment,
        ] {
            assert_eq!(status.as_str().parse::<TripStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_invalid_status_rejected() {
        assert!("DELIVERING".parse::<TripStatus>().is_err());
    }

    #[test]
    fn test_new_trip_constructors() {
        let assigned = NewTrip::assigned("c-1", 1200, (55.18, 30.20), (53.90, 27.56));
        assert_eq!(assigned.status, TripStatus::Assigned);
        assert!(assigned.assigned_at.is_some());
        assert_eq!(assigned.carrier_id.as_deref(), Some("c-1"));

        let pending = NewTrip::pending((55.18, 30.20), (53.90, 27.56));
        assert_eq!(pending.status, TripStatus::Pending);
        assert!(pending.carrier_id.is_none());
        assert_eq!(pending.assigned_distance_meters, 0);
    }
}
