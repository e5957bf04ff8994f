use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload of `trips.assigned` events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripAssignedV1 {
    pub trip_id: String,
    pub batch_id: String,
    pub carrier_id: String,
    pub origin_lat: f64,
    pub origin_lng: f64,
    pub destination_lat: f64,
    pub destination_lng: f64,
    pub assigned_distance_meters: i32,
    pub assigned_at: DateTime<Utc>,
}

/// Payload of `trips.started` events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripStartedV1 {
    pub trip_id: String,
    pub batch_id: String,
    pub carrier_id: String,
    pub started_at: DateTime<Utc>,
}

/// Payload of `trips.completed` events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripCompletedV1 {
    pub trip_id: String,
    pub batch_id: String,
    pub carrier_id: String,
    pub completed_at: DateTime<Utc>,
}

/// Payload of `alerts.trip_requires_manual_assignment` alerts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripRequiresManualV1 {
    pub trip_id: String,
    pub reason: String,
}
