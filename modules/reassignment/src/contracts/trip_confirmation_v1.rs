use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload of assignment events, as consumed by the watchdog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripAssignmentV1 {
    pub trip_id: String,
    pub batch_id: String,
    pub carrier_id: String,
    pub assigned_at: DateTime<Utc>,
}

/// Payload of confirmation and rejection events; only the trip id matters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripRefV1 {
    pub trip_id: String,
}

/// Payload of the reassignment command the watchdog emits on timeout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReassignCommandV1 {
    pub original_trip_id: String,
    pub batch_id: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_assignment() {
        let payload: TripAssignmentV1 = serde_json::from_value(json!({
            "trip_id": "trip-1",
            "batch_id": "b-1",
            "carrier_id": "c-1",
            "origin_lat": 55.18,
            "origin_lng": 30.2,
            "assigned_distance_meters": 1200,
            "assigned_at": "2024-03-01T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(payload.trip_id, "trip-1");
        assert_eq!(payload.carrier_id, "c-1");
    }
}
