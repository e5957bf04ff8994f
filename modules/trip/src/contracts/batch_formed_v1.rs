use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload of `batches.formed` events, as consumed by trip assignment.
///
/// The contact snapshots the batching service attaches are irrelevant here
/// and ignored on decode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchFormedV1 {
    pub batch_id: String,
    pub origin_type: String,
    pub origin_id: String,
    pub origin_lat: f64,
    pub origin_lng: f64,
    pub destination_id: String,
    pub destination_lat: f64,
    pub destination_lng: f64,
    #[serde(default)]
    pub is_hub_destination: bool,
    #[serde(default)]
    pub order_ids: Vec<String>,
    pub formed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_ignores_contacts() {
        let payload: BatchFormedV1 = serde_json::from_value(json!({
            "batch_id": "b-1",
            "origin_type": "warehouse",
            "origin_id": "wh-1",
            "origin_lat": 55.18,
            "origin_lng": 30.2,
            "destination_type": "pvp",
            "destination_id": "hub-1",
            "destination_lat": 53.9,
            "destination_lng": 27.56,
            "is_hub_destination": true,
            "order_ids": ["o1", "o2"],
            "order_contacts": [{"order_id": "o1", "customer_phone": "", "customer_email": ""}],
            "formed_at": "2024-03-01T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(payload.batch_id, "b-1");
        assert_eq!(payload.order_ids.len(), 2);
    }
}
