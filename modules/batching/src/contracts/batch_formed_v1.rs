use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload of `batches.formed` events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchFormedV1 {
    pub batch_id: String,

    /// `warehouse` for first-mile batches, `pvp` for hub-disbanded batches
    pub origin_type: String,
    pub origin_id: String,
    pub origin_lat: f64,
    pub origin_lng: f64,

    pub destination_type: String,
    pub destination_id: String,
    pub destination_lat: f64,
    pub destination_lng: f64,

    /// True when the batch is routed through a consolidation hub
    pub is_hub_destination: bool,

    pub order_ids: Vec<String>,

    /// Contact snapshots; absent on hub-disbanded batches
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_contacts: Vec<OrderContact>,

    pub formed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderContact {
    pub order_id: String,
    pub customer_phone: String,
    pub customer_email: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trip_without_contacts() {
        let payload = BatchFormedV1 {
            batch_id: "b-1".into(),
            origin_type: "pvp".into(),
            origin_id: "hub-1".into(),
            origin_lat: 53.9,
            origin_lng: 27.56,
            destination_type: "pvp".into(),
            destination_id: "pvp-7".into(),
            destination_lat: 52.1,
            destination_lng: 23.7,
            is_hub_destination: false,
            order_ids: vec!["o1".into(), "o2".into()],
            order_contacts: vec![],
            formed_at: "2024-03-01T10:00:00Z".parse().unwrap(),
        };

        let value = serde_json::to_value(&payload).unwrap();
        assert!(value.get("order_contacts").is_none());

        let decoded: BatchFormedV1 = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_decode_with_contacts() {
        let payload: BatchFormedV1 = serde_json::from_value(json!({
            "batch_id": "b-2",
            "origin_type": "warehouse",
            "origin_id": "wh-1",
            "origin_lat": 55.18,
            "origin_lng": 30.2,
            "destination_type": "pvp",
            "destination_id": "hub-1",
            "destination_lat": 53.9,
            "destination_lng": 27.56,
            "is_hub_destination": true,
            "order_ids": ["o1"],
            "order_contacts": [
                {"order_id": "o1", "customer_phone": "+375", "customer_email": "x@y.z"}
            ],
            "formed_at": "2024-03-01T10:00:00Z"
        }))
        .unwrap();

        assert!(payload.is_hub_destination);
        assert_eq!(payload.order_contacts.len(), 1);
    }
}
