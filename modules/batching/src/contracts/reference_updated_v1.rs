use serde::{Deserialize, Serialize};

/// Payload of `events.reference_updated` events, as consumed by batching.
///
/// Only warehouse and pickup-point updates matter here; other update types
/// are skipped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReferenceUpdatedV1 {
    pub update_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<WarehouseRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_point: Option<PickupPointRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WarehouseRef {
    pub warehouse_id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PickupPointRef {
    pub pvp_id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub is_hub: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_pickup_point_update() {
        let payload: ReferenceUpdatedV1 = serde_json::from_value(json!({
            "update_type": "pickup_point",
            "pickup_point": {
                "pvp_id": "hub-1",
                "name": "Minsk Hub",
                "latitude": 53.9,
                "longitude": 27.56,
                "is_hub": true
            }
        }))
        .unwrap();

        assert_eq!(payload.update_type, "pickup_point");
        assert!(payload.warehouse.is_none());
        assert!(payload.pickup_point.unwrap().is_hub);
    }

    #[test]
    fn test_decode_unrelated_update_type() {
        let payload: ReferenceUpdatedV1 = serde_json::from_value(json!({
            "update_type": "carrier"
        }))
        .unwrap();

        assert!(payload.warehouse.is_none());
        assert!(payload.pickup_point.is_none());
    }
}
