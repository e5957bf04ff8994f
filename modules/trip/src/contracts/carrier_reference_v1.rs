use serde::{Deserialize, Serialize};

/// Payload of `events.reference_updated`, as consumed by trip assignment.
///
/// Only carrier activity updates matter here; warehouse and pickup-point
/// updates are projected by the batching service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CarrierReferenceV1 {
    pub update_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carrier: Option<CarrierRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CarrierRef {
    pub id: String,
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_carrier_update() {
        let payload: CarrierReferenceV1 = serde_json::from_value(json!({
            "update_type": "carrier",
            "carrier": {"id": "c-1", "is_active": false},
            "reason": "shift_ended"
        }))
        .unwrap();

        assert_eq!(payload.update_type, "carrier");
        assert!(!payload.carrier.unwrap().is_active);
    }
}
