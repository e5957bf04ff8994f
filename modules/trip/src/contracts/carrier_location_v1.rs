use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload of `events.carrier_location` telemetry.
///
/// Two data shapes coexist upstream: the canonical
/// `latitude`/`longitude`/`timestamp` and the legacy
/// `lat`/`lng`/`updated_at`. Both decode; the canonical names are emitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CarrierLocationV1 {
    pub carrier_id: String,

    #[serde(alias = "lat")]
    pub latitude: f64,

    #[serde(alias = "lng")]
    pub longitude: f64,

    #[serde(alias = "updated_at")]
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_canonical_shape() {
        let payload: CarrierLocationV1 = serde_json::from_value(json!({
            "carrier_id": "c-1",
            "latitude": 53.9,
            "longitude": 27.56,
            "timestamp": "2024-03-01T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(payload.carrier_id, "c-1");
        assert_eq!(payload.latitude, 53.9);
    }

    #[test]
    fn test_decode_legacy_shape() {
        let payload: CarrierLocationV1 = serde_json::from_value(json!({
            "carrier_id": "c-2",
            "lat": 53.9,
            "lng": 27.56,
            "updated_at": "2024-03-01T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(payload.carrier_id, "c-2");
        assert_eq!(payload.longitude, 27.56);
    }

    #[test]
    fn test_emits_canonical_names() {
        let payload = CarrierLocationV1 {
            carrier_id: "c-3".into(),
            latitude: 53.9,
            longitude: 27.56,
            timestamp: "2024-03-01T10:00:00Z".parse().unwrap(),
        };

        let value = serde_json::to_value(&payload).unwrap();
        assert!(value.get("latitude").is_some());
        assert!(value.get("lat").is_none());
    }
}
