use serde::{Deserialize, Serialize};

/// Payload of reassignment commands (`commands.trip.reassign`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReassignCommandV1 {
    pub original_trip_id: String,
    pub batch_id: String,
    #[serde(default)]
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_without_reason() {
        let payload: ReassignCommandV1 = serde_json::from_value(json!({
            "original_trip_id": "trip-1",
            "batch_id": "b-1"
        }))
        .unwrap();

        assert!(payload.reason.is_empty());
    }
}
