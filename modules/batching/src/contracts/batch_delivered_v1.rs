use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload of `events.batch_delivered_to_pvp` events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchDeliveredV1 {
    pub batch_id: String,

    /// True when the destination pickup point is a consolidation hub;
    /// triggers disband
    #[serde(default)]
    pub is_hub: bool,

    /// The pickup point the batch arrived at
    pub pvp_id: String,

    pub delivered_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_hub_defaults_to_false() {
        let payload: BatchDeliveredV1 = serde_json::from_value(json!({
            "batch_id": "b-1",
            "pvp_id": "pvp-1",
            "delivered_at": "2024-03-01T10:00:00Z"
        }))
        .unwrap();

        assert!(!payload.is_hub);
    }
}
