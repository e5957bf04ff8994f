use serde::{Deserialize, Serialize};

/// Payload of `events.batch_picked_up` and `events.batch_delivered_to_pvp`,
/// as consumed by the trip lifecycle. Only the batch id matters; the rest of
/// the payload varies by event and is ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchLifecycleV1 {
    pub batch_id: String,
}
