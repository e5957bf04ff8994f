//! # Event Envelope
//!
//! Canonical wire format for every event published or consumed by the
//! delivery services:
//!
//! - `event_id`: globally unique identifier, the idempotency key
//! - `event_type`: dot-namespaced type (e.g. `batches.formed`)
//! - `occurred_at`: UTC timestamp of the originating state change
//! - `correlation_id`: groups related events (trip, batch, order)
//! - `data`: event-specific payload, decoded lazily by handlers
//!
//! Unknown top-level fields are captured in a flattened map so a service
//! that re-emits an envelope it does not fully understand preserves them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Errors decoding or encoding an envelope
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("envelope codec error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Standard event envelope wrapping all cross-service messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event identifier (idempotency key)
    pub event_id: Uuid,

    /// Dot-namespaced event type
    pub event_type: String,

    /// UTC timestamp when the event was generated
    pub occurred_at: DateTime<Utc>,

    /// Links related events in a business flow
    pub correlation_id: String,

    /// Event-specific payload; handlers decode it lazily by `event_type`
    pub data: serde_json::Value,

    /// Unknown fields, preserved verbatim on re-emit
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl EventEnvelope {
    /// Create a new envelope with a generated event_id and current timestamp
    pub fn new(
        event_type: impl Into<String>,
        correlation_id: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: event_type.into(),
            occurred_at: Utc::now(),
            correlation_id: correlation_id.into(),
            data,
            extra: serde_json::Map::new(),
        }
    }

    /// Create an envelope with an explicit event_id (useful for testing)
    pub fn with_event_id(
        event_id: Uuid,
        event_type: impl Into<String>,
        correlation_id: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            event_id,
            event_type: event_type.into(),
            occurred_at: Utc::now(),
            correlation_id: correlation_id.into(),
            data,
            extra: serde_json::Map::new(),
        }
    }

    /// Decode an envelope from raw broker bytes
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Encode the envelope to wire bytes
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode the `data` payload into a typed contract
    pub fn decode_data<T: serde::de::DeserializeOwned>(&self) -> Result<T, CodecError> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_round_trip() {
        let envelope = EventEnvelope::new(
            "batches.formed",
            "batch-123",
            json!({"batch_id": "batch-123", "order_ids": ["o1", "o2"]}),
        );

        let bytes = envelope.encode().unwrap();
        let decoded = EventEnvelope::decode(&bytes).unwrap();

        assert_eq!(decoded.event_id, envelope.event_id);
        assert_eq!(decoded.event_type, "batches.formed");
        assert_eq!(decoded.correlation_id, "batch-123");
        assert_eq!(decoded.data["order_ids"][1], "o2");
    }

    #[test]
    fn test_unknown_fields_preserved_on_reemit() {
        let wire = json!({
            "event_id": "550e8400-e29b-41d4-a716-446655440000",
            "event_type": "commands.trip.reassign",
            "occurred_at": "2024-03-01T12:00:00Z",
            "correlation_id": "trip-9",
            "data": {"original_trip_id": "trip-9"},
            "trace_id": "abc-123",
            "schema_rev": 4
        });

        let decoded = EventEnvelope::decode(wire.to_string().as_bytes()).unwrap();
        assert_eq!(decoded.extra["trace_id"], "abc-123");
        assert_eq!(decoded.extra["schema_rev"], 4);

        let reemitted: serde_json::Value =
            serde_json::from_slice(&decoded.encode().unwrap()).unwrap();
        assert_eq!(reemitted["trace_id"], "abc-123");
        assert_eq!(reemitted["schema_rev"], 4);
    }

    #[test]
    fn test_decode_missing_required_field_fails() {
        let wire = json!({
            "event_type": "orders.created",
            "occurred_at": "2024-03-01T12:00:00Z",
            "correlation_id": "order-1",
            "data": {}
        });

        assert!(EventEnvelope::decode(wire.to_string().as_bytes()).is_err());
    }

    #[test]
    fn test_decode_data_into_contract() {
        #[derive(Debug, serde::Deserialize)]
        struct Payload {
            batch_id: String,
        }

        let envelope =
            EventEnvelope::new("batches.formed", "b-1", json!({"batch_id": "b-1"}));
        let payload: Payload = envelope.decode_data().unwrap();
        assert_eq!(payload.batch_id, "b-1");
    }
}
