//! Typed payloads for the envelopes this service consumes and produces.
//!
//! Field names match the wire JSON exactly; do not add validation beyond
//! what the schema requires.

pub mod batch_delivered_v1;
pub mod batch_formed_v1;
pub mod order_created_v1;
pub mod reference_updated_v1;

pub use batch_delivered_v1::BatchDeliveredV1;
pub use batch_formed_v1::{BatchFormedV1, OrderContact};
pub use order_created_v1::OrderCreatedV1;
pub use reference_updated_v1::{PickupPointRef, ReferenceUpdatedV1, WarehouseRef};
