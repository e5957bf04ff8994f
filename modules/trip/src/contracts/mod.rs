//! Typed payloads for the envelopes this service consumes and produces.

pub mod batch_formed_v1;
pub mod batch_lifecycle_v1;
pub mod carrier_location_v1;
pub mod carrier_reference_v1;
pub mod reassign_command_v1;
pub mod trip_events_v1;

pub use batch_formed_v1::BatchFormedV1;
pub use batch_lifecycle_v1::BatchLifecycleV1;
pub use carrier_location_v1::CarrierLocationV1;
pub use carrier_reference_v1::{CarrierRef, CarrierReferenceV1};
pub use reassign_command_v1::ReassignCommandV1;
pub use trip_events_v1::{TripAssignedV1, TripCompletedV1, TripRequiresManualV1, TripStartedV1};
