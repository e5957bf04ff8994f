//! Typed payloads for the envelopes this service consumes and produces.

pub mod trip_confirmation_v1;

pub use trip_confirmation_v1::{ReassignCommandV1, TripAssignmentV1, TripRefV1};
