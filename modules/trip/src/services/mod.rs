pub mod assignment_service;
pub mod carrier_service;
pub mod lifecycle_service;

use crate::config::Config;

/// A pending trip is retried this many times before it is flagged for
/// manual assignment; the cap is checked after each increment.
pub const MAX_ASSIGNMENT_ATTEMPTS: i32 = 10;

/// Trip knobs shared by the handlers and the pending-assignment loop
#[derive(Debug, Clone)]
pub struct TripSettings {
    pub assigned_topic: String,
    pub started_topic: String,
    pub completed_topic: String,
    pub alerts_topic: String,
    pub carrier_radius_meters: f64,
    pub pending_retry: chrono::Duration,
}

impl TripSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            assigned_topic: cfg.assigned_topic.clone(),
            started_topic: cfg.started_topic.clone(),
            completed_topic: cfg.completed_topic.clone(),
            alerts_topic: cfg.alerts_topic.clone(),
            carrier_radius_meters: cfg.carrier_radius_meters,
            pending_retry: chrono::Duration::seconds(cfg.pending_retry_secs as i64),
        }
    }
}
