pub mod disband_service;
pub mod flush_service;

use crate::config::Config;

/// Batching knobs shared by the handlers and the periodic flush loop
#[derive(Debug, Clone)]
pub struct BatchingSettings {
    pub out_topic: String,
    pub max_size: i64,
    pub flush_interval: chrono::Duration,
    pub direct_radius_meters: f64,
}

impl BatchingSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            out_topic: cfg.produce_topic.clone(),
            max_size: cfg.max_size,
            flush_interval: chrono::Duration::seconds(cfg.flush_interval_secs as i64),
            direct_radius_meters: cfg.direct_radius_meters,
        }
    }
}
