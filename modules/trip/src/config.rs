use std::env;

/// Application configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bus_type: String,
    pub nats_url: String,
    pub host: String,
    pub port: u16,
    pub consume_topics: Vec<String>,
    pub assigned_topic: String,
    pub started_topic: String,
    pub completed_topic: String,
    pub alerts_topic: String,
    pub dlq_topic: String,
    pub carrier_radius_meters: f64,
    pub pending_retry_secs: u64,
    pub pending_tick_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;

        let bus_type = env::var("BUS_TYPE").unwrap_or_else(|_| "inmemory".to_string());

        let nats_url =
            env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string());

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "8084".to_string())
            .parse()
            .map_err(|_| "PORT must be a valid u16".to_string())?;

        let consume_topics = env::var("CONSUME_TOPICS")
            .unwrap_or_else(|_| {
                [
                    "batches.formed",
                    "events.batch_picked_up",
                    "events.batch_delivered_to_pvp",
                    "events.carrier_location",
                    "events.reference_updated",
                    "commands.trip.reassign",
                ]
                .join(",")
            })
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        let assigned_topic =
            env::var("ASSIGNED_TOPIC").unwrap_or_else(|_| "trips.assigned".to_string());
        let started_topic =
            env::var("STARTED_TOPIC").unwrap_or_else(|_| "trips.started".to_string());
        let completed_topic =
            env::var("COMPLETED_TOPIC").unwrap_or_else(|_| "trips.completed".to_string());
        let alerts_topic = env::var("ALERTS_TOPIC")
            .unwrap_or_else(|_| "alerts.trip_requires_manual_assignment".to_string());

        let dlq_topic = env::var("DLQ_TOPIC").unwrap_or_else(|_| "dlq.trip".to_string());

        let carrier_radius_meters: f64 = env::var("CARRIER_RADIUS_METERS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .map_err(|_| "CARRIER_RADIUS_METERS must be a valid number".to_string())?;

        let pending_retry_secs: u64 = env::var("PENDING_RETRY_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .map_err(|_| "PENDING_RETRY_SECS must be a valid integer".to_string())?;

        let pending_tick_secs: u64 = env::var("PENDING_TICK_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .map_err(|_| "PENDING_TICK_SECS must be a valid integer".to_string())?;

        Ok(Config {
            database_url,
            bus_type,
            nats_url,
            host,
            port,
            consume_topics,
            assigned_topic,
            started_topic,
            completed_topic,
            alerts_topic,
            dlq_topic,
            carrier_radius_meters,
            pending_retry_secs,
            pending_tick_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[serial_test::serial]
    fn test_defaults() {
        std::env::set_var("DATABASE_URL", "postgres://localhost/trip");
        std::env::remove_var("CONSUME_TOPICS");
        std::env::remove_var("CARRIER_RADIUS_METERS");

        let cfg = Config::from_env().unwrap();

        assert_eq!(cfg.port, 8084);
        assert_eq!(cfg.consume_topics.len(), 6);
        assert_eq!(cfg.carrier_radius_meters, 5_000.0);
        assert_eq!(cfg.pending_retry_secs, 300);
        assert_eq!(cfg.assigned_topic, "trips.assigned");
        assert_eq!(cfg.alerts_topic, "alerts.trip_requires_manual_assignment");

        std::env::remove_var("DATABASE_URL");
    }
}
