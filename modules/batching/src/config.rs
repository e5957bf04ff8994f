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
    pub produce_topic: String,
    pub dlq_topic: String,
    pub max_size: i64,
    pub flush_interval_secs: u64,
    pub direct_radius_meters: f64,
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
            .unwrap_or_else(|_| "8083".to_string())
            .parse()
            .map_err(|_| "PORT must be a valid u16".to_string())?;

        let consume_topics = env::var("CONSUME_TOPICS")
            .unwrap_or_else(|_| {
                "orders.created,events.reference_updated,events.batch_delivered_to_pvp"
                    .to_string()
            })
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        let produce_topic =
            env::var("PRODUCE_TOPIC").unwrap_or_else(|_| "batches.formed".to_string());

        let dlq_topic = env::var("DLQ_TOPIC").unwrap_or_else(|_| "dlq.batching".to_string());

        let max_size: i64 = env::var("BATCH_MAX_SIZE")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| "BATCH_MAX_SIZE must be a valid integer".to_string())?;

        let flush_interval_secs: u64 = env::var("BATCH_FLUSH_INTERVAL_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .map_err(|_| "BATCH_FLUSH_INTERVAL_SECS must be a valid integer".to_string())?;

        let direct_radius_meters: f64 = env::var("DIRECT_RADIUS_METERS")
            .unwrap_or_else(|_| "200000".to_string())
            .parse()
            .map_err(|_| "DIRECT_RADIUS_METERS must be a valid number".to_string())?;

        Ok(Config {
            database_url,
            bus_type,
            nats_url,
            host,
            port,
            consume_topics,
            produce_topic,
            dlq_topic,
            max_size,
            flush_interval_secs,
            direct_radius_meters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[serial_test::serial]
    fn test_defaults() {
        std::env::set_var("DATABASE_URL", "postgres://localhost/batching");
        std::env::remove_var("CONSUME_TOPICS");
        std::env::remove_var("BATCH_MAX_SIZE");

        let cfg = Config::from_env().unwrap();

        assert_eq!(cfg.port, 8083);
        assert_eq!(cfg.max_size, 10);
        assert_eq!(cfg.flush_interval_secs, 60);
        assert_eq!(cfg.direct_radius_meters, 200_000.0);
        assert_eq!(cfg.produce_topic, "batches.formed");
        assert_eq!(cfg.consume_topics.len(), 3);

        std::env::remove_var("DATABASE_URL");
    }

    #[test]
    #[serial_test::serial]
    fn test_missing_database_url_fails() {
        std::env::remove_var("DATABASE_URL");
        assert!(Config::from_env().is_err());
    }
}
