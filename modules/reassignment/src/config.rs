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
    pub command_topic: String,
    pub dlq_topic: String,
    pub confirmation_timeout_secs: u64,
    pub watchdog_tick_secs: u64,
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
            .unwrap_or_else(|_| "8082".to_string())
            .parse()
            .map_err(|_| "PORT must be a valid u16".to_string())?;

        let consume_topics = env::var("CONSUME_TOPICS")
            .unwrap_or_else(|_| {
                "trips.assigned,trips.confirmed,trips.declined,commands.trip.reassign"
                    .to_string()
            })
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        let command_topic =
            env::var("COMMAND_TOPIC").unwrap_or_else(|_| "commands.trip.reassign".to_string());

        let dlq_topic =
            env::var("DLQ_TOPIC").unwrap_or_else(|_| "dlq.reassignment".to_string());

        let confirmation_timeout_secs: u64 = env::var("CONFIRMATION_TIMEOUT_SECS")
            .unwrap_or_else(|_| "7200".to_string())
            .parse()
            .map_err(|_| "CONFIRMATION_TIMEOUT_SECS must be a valid integer".to_string())?;

        let watchdog_tick_secs: u64 = env::var("WATCHDOG_TICK_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .map_err(|_| "WATCHDOG_TICK_SECS must be a valid integer".to_string())?;

        Ok(Config {
            database_url,
            bus_type,
            nats_url,
            host,
            port,
            consume_topics,
            command_topic,
            dlq_topic,
            confirmation_timeout_secs,
            watchdog_tick_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[serial_test::serial]
    fn test_defaults() {
        std::env::set_var("DATABASE_URL", "postgres://localhost/reassignment");
        std::env::remove_var("CONSUME_TOPICS");
        std::env::remove_var("CONFIRMATION_TIMEOUT_SECS");

        let cfg = Config::from_env().unwrap();

        assert_eq!(cfg.port, 8082);
        assert_eq!(cfg.consume_topics.len(), 4);
        assert_eq!(cfg.command_topic, "commands.trip.reassign");
        assert_eq!(cfg.confirmation_timeout_secs, 7_200);
        assert_eq!(cfg.watchdog_tick_secs, 60);

        std::env::remove_var("DATABASE_URL");
    }
}
