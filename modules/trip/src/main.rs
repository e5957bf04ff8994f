use axum::{routing::get, Router};
use event_bus::consumer_retry::{retry_with_backoff, RetryConfig};
use event_bus::{EventBus, InMemoryBus, NatsBus};
use messaging::consumer::{spawn_consumer, DeadLetterSink};
use messaging::publisher::{run_publisher, PublisherConfig};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use trip_rs::config::Config;
use trip_rs::health::{healthz, readyz};
use trip_rs::services::TripSettings;
use trip_rs::{run_pending_assignment_loop, TripHandler};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    tracing::info!("Starting trip service...");

    let config = Config::from_env().expect("Failed to load configuration from environment");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    sqlx::migrate!("./db/migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    let bus: Arc<dyn EventBus> = match config.bus_type.to_lowercase().as_str() {
        "nats" => {
            tracing::info!("Connecting to NATS at {}", config.nats_url);
            let nats_url = config.nats_url.clone();
            let client = retry_with_backoff(
                || async_nats::connect(nats_url.clone()),
                &RetryConfig::default(),
                "nats_connect",
            )
            .await
            .expect("Failed to connect to NATS");
            Arc::new(NatsBus::new(client))
        }
        _ => {
            tracing::info!("Using in-memory event bus");
            Arc::new(InMemoryBus::new())
        }
    };

    let settings = Arc::new(TripSettings::from_config(&config));

    tokio::spawn(run_publisher(
        pool.clone(),
        bus.clone(),
        PublisherConfig::default(),
    ));

    let handler = Arc::new(TripHandler::new(pool.clone(), settings.clone()));
    let dead_letters = DeadLetterSink::new(pool.clone(), config.dlq_topic.clone());

    for topic in &config.consume_topics {
        spawn_consumer(
            bus.clone(),
            topic.clone(),
            handler.clone(),
            dead_letters.clone(),
            RetryConfig::default(),
        );
    }

    tokio::spawn(run_pending_assignment_loop(
        pool.clone(),
        settings.clone(),
        std::time::Duration::from_secs(config.pending_tick_secs),
    ));

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(pool.clone())
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        );

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Invalid HOST:PORT");

    tracing::info!("Trip service listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server failed to start");

    tracing::info!("Trip service stopped");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, draining...");
}
