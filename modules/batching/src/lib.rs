pub mod config;
pub mod consumer;
pub mod contracts;
pub mod geo;
pub mod groups;
pub mod health;
pub mod repos;
pub mod services;

pub use consumer::BatchingHandler;
pub use services::flush_service::run_time_flush_loop;
