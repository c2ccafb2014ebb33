pub mod aggregator;
pub mod app;
pub mod broker;
pub mod config;
pub mod eia;
pub mod error;
pub mod fuel;
pub mod logging;
pub mod metrics;
pub mod notifier;
pub mod publisher;
pub mod redis_client;
pub mod routing;
pub mod summarizer;
pub mod types;
