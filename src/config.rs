use std::time::Duration;

use serde::Deserialize;
use uuid::Uuid;

use crate::routing::CLEAN_TOPIC;

/// Field names match the upper-cased environment variables (`REDIS_URL`, ...).
#[derive(Debug, Clone, Deserialize)]
struct RawSettings {
    redis_url: String,
    eia_api_key: Option<String>,
    #[serde(default = "default_eia_url")]
    eia_url: String,
    #[serde(default = "default_eia_page_length")]
    eia_page_length: usize,
    #[serde(default = "default_eia_timeout")]
    eia_timeout_sec: u64,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_poll_timeout")]
    poll_timeout_sec: u64,
    #[serde(default = "default_flush_timeout")]
    flush_timeout_sec: u64,
    #[serde(default = "default_notify_topic")]
    notify_topic: String,
    consumer_id: Option<String>,
    #[serde(default = "default_prometheus_port")]
    prometheus_port: u16,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub redis_url: String,
    pub eia_api_key: Option<String>,
    pub eia_url: String,
    pub eia_page_length: usize,
    pub eia_timeout: Duration,
    pub log_level: String,
    pub poll_timeout: Duration,
    pub flush_timeout: Duration,
    pub notify_topic: String,
    pub consumer_id: String,
    pub prometheus_port: u16,
}

impl Settings {
    pub fn from_env() -> Result<Self, envy::Error> {
        let raw: RawSettings = envy::from_env()?;
        Ok(Self::from_raw(raw))
    }

    fn from_raw(raw: RawSettings) -> Self {
        let consumer_id = raw
            .consumer_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("notifier-{}", Uuid::new_v4()))
            .to_lowercase();

        Self {
            redis_url: raw.redis_url,
            eia_api_key: raw.eia_api_key.filter(|s| !s.trim().is_empty()),
            eia_url: raw.eia_url,
            eia_page_length: raw.eia_page_length.clamp(1, 5000),
            eia_timeout: Duration::from_secs(raw.eia_timeout_sec.max(1)),
            log_level: raw.log_level.to_ascii_lowercase(),
            poll_timeout: Duration::from_secs(raw.poll_timeout_sec.max(1)),
            flush_timeout: Duration::from_secs(raw.flush_timeout_sec.max(1)),
            notify_topic: raw.notify_topic.trim().to_string(),
            consumer_id,
            prometheus_port: raw.prometheus_port,
        }
    }
}

fn default_eia_url() -> String {
    "https://api.eia.gov/v2/electricity/rto/fuel-type-data/data/".to_string()
}

fn default_eia_page_length() -> usize {
    5000
}

fn default_eia_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_poll_timeout() -> u64 {
    1
}

fn default_flush_timeout() -> u64 {
    30
}

fn default_notify_topic() -> String {
    CLEAN_TOPIC.to_string()
}

fn default_prometheus_port() -> u16 {
    8001
}
