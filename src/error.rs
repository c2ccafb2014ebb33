use thiserror::Error;

/// Fatal problems with the static classification tables. Aborts a whole run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("fuel type code {0:?} has no energy classification")]
    UnknownFuelType(String),
}

/// A single region could not be summarised; the rest of the run continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegionError {
    #[error("region {region_id} reported zero total energy for {period}")]
    ZeroTotalEnergy { region_id: String, period: String },
    #[error("region {region_id} reported a negative or non-finite value for {period}")]
    InvalidEnergy { region_id: String, period: String },
}

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker connection failed: {0}")]
    Connection(String),
    #[error("broker command failed: {0}")]
    Command(String),
    #[error("delivery timed out")]
    Timeout,
    #[error("broker connection already closed")]
    Closed,
}

impl From<redis::RedisError> for BrokerError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
            Self::Connection(err.to_string())
        } else {
            Self::Command(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("payload is not a valid notification: {0}")]
    Json(#[from] serde_json::Error),
    #[error("pct_clean {0:?} is not a decimal fraction")]
    InvalidFraction(String),
    #[error("period {0:?} is not in YYYY-MM-DDTHH form")]
    InvalidPeriod(String),
}

#[derive(Debug, Error)]
pub enum EiaError {
    #[error("EIA request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("EIA API returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("EIA record has unparseable value {0:?}")]
    InvalidValue(String),
    #[error("EIA record has unparseable period {0:?}")]
    InvalidPeriod(String),
}

/// Reasons an aggregation run is aborted.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Fetch(#[from] EiaError),
    #[error("failed to encode notification: {0}")]
    Encode(#[from] serde_json::Error),
}
