//! Error types for the wire boundary and configuration loading.

use thiserror::Error;

/// Reasons an inbound snapshot is rejected before it reaches the merge logic.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed snapshot json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("token {index} has a non-finite coordinate")]
    NonFiniteCoordinate { index: usize },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("throttle window {0}ms outside the supported 25..=1000ms range")]
    InvalidWindow(u64),

    #[error("canvas height must be positive")]
    InvalidCanvasHeight,

    #[error("unknown {field} value: {value:?}")]
    UnknownValue { field: &'static str, value: String },
}
