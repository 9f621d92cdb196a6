//! Client configuration: reconciliation policies, throttling and canvas size.
//!
//! Loadable from TOML; the binary layers CLI flags and env vars on top.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::reconcile::{OwnershipPolicy, TransitionPolicy};
use crate::throttle::ThrottleStrategy;

/// Narrowest and widest send windows accepted.
pub const MIN_WINDOW_MS: u64 = 25;
pub const MAX_WINDOW_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    pub strategy: ThrottleStrategy,
    pub window_ms: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            strategy: ThrottleStrategy::Coalesce,
            window_ms: 100,
        }
    }
}

impl ThrottleConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub transition: TransitionPolicy,
    pub ownership: OwnershipPolicy,
    pub throttle: ThrottleConfig,
    /// Logical canvas height in pixels; width is always twice this.
    pub canvas_height: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            transition: TransitionPolicy::Change,
            ownership: OwnershipPolicy::Server,
            throttle: ThrottleConfig::default(),
            canvas_height: 400,
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let w = self.throttle.window_ms;
        if !(MIN_WINDOW_MS..=MAX_WINDOW_MS).contains(&w) {
            return Err(ConfigError::InvalidWindow(w));
        }
        if self.canvas_height == 0 {
            return Err(ConfigError::InvalidCanvasHeight);
        }
        Ok(())
    }
}
