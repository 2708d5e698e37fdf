//! Application configuration.

use crate::error::{AppError, AppResult};
use pairmm_mm::MakerConfig;
use pairmm_session::ThrottleConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Quoting, skew, limit and hedge parameters.
    #[serde(default)]
    pub maker: MakerConfig,
    /// Venue message throttle.
    #[serde(default)]
    pub throttle: ThrottleConfig,
    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Telemetry configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log filter directives, overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info,pairmm=debug".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Load from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load from `path` if it exists, otherwise defaults.
    ///
    /// Returns whether the file was found so the caller can warn once
    /// logging is up.
    pub fn load_or_default(path: impl AsRef<Path>) -> AppResult<(Self, bool)> {
        if path.as_ref().exists() {
            Ok((Self::from_file(path)?, true))
        } else {
            Ok((Self::default(), false))
        }
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        self.maker
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;
        self.throttle.validate()?;
        Ok(())
    }
}
