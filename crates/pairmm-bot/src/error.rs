//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session error: {0}")]
    Session(#[from] pairmm_session::SessionError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] pairmm_telemetry::TelemetryError),

    #[error("Journal error: {0}")]
    Journal(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
