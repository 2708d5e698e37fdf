//! Session error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to decode session event: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid throttle configuration: {0}")]
    InvalidConfig(String),
}

pub type SessionResult<T> = Result<T, SessionError>;
