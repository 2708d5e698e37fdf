//! Prometheus metrics and structured logging for pairmm.
//!
//! Provides observability for the quoting engine:
//! - Prometheus metrics for commands, cancels, budget, position and hedges
//! - Structured logging with tracing (JSON in production)

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, init_logging_with};
pub use metrics::Metrics;
