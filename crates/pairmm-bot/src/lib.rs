//! pairmm replay driver.
//!
//! Wires the quoting engine to a recorded session:
//! - Session events read as JSON lines and fed to the engine in order
//! - Outbound commands journaled as JSON lines
//! - Session summary and metrics reported at exit

pub mod app;
pub mod config;
pub mod error;
pub mod journal;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use journal::JournalSink;
