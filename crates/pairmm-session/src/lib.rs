//! Session boundary for the pairmm market maker.
//!
//! Everything the quoting engine exchanges with the venue session:
//! - `SessionEvent`: inbound market data and execution callbacks
//! - `Command`, `CommandSink`: outbound order commands and their transport
//! - `MessageGovernor`: sliding-window outbound message budget
//! - `Clock`: time source for the governor (system or manual)

pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod rate_governor;

pub use clock::{Clock, ManualClock, SystemClock};
pub use command::{Command, CommandSink, RecordingSink, SendResult};
pub use error::{SessionError, SessionResult};
pub use event::SessionEvent;
pub use rate_governor::{MessageGovernor, ThrottleConfig};
