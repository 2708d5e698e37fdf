//! Core domain types for the pairmm market maker.
//!
//! This crate provides fundamental types used throughout the trading system:
//! - `Price`, `Volume`: integer tick/lot quantities
//! - `Side`, `Lifespan`, `OrderId`: order enums and identifiers
//! - `Instrument`, `BookSnapshot`: the two-instrument market data model

pub mod error;
pub mod order;
pub mod price;
pub mod types;

pub use error::{CoreError, Result};
pub use order::{Lifespan, OrderId, OrderIdGenerator, Side};
pub use price::{Price, Volume};
pub use types::{BookSnapshot, BookState, Instrument, TOP_LEVEL_COUNT};
