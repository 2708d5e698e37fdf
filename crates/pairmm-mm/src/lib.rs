//! Two-instrument ladder market making.
//!
//! Quotes a ladder of resting orders on the tradeable instrument around the
//! reference instrument's best prices, skews by inventory, and hedges every
//! fill on the reference instrument.
//!
//! Components:
//! - `config`: maker parameters and hedge prices
//! - `registry`: the strategy's own resting orders, per side
//! - `quote_engine`: inventory skew and ladder targets (pure)
//! - `inventory`: position, fill de-duplication, fees and hedge ledger
//! - `market_state`: latest book per instrument with sequence checks
//! - `quote_manager`: the engine context driven by session events

pub mod config;
pub mod error;
pub mod inventory;
pub mod market_state;
pub mod quote_engine;
pub mod quote_manager;
pub mod registry;

pub use config::MakerConfig;
pub use error::{MakerError, MakerResult};
pub use inventory::{FillDelta, FillUpdate, HedgeOutcome, HedgeRecord, InventoryManager};
pub use market_state::{BookUpdate, InstrumentState, MarketState};
pub use quote_engine::{compute_ladder, side_headroom, skew_ticks, LadderTarget};
pub use quote_manager::{QuoteManager, SessionSummary};
pub use registry::{Order, OrderRegistry, RegistryError, SideRegistry};
