//! Market state per instrument.
//!
//! Keeps the latest order book and trade ticks for each instrument and drops
//! snapshots that arrive out of sequence.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use pairmm_core::{BookSnapshot, Instrument};
use pairmm_telemetry::Metrics;
use tracing::debug;

/// Result of offering a snapshot to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookUpdate {
    Applied,
    /// Sequence number not newer than the cached snapshot.
    Stale { cached: u64, received: u64 },
}

/// Per-instrument state container.
#[derive(Debug, Default)]
pub struct InstrumentState {
    pub book: Option<BookSnapshot>,
    pub trades: Option<BookSnapshot>,
    pub last_update: Option<DateTime<Utc>>,
    pub stale_drops: u64,
}

/// Latest market data for both instruments.
#[derive(Debug, Default)]
pub struct MarketState {
    entries: HashMap<Instrument, InstrumentState>,
}

impl MarketState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache an order book snapshot if it is newer than the cached one.
    pub fn update_book(&mut self, snapshot: BookSnapshot) -> BookUpdate {
        let instrument = snapshot.instrument;
        let entry = self.entries.entry(instrument).or_default();
        if let Some(cached) = &entry.book {
            if snapshot.sequence <= cached.sequence {
                let update = BookUpdate::Stale {
                    cached: cached.sequence,
                    received: snapshot.sequence,
                };
                entry.stale_drops += 1;
                Metrics::stale_book(instrument.as_str());
                debug!(
                    instrument = %instrument,
                    cached = cached.sequence,
                    received = snapshot.sequence,
                    "Dropping out-of-sequence book"
                );
                return update;
            }
        }
        entry.book = Some(snapshot);
        entry.last_update = Some(Utc::now());
        BookUpdate::Applied
    }

    /// Cache trade ticks if they are newer than the cached ones.
    pub fn update_trades(&mut self, ticks: BookSnapshot) -> BookUpdate {
        let entry = self.entries.entry(ticks.instrument).or_default();
        if let Some(cached) = &entry.trades {
            if ticks.sequence <= cached.sequence {
                return BookUpdate::Stale {
                    cached: cached.sequence,
                    received: ticks.sequence,
                };
            }
        }
        entry.trades = Some(ticks);
        entry.last_update = Some(Utc::now());
        BookUpdate::Applied
    }

    pub fn book(&self, instrument: Instrument) -> Option<&BookSnapshot> {
        self.entries.get(&instrument).and_then(|e| e.book.as_ref())
    }

    pub fn trades(&self, instrument: Instrument) -> Option<&BookSnapshot> {
        self.entries.get(&instrument).and_then(|e| e.trades.as_ref())
    }

    pub fn get(&self, instrument: Instrument) -> Option<&InstrumentState> {
        self.entries.get(&instrument)
    }

    /// Both books, when they carry the same sequence number.
    pub fn synchronized_books(&self) -> Option<(&BookSnapshot, &BookSnapshot)> {
        let tradeable = self.book(Instrument::Tradeable)?;
        let reference = self.book(Instrument::Reference)?;
        (tradeable.sequence == reference.sequence).then_some((tradeable, reference))
    }
}
