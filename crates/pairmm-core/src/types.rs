//! Common data types for market data.
//!
//! Contains the instrument tag, top-of-book snapshot, and the book state
//! used to decide whether a snapshot can anchor quotes.

use crate::{CoreError, Price, Result, Volume};
use serde::{Deserialize, Serialize};

/// Number of price levels carried by every venue snapshot.
pub const TOP_LEVEL_COUNT: usize = 5;

/// The two instruments of the market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Instrument {
    /// Quoted by the ladder.
    Tradeable,
    /// Anchors quote prices and receives hedges.
    Reference,
}

impl Instrument {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tradeable => "tradeable",
            Self::Reference => "reference",
        }
    }
}

impl std::fmt::Display for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Book state (null side detection).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookState {
    /// Both bid and ask are present and bid < ask.
    Valid,
    /// No bid side (best bid price is zero).
    NoBid,
    /// No ask side (best ask price is zero).
    NoAsk,
    /// Both sides missing.
    Empty,
    /// Best bid is at or above best ask.
    Crossed,
}

impl BookState {
    /// At least one side can anchor a ladder.
    pub fn is_quotable(&self) -> bool {
        !matches!(self, Self::Empty | Self::Crossed)
    }
}

impl std::fmt::Display for BookState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Valid => write!(f, "VALID"),
            Self::NoBid => write!(f, "NO_BID"),
            Self::NoAsk => write!(f, "NO_ASK"),
            Self::Empty => write!(f, "EMPTY"),
            Self::Crossed => write!(f, "CROSSED"),
        }
    }
}

/// Top-N order book (or trade tick) snapshot as delivered by the venue.
///
/// Levels are best first. Unused levels are zero-filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub instrument: Instrument,
    /// Venue sequence number, increasing per instrument.
    pub sequence: u64,
    pub ask_prices: [Price; TOP_LEVEL_COUNT],
    pub ask_volumes: [Volume; TOP_LEVEL_COUNT],
    pub bid_prices: [Price; TOP_LEVEL_COUNT],
    pub bid_volumes: [Volume; TOP_LEVEL_COUNT],
}

impl BookSnapshot {
    /// Snapshot with every level empty.
    pub fn empty(instrument: Instrument, sequence: u64) -> Self {
        Self {
            instrument,
            sequence,
            ask_prices: [Price::ZERO; TOP_LEVEL_COUNT],
            ask_volumes: [Volume::ZERO; TOP_LEVEL_COUNT],
            bid_prices: [Price::ZERO; TOP_LEVEL_COUNT],
            bid_volumes: [Volume::ZERO; TOP_LEVEL_COUNT],
        }
    }

    /// Snapshot carrying only a top level on each side.
    pub fn top(
        instrument: Instrument,
        sequence: u64,
        bid: (Price, Volume),
        ask: (Price, Volume),
    ) -> Self {
        let mut snapshot = Self::empty(instrument, sequence);
        snapshot.bid_prices[0] = bid.0;
        snapshot.bid_volumes[0] = bid.1;
        snapshot.ask_prices[0] = ask.0;
        snapshot.ask_volumes[0] = ask.1;
        snapshot
    }

    /// Best bid, or `None` when the bid side is empty.
    pub fn best_bid(&self) -> Option<Price> {
        let price = self.bid_prices[0];
        price.is_positive().then_some(price)
    }

    /// Best ask, or `None` when the ask side is empty.
    pub fn best_ask(&self) -> Option<Price> {
        let price = self.ask_prices[0];
        price.is_positive().then_some(price)
    }

    pub fn best_bid_volume(&self) -> Volume {
        self.bid_volumes[0]
    }

    pub fn best_ask_volume(&self) -> Volume {
        self.ask_volumes[0]
    }

    /// Get book state.
    pub fn state(&self) -> BookState {
        match (self.best_bid(), self.best_ask()) {
            (None, None) => BookState::Empty,
            (Some(_), None) => BookState::NoAsk,
            (None, Some(_)) => BookState::NoBid,
            (Some(bid), Some(ask)) if bid >= ask => BookState::Crossed,
            (Some(_), Some(_)) => BookState::Valid,
        }
    }

    /// Check level ordering: bids strictly descending, asks strictly
    /// ascending, and no populated level after an empty one.
    pub fn validate(&self) -> Result<()> {
        check_levels(&self.bid_prices, |prev, next| next < prev, "bid")?;
        check_levels(&self.ask_prices, |prev, next| next > prev, "ask")?;
        Ok(())
    }
}

fn check_levels(
    prices: &[Price; TOP_LEVEL_COUNT],
    ordered: impl Fn(Price, Price) -> bool,
    label: &str,
) -> Result<()> {
    let mut seen_empty = false;
    for (level, pair) in prices.windows(2).enumerate() {
        let (prev, next) = (pair[0], pair[1]);
        if prev.is_zero() {
            seen_empty = true;
        }
        if next.is_zero() {
            continue;
        }
        if seen_empty {
            return Err(CoreError::InvalidBook(format!(
                "{label} level {} populated after an empty level",
                level + 1
            )));
        }
        if !ordered(prev, next) {
            return Err(CoreError::InvalidBook(format!(
                "{label} levels out of order at level {}: {prev} then {next}",
                level + 1
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(bid: u64, ask: u64) -> BookSnapshot {
        BookSnapshot::top(
            Instrument::Reference,
            1,
            (Price::new(bid), Volume::new(100)),
            (Price::new(ask), Volume::new(100)),
        )
    }

    #[test]
    fn test_book_state() {
        assert_eq!(book(10_000, 10_100).state(), BookState::Valid);
        assert_eq!(book(0, 10_100).state(), BookState::NoBid);
        assert_eq!(book(10_000, 0).state(), BookState::NoAsk);
        assert_eq!(book(0, 0).state(), BookState::Empty);
        assert_eq!(book(10_100, 10_100).state(), BookState::Crossed);
        assert!(book(10_000, 10_100).state().is_quotable());
        assert!(book(0, 10_100).state().is_quotable());
        assert!(book(10_000, 0).state().is_quotable());
        assert!(!book(0, 0).state().is_quotable());
        assert!(!book(10_200, 10_100).state().is_quotable());
    }

    #[test]
    fn test_best_prices_zero_is_none() {
        let b = book(0, 10_100);
        assert_eq!(b.best_bid(), None);
        assert_eq!(b.best_ask(), Some(Price::new(10_100)));
        assert_eq!(b.best_ask_volume(), Volume::new(100));
    }

    #[test]
    fn test_validate_level_order() {
        let mut b = book(10_000, 10_100);
        b.bid_prices[1] = Price::new(9_900);
        b.ask_prices[1] = Price::new(10_200);
        assert!(b.validate().is_ok());

        b.bid_prices[2] = Price::new(9_950);
        assert!(b.validate().is_err());

        let mut gap = book(10_000, 10_100);
        gap.ask_prices[2] = Price::new(10_300);
        assert!(gap.validate().is_err());
    }

    #[test]
    fn test_snapshot_serde() {
        let b = book(10_000, 10_100);
        let json = serde_json::to_string(&b).unwrap();
        assert!(json.contains("\"instrument\":\"reference\""));
        let parsed: BookSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, b);
    }
}
