//! Quote price calculation engine.
//!
//! Computes ladder prices from:
//! - Reference instrument best bid/ask (anchor)
//! - Fixed additional spread away from the market
//! - Inventory skew (shift both sides to reduce exposure)
//!
//! Everything here is pure; the quote manager decides what to send.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use pairmm_core::{Price, Side};

use crate::config::MakerConfig;

/// Target ladder for one reference book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LadderTarget {
    /// Inventory skew applied, in ticks (negative when long).
    pub skew_ticks: i64,
    /// Bid levels (descending, front first). Empty when the side is not quoted.
    pub bids: Vec<Price>,
    /// Ask levels (ascending, front first). Empty when the side is not quoted.
    pub asks: Vec<Price>,
    front_bid: Option<Price>,
    front_ask: Option<Price>,
    /// `depth * tick`: distance from the front to the first price beyond the ladder.
    band_width: i64,
}

impl LadderTarget {
    pub fn front(&self, side: Side) -> Option<Price> {
        match side {
            Side::Buy => self.front_bid,
            Side::Sell => self.front_ask,
        }
    }

    pub fn levels(&self, side: Side) -> &[Price] {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    /// True if a resting order at `price` no longer belongs to the ladder:
    /// closer to the market than the front, or beyond the deepest level.
    ///
    /// Always false on a side that is not being quoted.
    pub fn is_out_of_band(&self, side: Side, price: Price) -> bool {
        let Some(front) = self.front(side) else {
            return false;
        };
        let (price, front) = (price.as_i64(), front.as_i64());
        match side {
            Side::Buy => price > front || price <= front - self.band_width,
            Side::Sell => price < front || price >= front + self.band_width,
        }
    }
}

/// Inventory skew in ticks.
///
/// Zero while `|position|` is within the threshold. Beyond it, one tick per
/// `skew_volume_per_tick` lots of excess, rounded half away from zero, and
/// signed so a long position lowers quotes and a short one raises them.
pub fn skew_ticks(position: i64, config: &MakerConfig) -> i64 {
    let excess = position.unsigned_abs().saturating_sub(config.skew_threshold);
    if excess == 0 || config.skew_volume_per_tick == 0 {
        return 0;
    }

    let ticks = (Decimal::from(excess) / Decimal::from(config.skew_volume_per_tick))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0);

    -position.signum() * ticks
}

/// Compute the target ladder from the reference best prices.
///
/// A side is quoted only when its reference best price is present. The
/// front bid never exceeds the reference best ask and the front ask never
/// falls below the reference best bid. Levels step one tick away from the
/// market and stop before reaching a non-positive price.
pub fn compute_ladder(
    ref_bid: Option<Price>,
    ref_ask: Option<Price>,
    position: i64,
    config: &MakerConfig,
) -> LadderTarget {
    let tick = config.tick_size as i64;
    let skew = skew_ticks(position, config);
    let adjustment = skew * tick;
    let spread = config.additional_spread();

    let front_bid = ref_bid
        .and_then(|bid| bid.offset(adjustment - spread))
        .map(|front| match ref_ask {
            Some(ask) => front.min(ask),
            None => front,
        });

    let front_ask = ref_ask
        .and_then(|ask| ask.offset(adjustment + spread))
        .map(|front| match ref_bid {
            Some(bid) => front.max(bid),
            None => front,
        });

    LadderTarget {
        skew_ticks: skew,
        bids: ladder_levels(front_bid, -tick, config.ladder_depth),
        asks: ladder_levels(front_ask, tick, config.ladder_depth),
        front_bid,
        front_ask,
        band_width: i64::from(config.ladder_depth) * tick,
    }
}

fn ladder_levels(front: Option<Price>, step: i64, depth: u32) -> Vec<Price> {
    let Some(front) = front else {
        return Vec::new();
    };
    (0..i64::from(depth))
        .map_while(|level| front.offset(level * step))
        .collect()
}

/// Volume that may still rest on `side` without breaching the position limit
/// if every resting order filled: `limit - position` for bids,
/// `limit + position` for asks.
pub fn side_headroom(side: Side, position: i64, position_limit: u64) -> i64 {
    position_limit as i64 - side.sign() * position
}
