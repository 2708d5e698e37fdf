//! Inventory tracking for market making.
//!
//! Tracks net position on the tradeable instrument, de-duplicates fills that
//! are reported both by fill notices and by cumulative order status, sums
//! fees, and keeps a ledger of hedges sent on the reference instrument.

use std::collections::{HashMap, VecDeque};

use pairmm_core::{OrderId, Price, Side, Volume};
use rust_decimal::Decimal;
use tracing::warn;

/// Position change produced by a fill report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillDelta {
    pub side: Side,
    pub volume: Volume,
}

/// Outcome of applying a fill report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillUpdate {
    /// Order is not tracked.
    Unknown,
    /// Volume already accounted by an earlier report.
    Duplicate,
    Applied(FillDelta),
}

/// Outcome of a hedge fill notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HedgeOutcome {
    Unknown,
    /// Zero price and volume: the hedge did not trade.
    Failed,
    /// `average_price` covers every fill of this hedge so far.
    Filled {
        complete: bool,
        average_price: Decimal,
    },
}

/// Orders filled out by fill notices stay tracked for a late terminal
/// status, up to this many.
const SETTLED_RETENTION: usize = 256;

/// Per-order fill bookkeeping.
#[derive(Debug, Clone)]
struct OrderFills {
    side: Side,
    /// Limit price, used when a status report advances fills without a price.
    price: Price,
    /// Volume applied to position.
    accounted: Volume,
    /// Sum of fill notices received.
    notified: Volume,
    /// Cumulative fees last reported.
    fees: i64,
}

/// A hedge order sent on the reference instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HedgeRecord {
    pub order_id: OrderId,
    pub side: Side,
    pub volume: Volume,
    pub filled: Volume,
    /// Sum of price * volume over fills.
    pub notional: Decimal,
}

impl HedgeRecord {
    pub fn average_price(&self) -> Option<Decimal> {
        if self.filled.is_zero() {
            return None;
        }
        Some(self.notional / Decimal::from(self.filled.inner()))
    }
}

/// Position, fees and hedges for the session.
#[derive(Debug)]
pub struct InventoryManager {
    position_limit: u64,
    /// Net signed position (positive = long).
    position: i64,
    /// Average entry price of current inventory.
    avg_entry: Decimal,
    realized_pnl: Decimal,
    fill_count: u64,
    orders: HashMap<OrderId, OrderFills>,
    /// Fully filled orders still awaiting a terminal status, oldest first.
    settled: VecDeque<OrderId>,
    fees_total: i64,
    /// Hedges not yet filled or failed.
    hedges: HashMap<OrderId, HedgeRecord>,
    hedges_sent: usize,
    hedges_failed: u64,
    hedged_volume: Volume,
}

impl InventoryManager {
    pub fn new(position_limit: u64) -> Self {
        Self {
            position_limit,
            position: 0,
            avg_entry: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            fill_count: 0,
            orders: HashMap::new(),
            settled: VecDeque::new(),
            fees_total: 0,
            hedges: HashMap::new(),
            hedges_sent: 0,
            hedges_failed: 0,
            hedged_volume: Volume::ZERO,
        }
    }

    /// Start tracking fills for an order we sent.
    pub fn track_order(&mut self, order_id: OrderId, side: Side, price: Price) {
        self.orders.insert(
            order_id,
            OrderFills {
                side,
                price,
                accounted: Volume::ZERO,
                notified: Volume::ZERO,
                fees: 0,
            },
        );
    }

    pub fn is_tracked(&self, order_id: OrderId) -> bool {
        self.orders.contains_key(&order_id)
    }

    /// Stop tracking a terminal order.
    pub fn forget_order(&mut self, order_id: OrderId) {
        if self.orders.remove(&order_id).is_some() {
            self.settled.retain(|settled| *settled != order_id);
        }
    }

    /// Note an order whose whole volume has filled.
    ///
    /// It stays tracked so a late status still de-duplicates and books fees,
    /// but only the most recent `SETTLED_RETENTION` such orders are kept.
    pub fn settle_order(&mut self, order_id: OrderId) {
        if !self.orders.contains_key(&order_id) {
            return;
        }
        self.settled.push_back(order_id);
        while self.settled.len() > SETTLED_RETENTION {
            if let Some(oldest) = self.settled.pop_front() {
                self.orders.remove(&oldest);
            }
        }
    }

    /// Apply a fill notice carrying the volume of one fill.
    pub fn apply_fill_notice(&mut self, order_id: OrderId, price: Price, volume: Volume) -> FillUpdate {
        let Some(fills) = self.orders.get_mut(&order_id) else {
            return FillUpdate::Unknown;
        };
        fills.notified += volume;
        let target = fills.notified;
        self.advance(order_id, target, price)
    }

    /// Apply the cumulative fill volume from an order status report.
    pub fn apply_status_fill(&mut self, order_id: OrderId, cumulative: Volume) -> FillUpdate {
        let Some(fills) = self.orders.get(&order_id) else {
            return FillUpdate::Unknown;
        };
        let price = fills.price;
        self.advance(order_id, cumulative, price)
    }

    /// Record cumulative fees for an order. Returns the change.
    pub fn record_fees(&mut self, order_id: OrderId, cumulative: i64) -> i64 {
        let Some(fills) = self.orders.get_mut(&order_id) else {
            return 0;
        };
        let delta = cumulative - fills.fees;
        fills.fees = cumulative;
        self.fees_total += delta;
        delta
    }

    /// Cumulative fees last recorded for an order.
    pub fn order_fees(&self, order_id: OrderId) -> Option<i64> {
        self.orders.get(&order_id).map(|f| f.fees)
    }

    fn advance(&mut self, order_id: OrderId, target: Volume, price: Price) -> FillUpdate {
        let Some(fills) = self.orders.get_mut(&order_id) else {
            return FillUpdate::Unknown;
        };
        if target <= fills.accounted {
            return FillUpdate::Duplicate;
        }
        let delta = FillDelta {
            side: fills.side,
            volume: target - fills.accounted,
        };
        fills.accounted = target;
        self.record_fill(delta.side, price, delta.volume);
        FillUpdate::Applied(delta)
    }

    fn record_fill(&mut self, side: Side, price: Price, volume: Volume) {
        let fill_size = Decimal::from(volume.inner());
        let fill_price = Decimal::from(price.inner());
        let signed = side.sign() * volume.as_i64();
        let old = self.position;
        let new = old + signed;

        // Reducing position: realize PnL on the closed part.
        if old != 0 && old.signum() != signed.signum() {
            let reduced = Decimal::from(signed.unsigned_abs().min(old.unsigned_abs()));
            let pnl = if old > 0 {
                (fill_price - self.avg_entry) * reduced
            } else {
                (self.avg_entry - fill_price) * reduced
            };
            self.realized_pnl += pnl;
        }

        if new == 0 {
            self.avg_entry = Decimal::ZERO;
        } else if old != 0 && new.signum() != old.signum() {
            // Flipped through zero.
            self.avg_entry = fill_price;
        } else if old == 0 || new.signum() == signed.signum() {
            let old_notional = Decimal::from(old.unsigned_abs()) * self.avg_entry;
            self.avg_entry =
                (old_notional + fill_size * fill_price) / Decimal::from(new.unsigned_abs());
        }

        self.position = new;
        self.fill_count += 1;

        if self.position.unsigned_abs() > self.position_limit {
            warn!(
                position = self.position,
                limit = self.position_limit,
                "Position beyond limit"
            );
        }
    }

    pub fn position(&self) -> i64 {
        self.position
    }

    pub fn avg_entry(&self) -> Decimal {
        self.avg_entry
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    /// Mark-to-market PnL of the open position.
    pub fn unrealized_pnl(&self, mark: Decimal) -> Decimal {
        Decimal::from(self.position) * (mark - self.avg_entry)
    }

    pub fn fill_count(&self) -> u64 {
        self.fill_count
    }

    pub fn fees_total(&self) -> i64 {
        self.fees_total
    }

    /// Record a hedge handed to the session.
    pub fn record_hedge(&mut self, order_id: OrderId, side: Side, volume: Volume) {
        self.hedges.insert(
            order_id,
            HedgeRecord {
                order_id,
                side,
                volume,
                filled: Volume::ZERO,
                notional: Decimal::ZERO,
            },
        );
        self.hedges_sent += 1;
    }

    /// Apply a hedge fill notification. Completed and failed hedges leave
    /// the ledger.
    pub fn on_hedge_filled(
        &mut self,
        order_id: OrderId,
        average_price: Price,
        volume: Volume,
    ) -> HedgeOutcome {
        let Some(hedge) = self.hedges.get_mut(&order_id) else {
            return HedgeOutcome::Unknown;
        };
        if average_price.is_zero() && volume.is_zero() {
            self.hedges.remove(&order_id);
            self.hedges_failed += 1;
            return HedgeOutcome::Failed;
        }

        hedge.filled += volume;
        hedge.notional += Decimal::from(average_price.inner()) * Decimal::from(volume.inner());
        self.hedged_volume += volume;

        let complete = hedge.filled >= hedge.volume;
        let average_price = hedge.average_price().unwrap_or_default();
        if complete {
            self.hedges.remove(&order_id);
        }
        HedgeOutcome::Filled {
            complete,
            average_price,
        }
    }

    /// Mark a hedge as failed (venue error).
    pub fn fail_hedge(&mut self, order_id: OrderId) -> bool {
        if self.hedges.remove(&order_id).is_some() {
            self.hedges_failed += 1;
            true
        } else {
            false
        }
    }

    pub fn hedges_sent(&self) -> usize {
        self.hedges_sent
    }

    pub fn hedges_failed(&self) -> u64 {
        self.hedges_failed
    }

    /// Volume hedged so far, and volume sent but not (yet) filled.
    pub fn hedge_volumes(&self) -> (Volume, Volume) {
        let outstanding = self
            .hedges
            .values()
            .fold(Volume::ZERO, |open, h| open + h.volume.saturating_sub(h.filled));
        (self.hedged_volume, outstanding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn id(raw: u64) -> OrderId {
        OrderId::new(raw).unwrap()
    }

    #[test]
    fn test_fill_notice_then_status_counts_once() {
        let mut inv = InventoryManager::new(100);
        inv.track_order(id(1), Side::Buy, Price::new(9_900));

        assert_eq!(
            inv.apply_fill_notice(id(1), Price::new(9_900), Volume::new(4)),
            FillUpdate::Applied(FillDelta {
                side: Side::Buy,
                volume: Volume::new(4)
            })
        );
        assert_eq!(inv.apply_status_fill(id(1), Volume::new(4)), FillUpdate::Duplicate);
        assert_eq!(inv.position(), 4);

        // Status gets ahead of the notices.
        assert_eq!(
            inv.apply_status_fill(id(1), Volume::new(10)),
            FillUpdate::Applied(FillDelta {
                side: Side::Buy,
                volume: Volume::new(6)
            })
        );
        assert_eq!(
            inv.apply_fill_notice(id(1), Price::new(9_900), Volume::new(6)),
            FillUpdate::Duplicate
        );
        assert_eq!(inv.position(), 10);
        assert_eq!(inv.fill_count(), 2);
    }

    #[test]
    fn test_unknown_order() {
        let mut inv = InventoryManager::new(100);
        assert_eq!(
            inv.apply_fill_notice(id(5), Price::new(100), Volume::new(1)),
            FillUpdate::Unknown
        );
        assert_eq!(inv.apply_status_fill(id(5), Volume::new(1)), FillUpdate::Unknown);
        assert_eq!(inv.record_fees(id(5), 3), 0);
        assert_eq!(inv.position(), 0);
    }

    #[test]
    fn test_sell_fill_and_realized_pnl() {
        let mut inv = InventoryManager::new(100);
        inv.track_order(id(1), Side::Buy, Price::new(9_900));
        inv.track_order(id(2), Side::Sell, Price::new(10_200));

        inv.apply_fill_notice(id(1), Price::new(9_900), Volume::new(10));
        assert_eq!(inv.avg_entry(), dec!(9900));

        inv.apply_fill_notice(id(2), Price::new(10_200), Volume::new(15));
        assert_eq!(inv.position(), -5);
        assert_eq!(inv.realized_pnl(), dec!(3000));
        assert_eq!(inv.avg_entry(), dec!(10200));
        assert_eq!(inv.unrealized_pnl(dec!(10000)), dec!(1000));
    }

    #[test]
    fn test_fee_deltas() {
        let mut inv = InventoryManager::new(100);
        inv.track_order(id(1), Side::Buy, Price::new(9_900));
        inv.track_order(id(2), Side::Sell, Price::new(10_200));

        assert_eq!(inv.record_fees(id(1), -2), -2);
        assert_eq!(inv.record_fees(id(1), -5), -3);
        assert_eq!(inv.record_fees(id(2), 4), 4);
        assert_eq!(inv.fees_total(), -1);
        assert_eq!(inv.order_fees(id(1)), Some(-5));
    }

    #[test]
    fn test_hedge_ledger() {
        let mut inv = InventoryManager::new(100);
        inv.record_hedge(id(10), Side::Sell, Volume::new(10));
        inv.record_hedge(id(11), Side::Buy, Volume::new(5));
        inv.record_hedge(id(13), Side::Sell, Volume::new(8));

        assert_eq!(
            inv.on_hedge_filled(id(10), Price::new(10_000), Volume::new(4)),
            HedgeOutcome::Filled {
                complete: false,
                average_price: dec!(10000)
            }
        );
        assert_eq!(
            inv.on_hedge_filled(id(10), Price::new(10_300), Volume::new(6)),
            HedgeOutcome::Filled {
                complete: true,
                average_price: dec!(10180)
            }
        );
        assert_eq!(
            inv.on_hedge_filled(id(11), Price::ZERO, Volume::ZERO),
            HedgeOutcome::Failed
        );
        assert_eq!(
            inv.on_hedge_filled(id(12), Price::new(1), Volume::new(1)),
            HedgeOutcome::Unknown
        );
        assert!(inv.fail_hedge(id(13)));
        assert!(!inv.fail_hedge(id(13)));

        assert_eq!(inv.hedges_sent(), 3);
        assert_eq!(inv.hedges_failed(), 2);
        assert_eq!(inv.hedge_volumes(), (Volume::new(10), Volume::ZERO));
        // Hedges never move position.
        assert_eq!(inv.position(), 0);
    }

    #[test]
    fn test_settled_hedges_leave_ledger() {
        let mut inv = InventoryManager::new(100);
        for raw in 1..=50 {
            inv.record_hedge(id(raw), Side::Sell, Volume::new(10));
            inv.on_hedge_filled(id(raw), Price::new(100), Volume::new(10));
        }
        inv.record_hedge(id(51), Side::Buy, Volume::new(10));
        inv.on_hedge_filled(id(51), Price::new(200), Volume::new(3));

        assert_eq!(inv.hedges.len(), 1);
        assert_eq!(inv.hedges_sent(), 51);
        assert_eq!(inv.hedge_volumes(), (Volume::new(503), Volume::new(7)));
        // A late notice for a completed hedge is no longer matched.
        assert_eq!(
            inv.on_hedge_filled(id(1), Price::new(100), Volume::new(1)),
            HedgeOutcome::Unknown
        );
    }

    #[test]
    fn test_settled_orders_are_bounded() {
        let mut inv = InventoryManager::new(u64::MAX);
        let total = SETTLED_RETENTION as u64 + 20;
        for raw in 1..=total {
            inv.track_order(id(raw), Side::Buy, Price::new(9_900));
            inv.apply_fill_notice(id(raw), Price::new(9_900), Volume::new(1));
            inv.settle_order(id(raw));
        }

        assert_eq!(inv.orders.len(), SETTLED_RETENTION);
        assert!(!inv.is_tracked(id(1)));
        assert!(!inv.is_tracked(id(20)));
        assert!(inv.is_tracked(id(21)));

        // A recent one still books its late status fees.
        assert_eq!(inv.apply_status_fill(id(total), Volume::new(1)), FillUpdate::Duplicate);
        assert_eq!(inv.record_fees(id(total), 2), 2);
        inv.forget_order(id(total));
        assert!(!inv.is_tracked(id(total)));
        assert_eq!(inv.settled.len(), SETTLED_RETENTION - 1);

        // Untracked orders are never queued.
        inv.settle_order(id(9_999));
        assert_eq!(inv.settled.len(), SETTLED_RETENTION - 1);
    }
}
