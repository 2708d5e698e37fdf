//! Quote lifecycle management.
//!
//! The quote manager is the engine context for one session. It owns the
//! order registry, inventory, market cache and message governor, and turns
//! each session event into outbound commands:
//! - Reference book updates cancel crossed and out-of-band orders, then fill
//!   empty ladder levels within volume headroom and message budget
//! - Fills move position and are hedged immediately on the reference instrument
//! - Status, error and hedge callbacks keep the registry and ledger current
//!
//! Events are processed one at a time; nothing here is re-entrant.

use std::collections::HashMap;
use std::sync::Arc;

use pairmm_core::{
    BookSnapshot, Instrument, Lifespan, OrderId, OrderIdGenerator, Price, Side, Volume,
};
use pairmm_session::{Command, CommandSink, MessageGovernor, SendResult, SessionEvent};
use pairmm_telemetry::Metrics;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::MakerConfig;
use crate::error::{MakerError, MakerResult};
use crate::inventory::{FillDelta, FillUpdate, HedgeOutcome, InventoryManager};
use crate::market_state::{BookUpdate, MarketState};
use crate::quote_engine::{compute_ladder, side_headroom, LadderTarget};
use crate::registry::{OrderRegistry, RegistryError};

const SIDES: [Side; 2] = [Side::Buy, Side::Sell];

/// A fill-and-kill order sent by the cross-instrument taker.
#[derive(Debug, Clone)]
struct TakerOrder {
    side: Side,
    price: Price,
    volume: Volume,
}

/// Session state snapshot for logs and shutdown reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub position: i64,
    pub fill_count: u64,
    pub fees_total: i64,
    pub realized_pnl: Decimal,
    /// Open position marked at the reference mid, when both sides exist.
    pub unrealized_pnl: Option<Decimal>,
    pub hedges_sent: usize,
    pub hedges_failed: u64,
    pub hedged_volume: Volume,
    pub unhedged_volume: Volume,
    pub resting_bids: usize,
    pub resting_asks: usize,
    pub resting_bid_volume: Volume,
    pub resting_ask_volume: Volume,
    pub commands_sent: u64,
    pub send_failures: u64,
    pub inert: bool,
}

/// Engine context for one trading session.
pub struct QuoteManager {
    config: MakerConfig,
    registry: OrderRegistry,
    inventory: InventoryManager,
    market: MarketState,
    governor: MessageGovernor,
    sink: Arc<dyn CommandSink>,
    ids: OrderIdGenerator,
    /// Fill-and-kill orders awaiting their terminal status.
    takers: HashMap<OrderId, TakerOrder>,
    /// Set on disconnect; every later event is ignored.
    inert: bool,
    commands_sent: u64,
    send_failures: u64,
}

impl QuoteManager {
    pub fn new(config: MakerConfig, governor: MessageGovernor, sink: Arc<dyn CommandSink>) -> Self {
        let inventory = InventoryManager::new(config.position_limit);
        Self {
            config,
            registry: OrderRegistry::new(),
            inventory,
            market: MarketState::new(),
            governor,
            sink,
            ids: OrderIdGenerator::new(),
            takers: HashMap::new(),
            inert: false,
            commands_sent: 0,
            send_failures: 0,
        }
    }

    /// Dispatch one session event.
    pub fn handle_event(&mut self, event: SessionEvent) {
        if self.inert {
            debug!(kind = event.kind(), "Ignoring event after disconnect");
            return;
        }

        match event {
            SessionEvent::OrderBook(snapshot) => self.on_order_book(snapshot),
            SessionEvent::TradeTicks(snapshot) => self.on_trade_ticks(snapshot),
            SessionEvent::OrderStatus {
                order_id,
                fill_volume,
                remaining_volume,
                fees,
            } => self.on_order_status(order_id, fill_volume, remaining_volume, fees),
            SessionEvent::OrderFilled {
                order_id,
                price,
                volume,
            } => self.on_order_filled(order_id, price, volume),
            SessionEvent::HedgeFilled {
                order_id,
                average_price,
                volume,
            } => self.on_hedge_filled(order_id, average_price, volume),
            SessionEvent::Error { order_id, message } => self.on_error(order_id, &message),
            SessionEvent::Disconnect => self.on_disconnect(),
        }
    }

    /// Cache a book snapshot; reference updates drive a quoting pass.
    pub fn on_order_book(&mut self, snapshot: BookSnapshot) {
        if self.inert {
            return;
        }
        if let Err(e) = snapshot.validate() {
            warn!(instrument = %snapshot.instrument, sequence = snapshot.sequence, error = %e,
                "Dropping malformed book");
            return;
        }

        let instrument = snapshot.instrument;
        if let BookUpdate::Stale { .. } = self.market.update_book(snapshot) {
            return;
        }

        if self.config.cross_arbitrage_enabled {
            self.find_cross();
        }
        if instrument == Instrument::Reference {
            self.requote();
        }
    }

    pub fn on_trade_ticks(&mut self, snapshot: BookSnapshot) {
        if self.inert {
            return;
        }
        let instrument = snapshot.instrument;
        let sequence = snapshot.sequence;
        if self.market.update_trades(snapshot) == BookUpdate::Applied {
            debug!(instrument = %instrument, sequence, "Trade ticks");
        }
    }

    /// Order status from the venue. Zero remaining volume is terminal.
    pub fn on_order_status(
        &mut self,
        raw_order_id: u64,
        fill_volume: Volume,
        remaining_volume: Volume,
        fees: i64,
    ) {
        if self.inert {
            return;
        }
        let Some(order_id) = OrderId::new(raw_order_id) else {
            warn!("Order status without order id");
            Metrics::unknown_order("status");
            return;
        };

        let resting_side = self.registry.side_of(order_id);
        let is_taker = self.takers.contains_key(&order_id);
        if resting_side.is_none() && !is_taker && !self.inventory.is_tracked(order_id) {
            warn!(order_id = %order_id, "Status for unknown order");
            Metrics::unknown_order("status");
            return;
        }

        if let FillUpdate::Applied(delta) = self.inventory.apply_status_fill(order_id, fill_volume) {
            self.on_fill_applied(order_id, delta);
        }

        if self.inventory.record_fees(order_id, fees) != 0 {
            Metrics::fees_total(self.inventory.fees_total() as f64);
        }

        if remaining_volume.is_zero() {
            self.retire_order(order_id);
        } else if self.registry.side_of(order_id).is_some() {
            if let Err(e) = self.registry.adjust_volume(order_id, remaining_volume) {
                Self::registry_fault(&e);
            }
        } else if let Some(taker) = self.takers.get_mut(&order_id) {
            taker.volume = remaining_volume;
        }

        debug!(
            order_id = %order_id,
            fill_volume = %fill_volume,
            remaining_volume = %remaining_volume,
            fees,
            "Order status"
        );
        self.publish_state();
    }

    /// Fill notice for one of our tradeable-instrument orders.
    pub fn on_order_filled(&mut self, raw_order_id: u64, price: Price, volume: Volume) {
        if self.inert {
            return;
        }
        let Some(order_id) = OrderId::new(raw_order_id) else {
            warn!("Fill without order id");
            Metrics::unknown_order("filled");
            return;
        };

        match self.inventory.apply_fill_notice(order_id, price, volume) {
            FillUpdate::Unknown => {
                warn!(order_id = %order_id, price = %price, volume = %volume, "Fill for unknown order");
                Metrics::unknown_order("filled");
            }
            FillUpdate::Duplicate => {
                debug!(order_id = %order_id, volume = %volume, "Fill already accounted");
            }
            FillUpdate::Applied(delta) => {
                self.on_fill_applied(order_id, delta);
                self.publish_state();
            }
        }
    }

    pub fn on_hedge_filled(&mut self, raw_order_id: u64, average_price: Price, volume: Volume) {
        if self.inert {
            return;
        }
        let outcome = match OrderId::new(raw_order_id) {
            Some(order_id) => self.inventory.on_hedge_filled(order_id, average_price, volume),
            None => HedgeOutcome::Unknown,
        };

        match outcome {
            HedgeOutcome::Unknown => {
                warn!(order_id = raw_order_id, "Hedge fill for unknown order");
                Metrics::unknown_order("hedge_filled");
            }
            HedgeOutcome::Failed => {
                error!(order_id = raw_order_id, "Hedge did not trade, exposure unhedged");
                Metrics::hedge_filled(false);
            }
            HedgeOutcome::Filled {
                complete,
                average_price: running_average,
            } => {
                info!(
                    order_id = raw_order_id,
                    average_price = %average_price,
                    volume = %volume,
                    running_average = %running_average,
                    complete,
                    "Hedge filled"
                );
                Metrics::hedge_filled(true);
            }
        }
    }

    /// Venue error. An error naming one of our orders terminates it.
    pub fn on_error(&mut self, raw_order_id: u64, message: &str) {
        if self.inert {
            return;
        }
        let Some(order_id) = OrderId::new(raw_order_id) else {
            warn!(message, "Venue error");
            return;
        };

        if self.registry.side_of(order_id).is_some() || self.takers.contains_key(&order_id) {
            warn!(order_id = %order_id, message, "Order rejected by venue");
            Metrics::venue_rejection();
            let fees = self.inventory.order_fees(order_id).unwrap_or(0);
            self.on_order_status(raw_order_id, Volume::ZERO, Volume::ZERO, fees);
        } else if self.inventory.fail_hedge(order_id) {
            error!(order_id = %order_id, message, "Hedge rejected by venue, exposure unhedged");
            Metrics::venue_rejection();
        } else {
            warn!(order_id = %order_id, message, "Venue error for unknown order");
            Metrics::unknown_order("error");
        }
    }

    /// Session ended. The engine stops acting.
    pub fn on_disconnect(&mut self) {
        if self.inert {
            return;
        }
        self.inert = true;
        warn!(
            position = self.inventory.position(),
            resting = self.registry.len(),
            "Session disconnected, engine inert"
        );
    }

    /// Reduce the volume of a resting ladder order.
    pub fn amend_order(&mut self, order_id: OrderId, volume: Volume) -> MakerResult<()> {
        if self.inert {
            return Err(MakerError::Inert);
        }
        let current = self
            .registry
            .get(order_id)
            .map(|order| order.volume)
            .ok_or(RegistryError::UnknownOrder(order_id))?;
        if volume > current {
            return Err(MakerError::VolumeIncrease {
                order_id,
                current,
                requested: volume,
            });
        }
        if volume == current {
            return Ok(());
        }

        let result = self.send(Command::AmendOrder { order_id, volume });
        if !result.is_success() {
            return Err(MakerError::SendFailed {
                kind: "amend",
                result: result.label(),
            });
        }
        self.registry.adjust_volume(order_id, volume)?;
        self.publish_state();
        Ok(())
    }

    pub fn config(&self) -> &MakerConfig {
        &self.config
    }

    pub fn registry(&self) -> &OrderRegistry {
        &self.registry
    }

    pub fn inventory(&self) -> &InventoryManager {
        &self.inventory
    }

    pub fn market(&self) -> &MarketState {
        &self.market
    }

    pub fn position(&self) -> i64 {
        self.inventory.position()
    }

    pub fn is_inert(&self) -> bool {
        self.inert
    }

    pub fn summary(&self) -> SessionSummary {
        let (hedged_volume, unhedged_volume) = self.inventory.hedge_volumes();
        let unrealized_pnl = self
            .market
            .book(Instrument::Reference)
            .and_then(|book| Some((book.best_bid()?, book.best_ask()?)))
            .map(|(bid, ask)| {
                let mid = (Decimal::from(bid.inner()) + Decimal::from(ask.inner())) / Decimal::TWO;
                self.inventory.unrealized_pnl(mid)
            });
        SessionSummary {
            position: self.inventory.position(),
            fill_count: self.inventory.fill_count(),
            fees_total: self.inventory.fees_total(),
            realized_pnl: self.inventory.realized_pnl(),
            unrealized_pnl,
            hedges_sent: self.inventory.hedges_sent(),
            hedges_failed: self.inventory.hedges_failed(),
            hedged_volume,
            unhedged_volume,
            resting_bids: self.registry.bids.len(),
            resting_asks: self.registry.asks.len(),
            resting_bid_volume: self.registry.bids.total_volume(),
            resting_ask_volume: self.registry.asks.total_volume(),
            commands_sent: self.commands_sent,
            send_failures: self.send_failures,
            inert: self.inert,
        }
    }

    // ---- quoting pass ----

    fn requote(&mut self) {
        let Some(book) = self.market.book(Instrument::Reference).cloned() else {
            return;
        };

        if let Err(e) = self.registry.check_consistency() {
            Self::registry_fault(&e);
            self.registry.repair();
        }

        let (ref_bid, ref_ask) = (book.best_bid(), book.best_ask());
        self.cancel_crossed(ref_bid, ref_ask);

        if !book.state().is_quotable() {
            debug!(sequence = book.sequence, state = %book.state(), "Reference book not quotable");
            self.publish_state();
            return;
        }

        let target = compute_ladder(ref_bid, ref_ask, self.inventory.position(), &self.config);
        self.cancel_out_of_band(&target);
        self.fill_ladder(&target);
        self.publish_state();
    }

    /// Cancel bids above the reference ask and asks below the reference bid,
    /// nearest the market first.
    fn cancel_crossed(&mut self, ref_bid: Option<Price>, ref_ask: Option<Price>) {
        for side in SIDES {
            let crossed: Vec<OrderId> = self
                .registry
                .side(side)
                .best_first()
                .into_iter()
                .filter(|order| !order.cancel_requested)
                .filter(|order| match side {
                    Side::Buy => ref_ask.is_some_and(|ask| order.price > ask),
                    Side::Sell => ref_bid.is_some_and(|bid| order.price < bid),
                })
                .map(|order| order.order_id)
                .collect();

            for order_id in crossed {
                self.cancel_order(side, order_id, "arbitrage");
            }
        }
    }

    fn cancel_out_of_band(&mut self, target: &LadderTarget) {
        for side in SIDES {
            let stale: Vec<OrderId> = self
                .registry
                .side(side)
                .best_first()
                .into_iter()
                .filter(|order| !order.cancel_requested)
                .filter(|order| target.is_out_of_band(side, order.price))
                .map(|order| order.order_id)
                .collect();

            for order_id in stale {
                self.cancel_order(side, order_id, "out_of_band");
            }
        }
    }

    /// Insert at uncovered levels, nearest first, alternating sides.
    fn fill_ladder(&mut self, target: &LadderTarget) {
        let mut budget = self.governor.non_cancel_budget();
        let mut starved = false;
        let mut headroom = [self.headroom(Side::Buy), self.headroom(Side::Sell)];
        let lot = self.config.lot();

        for level in 0..self.config.ladder_depth as usize {
            for (slot, side) in SIDES.into_iter().enumerate() {
                let Some(&price) = target.levels(side).get(level) else {
                    continue;
                };
                if self.registry.side(side).is_occupied(price) {
                    continue;
                }
                if headroom[slot] <= 0 {
                    Metrics::insert_skipped("headroom");
                    continue;
                }
                if budget == 0 {
                    Metrics::insert_skipped("budget");
                    starved = true;
                    continue;
                }

                let volume = lot.min(Volume::from_headroom(headroom[slot]));
                budget -= 1;
                if self.insert_order(side, price, volume, Lifespan::GoodForDay) {
                    headroom[slot] -= volume.as_i64();
                }
            }
        }

        if starved {
            debug!(
                remaining = self.governor.remaining_capacity(),
                "Non-cancel budget exhausted, ladder left partial"
            );
        }
    }

    /// Volume that may still be added on `side`. Every resting order counts,
    /// including those with a cancel in flight, as do unresolved taker orders.
    fn headroom(&self, side: Side) -> i64 {
        let pending_takers: u64 = self
            .takers
            .values()
            .filter(|taker| taker.side == side)
            .map(|taker| taker.volume.inner())
            .sum();
        side_headroom(side, self.inventory.position(), self.config.position_limit)
            - self.registry.side(side).total_volume().as_i64()
            - pending_takers as i64
    }

    // ---- cross-instrument taker ----

    /// Take a tradeable book that crosses the reference book by more than the fee.
    fn find_cross(&mut self) {
        let Some((tradeable, reference)) = self.market.synchronized_books() else {
            return;
        };
        let (tradeable, reference) = (tradeable.clone(), reference.clone());

        if let (Some(bid), Some(ask)) = (tradeable.best_bid(), reference.best_ask()) {
            if let Some(edge) = self.crossing_edge(bid, ask, bid) {
                let available = tradeable.best_bid_volume().min(reference.best_ask_volume());
                self.take(Side::Sell, bid, available, edge);
            }
        }

        if let (Some(bid), Some(ask)) = (reference.best_bid(), tradeable.best_ask()) {
            if let Some(edge) = self.crossing_edge(bid, ask, ask) {
                let available = tradeable.best_ask_volume().min(reference.best_bid_volume());
                self.take(Side::Buy, ask, available, edge);
            }
        }
    }

    /// Ticks by which `high` exceeds `low`, if that beats the taker fee on
    /// `traded`.
    fn crossing_edge(&self, high: Price, low: Price, traded: Price) -> Option<u64> {
        if high <= low {
            return None;
        }
        let edge = high.inner() - low.inner();
        (Decimal::from(edge) > Decimal::from(traded.inner()) * self.config.taker_fee_rate)
            .then_some(edge)
    }

    fn take(&mut self, side: Side, price: Price, available: Volume, edge: u64) {
        // Would trade against our own resting order.
        if self.registry.side(side.opposite()).is_occupied(price) {
            debug!(side = %side, price = %price, "Cross skipped: own order at price");
            return;
        }
        if self
            .takers
            .values()
            .any(|taker| taker.side == side && taker.price == price)
        {
            return;
        }
        let volume = available.min(Volume::from_headroom(self.headroom(side)));
        if volume.is_zero() {
            return;
        }
        if self.governor.non_cancel_budget() == 0 {
            Metrics::insert_skipped("budget");
            return;
        }

        let fee = self.config.taker_fee_rate * Decimal::from(price.inner());
        info!(
            side = %side,
            price = %price,
            volume = %volume,
            edge,
            fee = fee.to_f64().unwrap_or(0.0),
            "Taking crossed market"
        );
        if self.insert_order(side, price, volume, Lifespan::FillAndKill) {
            Metrics::taker_sent(side.as_str());
        }
    }

    // ---- order plumbing ----

    fn on_fill_applied(&mut self, order_id: OrderId, delta: FillDelta) {
        let position = self.inventory.position();
        info!(
            order_id = %order_id,
            side = %delta.side,
            volume = %delta.volume,
            position,
            "Fill applied"
        );
        Metrics::fill_applied(delta.side.as_str(), delta.volume.inner());
        Metrics::position(position);

        self.reduce_working_volume(order_id, delta.volume);
        self.send_hedge(delta);
    }

    /// Take filled volume off a working order; a fully filled order is retired.
    fn reduce_working_volume(&mut self, order_id: OrderId, filled: Volume) {
        if let Some(order) = self.registry.get(order_id) {
            let remaining = order.volume.saturating_sub(filled);
            let result = if remaining.is_zero() {
                self.inventory.settle_order(order_id);
                self.registry.remove_by_order_id(order_id).map(|_| ())
            } else {
                self.registry.adjust_volume(order_id, remaining)
            };
            if let Err(e) = result {
                Self::registry_fault(&e);
            }
        } else if let Some(taker) = self.takers.get_mut(&order_id) {
            taker.volume = taker.volume.saturating_sub(filled);
            if taker.volume.is_zero() {
                self.takers.remove(&order_id);
                self.inventory.settle_order(order_id);
            }
        }
    }

    /// Drop a terminal order from every book we keep.
    fn retire_order(&mut self, order_id: OrderId) {
        if self.registry.side_of(order_id).is_some() {
            if let Err(e) = self.registry.remove_by_order_id(order_id) {
                Self::registry_fault(&e);
            }
        }
        self.takers.remove(&order_id);
        self.inventory.forget_order(order_id);
    }

    fn send_hedge(&mut self, fill: FillDelta) {
        let side = fill.side.opposite();
        let price = self.config.hedge_price(side);
        let order_id = self.ids.next_id();

        let result = self.send(Command::HedgeOrder {
            order_id,
            side,
            price,
            volume: fill.volume,
        });
        if result.is_success() {
            self.inventory.record_hedge(order_id, side, fill.volume);
            Metrics::hedge_sent(side.as_str());
        } else {
            error!(
                order_id = %order_id,
                side = %side,
                volume = %fill.volume,
                result = result.label(),
                "Hedge not sent, exposure unhedged"
            );
        }
    }

    /// Send an insert and start tracking it. Returns false if the session
    /// refused it.
    fn insert_order(&mut self, side: Side, price: Price, volume: Volume, lifespan: Lifespan) -> bool {
        let order_id = self.ids.next_id();
        let result = self.send(Command::InsertOrder {
            order_id,
            side,
            price,
            volume,
            lifespan,
        });
        if !result.is_success() {
            return false;
        }

        match lifespan {
            Lifespan::GoodForDay => {
                if let Err(e) = self.registry.insert(side, order_id, price, volume) {
                    Self::registry_fault(&e);
                }
            }
            Lifespan::FillAndKill => {
                self.takers.insert(
                    order_id,
                    TakerOrder {
                        side,
                        price,
                        volume,
                    },
                );
            }
        }
        self.inventory.track_order(order_id, side, price);
        true
    }

    fn cancel_order(&mut self, side: Side, order_id: OrderId, reason: &'static str) {
        let result = self.send(Command::CancelOrder { order_id });
        if !result.is_success() {
            return;
        }
        Metrics::cancel_issued(reason);
        if let Err(e) = self.registry.side_mut(side).mark_cancel_requested(order_id) {
            Self::registry_fault(&e);
        }
    }

    /// Account the command to the governor, then hand it to the session.
    fn send(&mut self, command: Command) -> SendResult {
        // A session that cannot transmit never spends window capacity.
        let result = if self.sink.is_ready() {
            self.governor.note_message();
            self.sink.send(&command)
        } else {
            SendResult::Disconnected
        };
        let kind = command.kind();

        if result.is_success() {
            self.commands_sent += 1;
            Metrics::command_sent(kind);
            debug!(kind, order_id = %command.order_id(), "Command sent");
        } else {
            self.send_failures += 1;
            Metrics::command_failed(kind, result.label());
            warn!(kind, order_id = %command.order_id(), result = result.label(), "Command not sent");
        }
        result
    }

    fn registry_fault(e: &RegistryError) {
        let kind = match e {
            RegistryError::PriceOccupied { .. } => "price_occupied",
            RegistryError::DuplicateOrder(_) => "duplicate_order",
            RegistryError::UnknownOrder(_) => "unknown_order",
            RegistryError::DanglingPrice { .. } => "dangling_price",
            RegistryError::Unindexed { .. } => "unindexed",
        };
        warn!(error = %e, "Registry fault");
        Metrics::registry_fault(kind);
    }

    fn publish_state(&self) {
        for side in SIDES {
            let registry = self.registry.side(side);
            Metrics::resting(side.as_str(), registry.len(), registry.total_volume().inner());
        }
        Metrics::position(self.inventory.position());
    }
}
