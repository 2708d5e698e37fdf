//! Prometheus metrics for the pairmm market maker.
//!
//! Covers:
//! - Outbound commands and their send results
//! - Cancel reasons and skipped inserts
//! - Message-rate governor state
//! - Position, resting ladder, hedges and fees
//! - Callback anomalies (unknown orders, rejections, stale books)
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should cause an immediate crash at startup rather than silent failure.
//! These panics only occur during static initialization, never at runtime.

use crate::error::{TelemetryError, TelemetryResult};
use once_cell::sync::Lazy;
use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, register_int_gauge_vec, Encoder, Gauge, Histogram, IntCounter,
    IntCounterVec, IntGauge, IntGaugeVec, TextEncoder,
};

/// Outbound commands handed to the session.
/// Labels: kind (insert/cancel/amend/hedge)
pub static COMMANDS_SENT_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "pairmm_commands_sent_total",
        "Total outbound commands sent",
        &["kind"]
    )
    .unwrap()
});

/// Outbound commands the session did not accept.
/// Labels: kind, result (disconnected/error)
pub static COMMANDS_FAILED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "pairmm_commands_failed_total",
        "Total outbound commands rejected by the session",
        &["kind", "result"]
    )
    .unwrap()
});

/// Cancels issued by the quoting engine.
/// Labels: reason (arbitrage/out_of_band)
pub static CANCELS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "pairmm_cancels_total",
        "Total cancels issued by reason",
        &["reason"]
    )
    .unwrap()
});

/// Ladder levels left empty.
/// Labels: reason (budget/headroom)
pub static INSERTS_SKIPPED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "pairmm_inserts_skipped_total",
        "Ladder inserts skipped",
        &["reason"]
    )
    .unwrap()
});

/// Non-cancel budget at the start of the last reconciliation pass.
pub static NON_CANCEL_BUDGET: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "pairmm_non_cancel_budget",
        "Non-cancel message budget at last pass"
    )
    .unwrap()
});

/// Messages counted in the current governor window.
pub static GOVERNOR_LIVE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "pairmm_governor_live_messages",
        "Messages within the current rate window"
    )
    .unwrap()
});

/// Times the governor had to block before sending.
pub static BACKSTOP_WAITS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "pairmm_governor_backstop_waits_total",
        "Total governor backstop waits"
    )
    .unwrap()
});

/// Backstop wait duration in milliseconds.
pub static BACKSTOP_WAIT_MS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "pairmm_governor_backstop_wait_ms",
        "Governor backstop wait in milliseconds",
        vec![1.0, 5.0, 10.0, 50.0, 100.0, 250.0, 500.0, 1000.0]
    )
    .unwrap()
});

/// Net signed position in lots.
pub static POSITION: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("pairmm_position", "Net signed position in lots").unwrap()
});

/// Resting ladder orders.
/// Labels: side
pub static RESTING_ORDERS: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "pairmm_resting_orders",
        "Resting ladder orders by side",
        &["side"]
    )
    .unwrap()
});

/// Resting ladder volume.
/// Labels: side
pub static RESTING_VOLUME: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "pairmm_resting_volume",
        "Resting ladder volume by side",
        &["side"]
    )
    .unwrap()
});

/// Filled volume on the tradeable instrument.
/// Labels: side
pub static FILLED_VOLUME_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "pairmm_filled_volume_total",
        "Filled volume applied to position",
        &["side"]
    )
    .unwrap()
});

/// Hedges sent on the reference instrument.
/// Labels: side
pub static HEDGES_SENT_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "pairmm_hedges_sent_total",
        "Total hedge orders sent",
        &["side"]
    )
    .unwrap()
});

/// Hedge fill outcomes.
/// Labels: outcome (ok/failed)
pub static HEDGE_FILLS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "pairmm_hedge_fills_total",
        "Hedge fill notifications by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Fill-and-kill orders sent by the cross-instrument taker.
/// Labels: side
pub static TAKER_ORDERS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "pairmm_taker_orders_total",
        "Cross-instrument taker orders sent",
        &["side"]
    )
    .unwrap()
});

/// Callbacks naming an order the engine does not know.
/// Labels: callback (status/filled/hedge_filled/error)
pub static UNKNOWN_ORDER_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "pairmm_unknown_order_total",
        "Callbacks referencing unknown order ids",
        &["callback"]
    )
    .unwrap()
});

/// Venue rejections of our orders.
pub static VENUE_REJECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "pairmm_venue_rejections_total",
        "Order-specific venue errors"
    )
    .unwrap()
});

/// Registry desynchronizations detected and repaired.
/// Labels: kind
pub static REGISTRY_FAULTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "pairmm_registry_faults_total",
        "Registry inconsistencies detected",
        &["kind"]
    )
    .unwrap()
});

/// Book snapshots dropped for a non-increasing sequence number.
/// Labels: instrument
pub static STALE_BOOKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "pairmm_stale_books_total",
        "Out-of-order book snapshots dropped",
        &["instrument"]
    )
    .unwrap()
});

/// Session fee total (negative values are rebates).
pub static FEES_TOTAL: Lazy<Gauge> =
    Lazy::new(|| register_gauge!("pairmm_fees_total", "Session fees paid").unwrap());

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record a command handed to the session.
    pub fn command_sent(kind: &str) {
        COMMANDS_SENT_TOTAL.with_label_values(&[kind]).inc();
    }

    /// Record a command the session refused.
    pub fn command_failed(kind: &str, result: &str) {
        COMMANDS_FAILED_TOTAL
            .with_label_values(&[kind, result])
            .inc();
    }

    pub fn cancel_issued(reason: &str) {
        CANCELS_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn insert_skipped(reason: &str) {
        INSERTS_SKIPPED_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn non_cancel_budget(budget: i64) {
        NON_CANCEL_BUDGET.set(budget);
    }

    pub fn governor_live(live: usize) {
        GOVERNOR_LIVE.set(live as i64);
    }

    /// Record a governor backstop wait.
    pub fn backstop_wait(wait_ms: f64) {
        BACKSTOP_WAITS_TOTAL.inc();
        BACKSTOP_WAIT_MS.observe(wait_ms);
    }

    pub fn position(position: i64) {
        POSITION.set(position);
    }

    /// Set resting ladder state for one side.
    pub fn resting(side: &str, orders: usize, volume: u64) {
        RESTING_ORDERS.with_label_values(&[side]).set(orders as i64);
        RESTING_VOLUME.with_label_values(&[side]).set(volume as i64);
    }

    pub fn fill_applied(side: &str, volume: u64) {
        FILLED_VOLUME_TOTAL.with_label_values(&[side]).inc_by(volume);
    }

    pub fn hedge_sent(side: &str) {
        HEDGES_SENT_TOTAL.with_label_values(&[side]).inc();
    }

    /// Record a hedge fill notification (`ok` false for 0/0 fills).
    pub fn hedge_filled(ok: bool) {
        let outcome = if ok { "ok" } else { "failed" };
        HEDGE_FILLS_TOTAL.with_label_values(&[outcome]).inc();
    }

    pub fn taker_sent(side: &str) {
        TAKER_ORDERS_TOTAL.with_label_values(&[side]).inc();
    }

    pub fn unknown_order(callback: &str) {
        UNKNOWN_ORDER_TOTAL.with_label_values(&[callback]).inc();
    }

    pub fn venue_rejection() {
        VENUE_REJECTIONS_TOTAL.inc();
    }

    pub fn registry_fault(kind: &str) {
        REGISTRY_FAULTS_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn stale_book(instrument: &str) {
        STALE_BOOKS_TOTAL.with_label_values(&[instrument]).inc();
    }

    pub fn fees_total(total: f64) {
        FEES_TOTAL.set(total);
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&prometheus::gather(), &mut buffer)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_recorded_metrics() {
        Metrics::command_sent("insert");
        Metrics::cancel_issued("arbitrage");
        Metrics::resting("buy", 3, 30);

        let text = Metrics::render().unwrap();
        assert!(text.contains("pairmm_commands_sent_total"));
        assert!(text.contains("reason=\"arbitrage\""));
        assert!(text.contains("pairmm_resting_volume"));
    }

    #[test]
    fn test_counter_increments() {
        let before = COMMANDS_SENT_TOTAL.with_label_values(&["hedge"]).get();
        Metrics::command_sent("hedge");
        Metrics::command_sent("hedge");
        assert_eq!(
            COMMANDS_SENT_TOTAL.with_label_values(&["hedge"]).get(),
            before + 2
        );
    }
}
