//! Inbound session events.
//!
//! One variant per venue callback. Order ids arrive as raw integers because
//! the venue uses zero for "no order" on error callbacks.

use crate::error::SessionResult;
use pairmm_core::{BookSnapshot, Price, Volume};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Top-of-book snapshot for either instrument.
    OrderBook(BookSnapshot),
    /// Recent trades, aggregated by price level.
    TradeTicks(BookSnapshot),
    /// Order state change. `remaining_volume` zero is terminal.
    OrderStatus {
        order_id: u64,
        /// Cumulative filled volume.
        fill_volume: Volume,
        remaining_volume: Volume,
        /// Cumulative fees for this order (negative for rebates).
        #[serde(default)]
        fees: i64,
    },
    /// Fill of one of our orders on the tradeable instrument.
    OrderFilled {
        order_id: u64,
        price: Price,
        volume: Volume,
    },
    /// Hedge outcome. Zero price and volume means the hedge failed.
    HedgeFilled {
        order_id: u64,
        average_price: Price,
        volume: Volume,
    },
    Error {
        /// Zero when the error is not about a specific order.
        #[serde(default)]
        order_id: u64,
        message: String,
    },
    Disconnect,
}

impl SessionEvent {
    /// Parse one JSON line.
    pub fn from_json_line(line: &str) -> SessionResult<Self> {
        Ok(serde_json::from_str(line)?)
    }

    /// Label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OrderBook(_) => "order_book",
            Self::TradeTicks(_) => "trade_ticks",
            Self::OrderStatus { .. } => "order_status",
            Self::OrderFilled { .. } => "order_filled",
            Self::HedgeFilled { .. } => "hedge_filled",
            Self::Error { .. } => "error",
            Self::Disconnect => "disconnect",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pairmm_core::Instrument;

    #[test]
    fn test_parse_order_book() {
        let line = r#"{"type":"order_book","instrument":"reference","sequence":7,
            "ask_prices":[10100,10200,0,0,0],"ask_volumes":[50,40,0,0,0],
            "bid_prices":[10000,9900,0,0,0],"bid_volumes":[60,30,0,0,0]}"#;
        let event = SessionEvent::from_json_line(line).unwrap();
        match event {
            SessionEvent::OrderBook(book) => {
                assert_eq!(book.instrument, Instrument::Reference);
                assert_eq!(book.sequence, 7);
                assert_eq!(book.best_bid(), Some(Price::new(10_000)));
                assert_eq!(book.best_ask(), Some(Price::new(10_100)));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_parse_callbacks() {
        let status = SessionEvent::from_json_line(
            r#"{"type":"order_status","order_id":4,"fill_volume":10,"remaining_volume":0,"fees":-2}"#,
        )
        .unwrap();
        assert_eq!(
            status,
            SessionEvent::OrderStatus {
                order_id: 4,
                fill_volume: Volume::new(10),
                remaining_volume: Volume::ZERO,
                fees: -2,
            }
        );

        let error =
            SessionEvent::from_json_line(r#"{"type":"error","message":"bad session"}"#).unwrap();
        assert_eq!(
            error,
            SessionEvent::Error {
                order_id: 0,
                message: "bad session".to_string()
            }
        );

        let disconnect = SessionEvent::from_json_line(r#"{"type":"disconnect"}"#).unwrap();
        assert_eq!(disconnect.kind(), "disconnect");
    }

    #[test]
    fn test_parse_rejects_unknown_type() {
        assert!(SessionEvent::from_json_line(r#"{"type":"heartbeat"}"#).is_err());
        assert!(SessionEvent::from_json_line("not json").is_err());
    }
}
