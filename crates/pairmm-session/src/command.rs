//! Outbound order commands and the sink trait that carries them.
//!
//! The sink abstracts the venue session so the quoting engine can be driven
//! by a live session, a replay journal, or a recording mock in tests.

use pairmm_core::{Lifespan, OrderId, Price, Side, Volume};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

/// Outbound command. Each one consumes one unit of message budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// New order on the tradeable instrument.
    InsertOrder {
        order_id: OrderId,
        side: Side,
        price: Price,
        volume: Volume,
        lifespan: Lifespan,
    },
    CancelOrder {
        order_id: OrderId,
    },
    /// Reduce the remaining volume of a resting order.
    AmendOrder {
        order_id: OrderId,
        volume: Volume,
    },
    /// Order on the reference instrument offsetting a fill.
    HedgeOrder {
        order_id: OrderId,
        side: Side,
        price: Price,
        volume: Volume,
    },
}

impl Command {
    /// Label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InsertOrder { .. } => "insert",
            Self::CancelOrder { .. } => "cancel",
            Self::AmendOrder { .. } => "amend",
            Self::HedgeOrder { .. } => "hedge",
        }
    }

    pub fn order_id(&self) -> OrderId {
        match self {
            Self::InsertOrder { order_id, .. }
            | Self::CancelOrder { order_id }
            | Self::AmendOrder { order_id, .. }
            | Self::HedgeOrder { order_id, .. } => *order_id,
        }
    }

    /// Cancels are never held back by the non-cancel budget.
    pub fn is_cancel(&self) -> bool {
        matches!(self, Self::CancelOrder { .. })
    }
}

/// Result of handing a command to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendResult {
    /// Accepted by the session for transmission.
    Sent,
    /// Session is disconnected.
    Disconnected,
    /// Session-side rate limit hit.
    RateLimited,
    /// Send failed with error.
    Error(String),
}

impl SendResult {
    /// Check if the send was successful.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, SendResult::Sent)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Disconnected => "disconnected",
            Self::RateLimited => "rate_limited",
            Self::Error(_) => "error",
        }
    }
}

/// Transport for outbound commands.
///
/// `send` is synchronous: the engine runs on one thread and commands must
/// leave in issuance order.
pub trait CommandSink: Send + Sync {
    fn send(&self, command: &Command) -> SendResult;

    /// Check if the session is ready for sending.
    fn is_ready(&self) -> bool {
        true
    }
}

/// Sink that records every command it is given.
pub struct RecordingSink {
    sent: Mutex<Vec<Command>>,
    next_result: Mutex<SendResult>,
    ready: AtomicBool,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            next_result: Mutex::new(SendResult::Sent),
            ready: AtomicBool::new(true),
        }
    }

    /// Set the result returned for subsequent sends.
    pub fn set_next_result(&self, result: SendResult) {
        *self.next_result.lock() = result;
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Copy of every command recorded so far.
    pub fn sent(&self) -> Vec<Command> {
        self.sent.lock().clone()
    }

    /// Drain recorded commands.
    pub fn take(&self) -> Vec<Command> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }
}

impl CommandSink for RecordingSink {
    fn send(&self, command: &Command) -> SendResult {
        self.sent.lock().push(command.clone());
        self.next_result.lock().clone()
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> OrderId {
        OrderId::new(raw).unwrap()
    }

    #[test]
    fn test_command_json_shape() {
        let cmd = Command::InsertOrder {
            order_id: id(3),
            side: Side::Buy,
            price: Price::new(9_900),
            volume: Volume::new(10),
            lifespan: Lifespan::GoodForDay,
        };
        let json: serde_json::Value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["type"], "insert_order");
        assert_eq!(json["order_id"], 3);
        assert_eq!(json["side"], "buy");
        assert_eq!(json["price"], 9_900);
        assert_eq!(json["lifespan"], "good_for_day");
    }

    #[test]
    fn test_command_kind_and_id() {
        let cancel = Command::CancelOrder { order_id: id(9) };
        assert_eq!(cancel.kind(), "cancel");
        assert_eq!(cancel.order_id(), id(9));
        assert!(cancel.is_cancel());

        let hedge = Command::HedgeOrder {
            order_id: id(10),
            side: Side::Sell,
            price: Price::new(100),
            volume: Volume::new(10),
        };
        assert_eq!(hedge.kind(), "hedge");
        assert!(!hedge.is_cancel());
    }

    #[test]
    fn test_recording_sink() {
        let sink = RecordingSink::new();
        let cmd = Command::CancelOrder { order_id: id(1) };
        assert!(sink.send(&cmd).is_success());

        sink.set_next_result(SendResult::Disconnected);
        assert_eq!(sink.send(&cmd), SendResult::Disconnected);
        assert_eq!(sink.count(), 2);
        assert_eq!(sink.take().len(), 2);
        assert_eq!(sink.count(), 0);
    }
}
