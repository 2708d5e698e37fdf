//! Sliding-window message-rate governor.
//!
//! The venue throttles outbound messages per rolling window. The governor
//! keeps one timestamp per message sent in the current window and tells the
//! quoting engine how many new (non-cancel) messages it may still afford.
//! Expiry is lazy: old timestamps are dropped whenever the governor is asked.

use crate::clock::Clock;
use crate::error::{SessionError, SessionResult};
use pairmm_telemetry::Metrics;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Venue throttle parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Hard cap on messages per window.
    #[serde(default = "default_max_messages")]
    pub max_messages: u32,
    /// Window length in milliseconds.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// Slots kept free on top of the reserved cancel slots.
    #[serde(default = "default_safety_margin")]
    pub safety_margin: u32,
}

fn default_max_messages() -> u32 {
    50
}

fn default_window_ms() -> u64 {
    1000
}

fn default_safety_margin() -> u32 {
    5
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            window_ms: default_window_ms(),
            safety_margin: default_safety_margin(),
        }
    }
}

impl ThrottleConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn validate(&self) -> SessionResult<()> {
        if self.max_messages == 0 {
            return Err(SessionError::InvalidConfig(
                "max_messages must be positive".to_string(),
            ));
        }
        if self.window_ms == 0 {
            return Err(SessionError::InvalidConfig(
                "window_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Rolling outbound message counter with a blocking backstop.
///
/// Owned by the engine context; all methods take `&mut self` and run on the
/// single processing thread.
pub struct MessageGovernor {
    config: ThrottleConfig,
    /// Slots held back so every resting order can still be cancelled.
    reserved_slots: u32,
    /// Send times within the window, oldest first.
    timestamps: VecDeque<std::time::Instant>,
    clock: Arc<dyn Clock>,
}

impl MessageGovernor {
    /// Create a governor for a ladder of `ladder_depth` levels per side.
    ///
    /// Two resting orders per level are reserved for cancellation.
    pub fn new(config: ThrottleConfig, ladder_depth: u32, clock: Arc<dyn Clock>) -> Self {
        let capacity = config.max_messages as usize;
        Self {
            config,
            reserved_slots: ladder_depth.saturating_mul(2),
            timestamps: VecDeque::with_capacity(capacity),
            clock,
        }
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    pub fn reserved_slots(&self) -> u32 {
        self.reserved_slots
    }

    /// Account one outbound message, sent now.
    ///
    /// Must be called once per command, before it is handed to the session.
    /// If the window is already full, blocks until the oldest entry ages
    /// out. Returns the time spent blocked.
    pub fn note_message(&mut self) -> Duration {
        let cap = self.config.max_messages as usize;
        let window = self.config.window();
        let mut waited = Duration::ZERO;

        loop {
            let now = self.clock.now();
            self.expire();

            if self.timestamps.len() < cap {
                self.timestamps.push_back(now);
                Metrics::governor_live(self.timestamps.len());
                return waited;
            }

            // Every live entry is younger than the window after expiry.
            let oldest_age = self
                .timestamps
                .front()
                .map(|&t| now.saturating_duration_since(t))
                .unwrap_or(window);
            let wait = window.saturating_sub(oldest_age).max(Duration::from_micros(1));

            warn!(
                live = self.timestamps.len(),
                cap,
                wait_ms = wait.as_secs_f64() * 1000.0,
                "Message window full, blocking before send"
            );
            Metrics::backstop_wait(wait.as_secs_f64() * 1000.0);
            self.clock.sleep(wait);
            waited += wait;
        }
    }

    /// Number of new (non-cancel) messages currently safe to send.
    ///
    /// `max(0, (cap - live - reserved - margin) / 2)`: half of the free
    /// capacity, since each insert may later need a matching cancel.
    pub fn non_cancel_budget(&mut self) -> u32 {
        self.expire();
        let free = i64::from(self.config.max_messages)
            - self.timestamps.len() as i64
            - i64::from(self.reserved_slots)
            - i64::from(self.config.safety_margin);
        let budget = (free.max(0) / 2) as u32;
        Metrics::non_cancel_budget(i64::from(budget));
        budget
    }

    /// Messages counted within the current window.
    pub fn live_count(&mut self) -> usize {
        self.expire();
        self.timestamps.len()
    }

    /// Messages that may still be sent before the hard cap.
    pub fn remaining_capacity(&mut self) -> u32 {
        let live = self.live_count() as u32;
        self.config.max_messages.saturating_sub(live)
    }

    fn expire(&mut self) {
        let now = self.clock.now();
        let window = self.config.window();
        while self
            .timestamps
            .front()
            .is_some_and(|&t| now.saturating_duration_since(t) >= window)
        {
            self.timestamps.pop_front();
        }
        Metrics::governor_live(self.timestamps.len());
    }
}

impl std::fmt::Debug for MessageGovernor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageGovernor")
            .field("config", &self.config)
            .field("reserved_slots", &self.reserved_slots)
            .field("live", &self.timestamps.len())
            .finish()
    }
}
