//! Main application orchestration.
//!
//! Replays a recorded session into the quoting engine:
//! - Session events read line by line from a JSON-lines file
//! - Each event dispatched to the engine in arrival order
//! - Outbound commands journaled through `JournalSink`
//! - Summary and metrics reported at exit

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::journal::JournalSink;
use pairmm_mm::{QuoteManager, SessionSummary};
use pairmm_session::{MessageGovernor, SessionEvent, SystemClock};
use pairmm_telemetry::Metrics;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

/// Main application.
pub struct Application {
    config: AppConfig,
    events_path: PathBuf,
    journal: Arc<JournalSink>,
}

impl Application {
    /// Create a new application. Fails on an invalid configuration or an
    /// unwritable journal.
    pub fn new(
        config: AppConfig,
        events_path: impl Into<PathBuf>,
        journal_path: Option<PathBuf>,
    ) -> AppResult<Self> {
        config.validate()?;
        let journal = match journal_path {
            Some(path) => {
                info!(path = %path.display(), "Journaling commands to file");
                JournalSink::to_file(path)?
            }
            None => JournalSink::to_log(),
        };

        Ok(Self {
            config,
            events_path: events_path.into(),
            journal: Arc::new(journal),
        })
    }

    /// Run the replay until the event stream ends or Ctrl-C.
    ///
    /// The engine is synchronous: when the message window is full the
    /// governor blocks the runtime thread until a slot frees up.
    pub async fn run(self) -> AppResult<SessionSummary> {
        info!(
            events = %self.events_path.display(),
            ladder_depth = self.config.maker.ladder_depth,
            position_limit = self.config.maker.position_limit,
            max_messages = self.config.throttle.max_messages,
            "Starting replay"
        );

        let governor = MessageGovernor::new(
            self.config.throttle.clone(),
            self.config.maker.ladder_depth,
            Arc::new(SystemClock),
        );
        let mut manager =
            QuoteManager::new(self.config.maker.clone(), governor, self.journal.clone());

        let file = File::open(&self.events_path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut line_no = 0u64;
        let mut event_count = 0u64;
        let mut rejected = 0u64;

        info!("Entering main event loop");
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        info!("End of event stream");
                        break;
                    };
                    line_no += 1;
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    match SessionEvent::from_json_line(trimmed) {
                        Ok(event) => {
                            event_count += 1;
                            self.dispatch(&mut manager, event);
                        }
                        Err(e) => {
                            rejected += 1;
                            warn!(line = line_no, error = %e, "Skipping malformed event");
                        }
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.journal.flush()?;
        let summary = manager.summary();
        info!(
            event_count,
            rejected,
            commands = self.journal.written(),
            position = summary.position,
            fills = summary.fill_count,
            fees = summary.fees_total,
            realized_pnl = %summary.realized_pnl,
            hedges_sent = summary.hedges_sent,
            hedges_failed = summary.hedges_failed,
            resting_bids = summary.resting_bids,
            resting_asks = summary.resting_asks,
            inert = summary.inert,
            "Shutting down"
        );
        info!(summary = %serde_json::to_string(&summary)?, "Session summary");
        match Metrics::render() {
            Ok(text) => debug!(metrics = %text, "Final metrics"),
            Err(e) => warn!(error = %e, "Failed to render metrics"),
        }

        Ok(summary)
    }

    fn dispatch(&self, manager: &mut QuoteManager, event: SessionEvent) {
        let disconnect = matches!(event, SessionEvent::Disconnect);
        manager.handle_event(event);
        if disconnect {
            self.journal.disconnect();
        }
    }
}
