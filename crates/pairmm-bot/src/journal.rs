//! Outbound command journal.
//!
//! `JournalSink` stands in for the venue session during replay: every
//! command handed to it is written as one JSON line with a timestamp, or
//! logged when no journal file is configured.

use crate::error::AppResult;
use chrono::{DateTime, Utc};
use pairmm_session::{Command, CommandSink, SendResult};
use parking_lot::Mutex;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{info, warn};

#[derive(Serialize)]
struct JournalEntry<'a> {
    ts: DateTime<Utc>,
    command: &'a Command,
}

/// Command sink that journals instead of transmitting.
pub struct JournalSink {
    writer: Option<Mutex<BufWriter<File>>>,
    written: AtomicU64,
    connected: AtomicBool,
}

impl JournalSink {
    /// Journal to a file, truncating it.
    pub fn to_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let file = File::create(path.as_ref())?;
        Ok(Self {
            writer: Some(Mutex::new(BufWriter::new(file))),
            written: AtomicU64::new(0),
            connected: AtomicBool::new(true),
        })
    }

    /// Journal to the log only.
    pub fn to_log() -> Self {
        Self {
            writer: None,
            written: AtomicU64::new(0),
            connected: AtomicBool::new(true),
        }
    }

    /// Refuse every later command, as a closed session would.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Number of commands journaled.
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn flush(&self) -> AppResult<()> {
        if let Some(writer) = &self.writer {
            writer.lock().flush()?;
        }
        Ok(())
    }

    fn write(&self, command: &Command) -> AppResult<()> {
        let entry = JournalEntry {
            ts: Utc::now(),
            command,
        };
        let line = serde_json::to_string(&entry)?;
        match &self.writer {
            Some(writer) => writeln!(writer.lock(), "{line}")?,
            None => info!(command = %line, "Command"),
        }
        Ok(())
    }
}

impl CommandSink for JournalSink {
    fn send(&self, command: &Command) -> SendResult {
        if !self.is_ready() {
            return SendResult::Disconnected;
        }
        match self.write(command) {
            Ok(()) => {
                self.written.fetch_add(1, Ordering::Relaxed);
                SendResult::Sent
            }
            Err(e) => {
                warn!(error = %e, kind = command.kind(), "Journal write failed");
                SendResult::Error(e.to_string())
            }
        }
    }

    fn is_ready(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pairmm_core::{Lifespan, OrderId, Price, Side, Volume};

    fn insert() -> Command {
        Command::InsertOrder {
            order_id: OrderId::new(1).unwrap(),
            side: Side::Buy,
            price: Price::new(9_900),
            volume: Volume::new(10),
            lifespan: Lifespan::GoodForDay,
        }
    }

    #[test]
    fn test_journal_writes_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commands.jsonl");
        let sink = JournalSink::to_file(&path).unwrap();

        assert_eq!(sink.send(&insert()), SendResult::Sent);
        assert_eq!(
            sink.send(&Command::CancelOrder {
                order_id: OrderId::new(1).unwrap()
            }),
            SendResult::Sent
        );
        sink.flush().unwrap();
        assert_eq!(sink.written(), 2);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["command"]["type"], "insert_order");
        assert_eq!(lines[0]["command"]["price"], 9_900);
        assert_eq!(lines[0]["command"]["lifespan"], "good_for_day");
        assert_eq!(lines[1]["command"]["type"], "cancel_order");
        assert!(lines[0]["ts"].is_string());
    }

    #[test]
    fn test_disconnected_sink_refuses() {
        let sink = JournalSink::to_log();
        assert_eq!(sink.send(&insert()), SendResult::Sent);
        sink.disconnect();
        assert!(!sink.is_ready());
        assert_eq!(sink.send(&insert()), SendResult::Disconnected);
        assert_eq!(sink.written(), 1);
    }
}
