//! Replay integration tests.
//!
//! Drives the full application over recorded event files:
//! - Ladder placement and journaling
//! - Fill, hedge and terminal status handling
//! - Disconnect and malformed lines

use pairmm_bot::{AppConfig, Application};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const REFERENCE_BOOK: &str = r#"{"type":"order_book","instrument":"reference","sequence":1,"ask_prices":[10100,10200,0,0,0],"ask_volumes":[50,40,0,0,0],"bid_prices":[10000,9900,0,0,0],"bid_volumes":[60,30,0,0,0]}"#;

fn write_events(dir: &TempDir, lines: &[&str]) -> PathBuf {
    let path = dir.path().join("events.jsonl");
    std::fs::write(&path, lines.join("\n")).unwrap();
    path
}

fn read_journal(path: &Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn depth3() -> AppConfig {
    let mut config = AppConfig::default();
    config.maker.ladder_depth = 3;
    config
}

#[tokio::test]
async fn test_replay_places_ladder() {
    let dir = tempfile::tempdir().unwrap();
    let events = write_events(&dir, &[REFERENCE_BOOK]);
    let journal = dir.path().join("commands.jsonl");

    let app = Application::new(depth3(), &events, Some(journal.clone())).unwrap();
    let summary = app.run().await.unwrap();

    assert_eq!(summary.resting_bids, 3);
    assert_eq!(summary.resting_asks, 3);
    assert_eq!(summary.position, 0);

    let commands = read_journal(&journal);
    assert_eq!(commands.len(), 6);
    let prices: Vec<u64> = commands
        .iter()
        .map(|c| c["command"]["price"].as_u64().unwrap())
        .collect();
    assert_eq!(prices, vec![9_900, 10_200, 9_800, 10_300, 9_700, 10_400]);
    assert!(commands
        .iter()
        .all(|c| c["command"]["type"] == "insert_order"));
}

#[tokio::test]
async fn test_replay_fill_is_hedged_once() {
    let dir = tempfile::tempdir().unwrap();
    // Order 1 is the front bid at 9900.
    let events = write_events(
        &dir,
        &[
            REFERENCE_BOOK,
            r#"{"type":"order_filled","order_id":1,"price":9900,"volume":10}"#,
            r#"{"type":"order_status","order_id":1,"fill_volume":10,"remaining_volume":0,"fees":2}"#,
            r#"{"type":"hedge_filled","order_id":7,"average_price":10000,"volume":10}"#,
        ],
    );
    let journal = dir.path().join("commands.jsonl");

    let app = Application::new(depth3(), &events, Some(journal.clone())).unwrap();
    let summary = app.run().await.unwrap();

    assert_eq!(summary.position, 10);
    assert_eq!(summary.fees_total, 2);
    assert_eq!(summary.hedges_sent, 1);
    assert_eq!(summary.hedged_volume.inner(), 10);
    assert_eq!(summary.resting_bids, 2);

    let commands = read_journal(&journal);
    let hedges: Vec<&Value> = commands
        .iter()
        .filter(|c| c["command"]["type"] == "hedge_order")
        .collect();
    assert_eq!(hedges.len(), 1);
    assert_eq!(hedges[0]["command"]["order_id"], 7);
    assert_eq!(hedges[0]["command"]["side"], "sell");
    assert_eq!(hedges[0]["command"]["price"], 100);
    assert_eq!(hedges[0]["command"]["volume"], 10);
}

#[tokio::test]
async fn test_replay_stops_acting_after_disconnect() {
    let dir = tempfile::tempdir().unwrap();
    let events = write_events(
        &dir,
        &[
            r#"{"type":"disconnect"}"#,
            REFERENCE_BOOK,
        ],
    );
    let journal = dir.path().join("commands.jsonl");

    let app = Application::new(depth3(), &events, Some(journal.clone())).unwrap();
    let summary = app.run().await.unwrap();

    assert!(summary.inert);
    assert_eq!(summary.commands_sent, 0);
    assert!(read_journal(&journal).is_empty());
}

#[tokio::test]
async fn test_replay_skips_malformed_lines() {
    let dir = tempfile::tempdir().unwrap();
    let events = write_events(
        &dir,
        &[
            "",
            "not json",
            r#"{"type":"heartbeat"}"#,
            REFERENCE_BOOK,
        ],
    );

    let app = Application::new(depth3(), &events, None).unwrap();
    let summary = app.run().await.unwrap();
    assert_eq!(summary.resting_bids + summary.resting_asks, 6);
}

#[tokio::test]
async fn test_invalid_config_refused() {
    let dir = tempfile::tempdir().unwrap();
    let events = write_events(&dir, &[REFERENCE_BOOK]);
    let mut config = AppConfig::default();
    config.maker.lot_size = 0;
    assert!(Application::new(config, &events, None).is_err());
}

#[tokio::test]
async fn test_missing_events_file() {
    let dir = tempfile::tempdir().unwrap();
    let app = Application::new(depth3(), dir.path().join("absent.jsonl"), None).unwrap();
    assert!(app.run().await.is_err());
}
