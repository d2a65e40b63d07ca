//! End-to-end replays through the library API.

use std::time::Duration;

use tdt_core::admission::FilteringLevel;
use tdt_stream::config::{Config, StrategyKind};
use tdt_stream::consumer::{RunLimits, StopReason};
use tdt_stream::models::Item;
use tdt_stream::replay::{read_items, replay, ReplayOptions};
use tdt_stream::report::ReportMode;

const CHATTER: &str = "coffee morning commute";
const QUAKE: &str = "earthquake shakes downtown";

fn config(strategy: StrategyKind) -> Config {
    let mut config = Config::default();
    config.detection.strategy = strategy;
    config.nutrition.window_size = 10;
    config.nutrition.windows = 3;
    config.nutrition.sets = 5;
    config.detection.min_volume = 2.0;
    config.admission.filtering = FilteringLevel::None;
    config.clustering.freeze_period = 30;
    config.validate().unwrap();
    config
}

fn options() -> ReplayOptions {
    ReplayOptions {
        speed: 0.0,
        limits: RunLimits {
            initial_wait: Duration::ZERO,
            max_time: Duration::from_secs(60),
            max_inactivity: Some(Duration::from_secs(5)),
        },
        report: ReportMode::Off,
    }
}

/// One quiet post every ten seconds, then two posts a second about
/// something else.
fn stream() -> Vec<Item> {
    let mut items: Vec<Item> = (0..10).map(|i| Item::new(CHATTER, i * 10)).collect();
    for ts in 100..103 {
        items.push(Item::new(QUAKE, ts));
        items.push(Item::new(QUAKE, ts));
    }
    items
}

fn sorted_terms(topic: &std::collections::HashMap<String, f64>) -> Vec<String> {
    let mut terms: Vec<String> = topic.keys().cloned().collect();
    terms.sort();
    terms
}

#[tokio::test]
async fn test_term_tracking_reports_the_burst_only() {
    let summary = replay(&config(StrategyKind::Terms), stream(), options())
        .await
        .unwrap();

    assert_eq!(summary.consumed, 16);
    assert_eq!(summary.filtered, 0);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.stop_reason, StopReason::Stopped);

    let nodes = summary.timeline.nodes();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].created_at, 101);
    assert_eq!(nodes[0].entries.len(), 1);

    let entry = &nodes[0].entries[0];
    assert_eq!(
        sorted_terms(&entry.topic),
        vec!["downtown", "earthquake", "shakes"]
    );
    assert_eq!(entry.documents.len(), 4);
    let norm: f64 = entry.topic.values().map(|w| w * w).sum::<f64>().sqrt();
    assert!((norm - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_cluster_checkpoints_open_a_new_node() {
    let summary = replay(&config(StrategyKind::Clusters), stream(), options())
        .await
        .unwrap();

    let nodes = summary.timeline.nodes();
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0].created_at, 0);
    assert_eq!(nodes[1].created_at, 100);
    assert!(nodes[1].entries[0].topic.contains_key("earthquake"));
    assert!(nodes[0].created_at < nodes[1].created_at);
}

#[tokio::test]
async fn test_volume_spike_reports_the_burst() {
    let summary = replay(&config(StrategyKind::Volume), stream(), options())
        .await
        .unwrap();

    assert_eq!(summary.consumed, 16);
    let quake = summary
        .timeline
        .nodes()
        .iter()
        .flat_map(|node| node.entries.iter())
        .find(|entry| entry.topic.contains_key("earthquake"))
        .expect("the burst is on the timeline");
    assert_eq!(
        sorted_terms(&quake.topic),
        vec!["downtown", "earthquake", "shakes"]
    );
}

#[tokio::test]
async fn test_strict_filter_degenerate_run() {
    let mut config = config(StrategyKind::Terms);
    config.admission.filtering = FilteringLevel::Strict;

    let summary = replay(&config, stream(), options()).await.unwrap();
    assert_eq!(summary.consumed, 16);
    assert_eq!(summary.filtered, summary.consumed);
    assert!(summary.timeline.is_empty());
}

#[tokio::test]
async fn test_replay_from_jsonl() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stream.jsonl");
    let lines: Vec<String> = stream()
        .iter()
        .rev()
        .map(|item| serde_json::to_string(item).unwrap())
        .collect();
    std::fs::write(&path, lines.join("\n")).unwrap();

    let items = read_items(&path).unwrap();
    assert_eq!(items.len(), 16);
    assert!(items.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    let summary = replay(&config(StrategyKind::Terms), items, options())
        .await
        .unwrap();
    assert_eq!(summary.timeline.len(), 1);
}

#[tokio::test]
async fn test_summary_serializes() {
    let summary = replay(&config(StrategyKind::Terms), stream(), options())
        .await
        .unwrap();
    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["consumed"], 16);
    assert_eq!(json["stop_reason"], "stopped");
    assert_eq!(json["timeline"]["nodes"][0]["entries"][0]["documents"][0]["text"], QUAKE);
}
