//! Replay of recorded streams.
//!
//! Items are read from a JSONL file (one [`Item`] per line) and fed to a
//! consumer running on the [`StreamClock`], so the result depends only on
//! the recording, not on how fast it is replayed.
//!
//! ```text
//!  file.jsonl ──read──▶ producer task ──enqueue──▶ Queue ──▶ Consumer ──▶ Timeline
//!                        (paced by gap / speed)
//! ```
//!
//! Items are grouped into batches of equal timestamp. With `speed > 0` the
//! producer sleeps `gap / speed` seconds between batches; with `speed == 0`
//! it hands over one batch at a time, waiting for the consumer to take the
//! previous one. Once the recording is exhausted the consumer is stopped
//! and drains whatever is left.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tdt_core::document::{TermFrequency, TermWeighting, Tokenizer, WordTokenizer};
use tdt_core::timeline::Timeline;
use tracing::{info, warn};

use crate::clock::StreamClock;
use crate::config::{Config, StrategyKind};
use crate::consumer::{
    CheckpointStrategy, Consumer, Preprocessor, RunLimits, RunSummary, StopHandle,
    TermTrackingStrategy, TickStrategy, VolumeStrategy,
};
use crate::filter::ItemFilter;
use crate::models::Item;
use crate::queue::Queue;
use crate::report::{format_ts_iso, ReportMode};

/// How to replay a recording.
#[derive(Debug, Clone, Copy)]
pub struct ReplayOptions {
    /// Stream seconds per wall-clock second; `0` replays as fast as the
    /// consumer allows.
    pub speed: f64,
    pub limits: RunLimits,
    pub report: ReportMode,
}

/// Read a JSONL recording, ordered by timestamp.
///
/// Blank lines are ignored; a malformed line fails the whole read with its
/// line number.
pub fn read_items(path: &Path) -> Result<Vec<Item>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read recording: {}", path.display()))?;

    let mut items = Vec::new();
    for (i, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let item: Item = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: invalid item", path.display(), i + 1))?;
        items.push(item);
    }
    items.sort_by_key(|item| item.timestamp);
    Ok(items)
}

/// Split time-ordered items into runs of equal timestamp.
fn batches(items: Vec<Item>) -> Vec<Vec<Item>> {
    let mut batches: Vec<Vec<Item>> = Vec::new();
    for item in items {
        match batches.last_mut() {
            Some(batch) if batch[0].timestamp == item.timestamp => batch.push(item),
            _ => batches.push(vec![item]),
        }
    }
    batches
}

/// Wall-clock pause for a `gap` of stream seconds. Saturates instead of
/// failing when `speed` is tiny.
fn pace(gap: i64, speed: f64) -> Duration {
    Duration::try_from_secs_f64(gap.max(0) as f64 / speed).unwrap_or(Duration::MAX)
}

async fn produce(queue: Arc<Queue<Item>>, items: Vec<Item>, speed: f64, stop: StopHandle) -> usize {
    let mut enqueued = 0;
    let mut previous: Option<i64> = None;

    for batch in batches(items) {
        if stop.is_stopped() {
            break;
        }
        let ts = batch[0].timestamp;

        if speed > 0.0 {
            if let Some(prev) = previous {
                tokio::select! {
                    _ = stop.stopped() => break,
                    _ = tokio::time::sleep(pace(ts - prev, speed)) => {}
                }
            }
        } else {
            tokio::select! {
                _ = stop.stopped() => break,
                _ = queue.wait_until_empty() => {}
            }
        }

        enqueued += batch.len();
        queue.enqueue(batch);
        previous = Some(ts);
    }

    // let the consumer take the last batch before asking it to stop
    tokio::select! {
        _ = stop.stopped() => {}
        _ = queue.wait_until_empty() => {}
    }
    stop.stop();
    enqueued
}

async fn drive<S>(
    consumer: Consumer<S>,
    queue: Arc<Queue<Item>>,
    items: Vec<Item>,
    options: ReplayOptions,
) -> RunSummary
where
    S: TickStrategy + 'static,
{
    let stop = consumer.stop_handle();
    let producer = tokio::spawn(produce(queue, items, options.speed, stop.clone()));

    let interrupt = {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, draining");
                stop.stop();
            }
        })
    };

    let summary = consumer.run(options.limits).await;

    stop.stop();
    interrupt.abort();
    match producer.await {
        Ok(enqueued) => info!(enqueued, "producer finished"),
        Err(e) => warn!(error = %e, "producer task failed"),
    }
    summary
}

/// Replay `items` through a consumer built from `config`.
pub async fn replay(config: &Config, items: Vec<Item>, options: ReplayOptions) -> Result<RunSummary> {
    if options.speed.is_nan() || options.speed < 0.0 {
        bail!("speed must be >= 0, got {}", options.speed);
    }

    let tokenizer: Arc<dyn Tokenizer> = Arc::new(WordTokenizer::default());
    let weighting: Arc<dyn TermWeighting> = Arc::new(TermFrequency);
    let preprocessor = Preprocessor::new(
        ItemFilter::new(config.admission.filtering),
        tokenizer,
        weighting,
    );

    let queue = Arc::new(Queue::new());
    let clock = Box::new(StreamClock::new());
    let expiry = config.timeline.expiry;

    info!(
        items = items.len(),
        strategy = ?config.detection.strategy,
        speed = options.speed,
        "replay started"
    );

    let summary = match config.detection.strategy {
        StrategyKind::Terms => {
            let strategy = TermTrackingStrategy::from_config(config, preprocessor)?;
            let consumer = Consumer::new(Arc::clone(&queue), strategy, clock, expiry)
                .with_reporter(options.report.reporter());
            drive(consumer, queue, items, options).await
        }
        StrategyKind::Clusters => {
            let strategy = CheckpointStrategy::from_config(config, preprocessor)?;
            let consumer = Consumer::new(Arc::clone(&queue), strategy, clock, expiry)
                .with_reporter(options.report.reporter());
            drive(consumer, queue, items, options).await
        }
        StrategyKind::Volume => {
            let strategy = VolumeStrategy::from_config(config, preprocessor)?;
            let consumer = Consumer::new(Arc::clone(&queue), strategy, clock, expiry)
                .with_reporter(options.report.reporter());
            drive(consumer, queue, items, options).await
        }
    };
    Ok(summary)
}

/// `tdt replay`: read, replay and print the timeline to stdout.
pub async fn run_replay(config: &Config, path: &Path, options: ReplayOptions, json: bool) -> Result<()> {
    let items = read_items(path)?;
    if items.is_empty() {
        println!("No items.");
        return Ok(());
    }

    let summary = replay(config, items, options).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_timeline(&summary.timeline);
        println!(
            "\n{} consumed, {} filtered, {} skipped ({})",
            summary.consumed, summary.filtered, summary.skipped, summary.stop_reason
        );
    }
    Ok(())
}

fn print_timeline(timeline: &Timeline) {
    if timeline.is_empty() {
        println!("No topics.");
        return;
    }

    for (i, node) in timeline.nodes().iter().enumerate() {
        println!(
            "node {}  {} .. {}  ({} topics)",
            i,
            format_ts_iso(node.created_at),
            format_ts_iso(node.last_updated),
            node.entries.len()
        );
        for entry in &node.entries {
            let mut terms: Vec<(&String, &f64)> = entry.topic.iter().collect();
            terms.sort_by(|a, b| b.1.total_cmp(a.1).then_with(|| a.0.cmp(b.0)));
            let terms: Vec<&str> = terms.into_iter().map(|(t, _)| t.as_str()).collect();
            println!(
                "  cluster {:<5} {:>4} docs  {}",
                entry.cluster,
                entry.documents.len(),
                terms.join(", ")
            );
        }
    }
}
