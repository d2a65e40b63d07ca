//! The consumer: an asynchronous driver loop over a [`Queue`] of items.
//!
//! One engine implements the lifecycle; what happens inside a tick is
//! delegated to a [`TickStrategy`].
//!
//! ```text
//!  INIT ──run()──▶ RUNNING ──stop() / max_time / inactivity──▶ STOPPING ──drain──▶ STOPPED
//!                    │  ▲
//!                    ▼  │  wait for input
//!                   tick:
//!                     preprocess   items → documents      (filter, tokenize)
//!                     clock        documents → now
//!                     update_state stores, clustering
//!                     detect       tracking, dormancy, bursts, admission
//!                     emit         timeline, eviction
//! ```
//!
//! Cancellation is cooperative. [`StopHandle::stop`] is observed at the
//! next suspension point (initial wait, or waiting for input); a tick in
//! progress always completes. After leaving `RUNNING` the engine performs
//! exactly one final tick over whatever is still queued.

pub mod checkpoints;
pub mod preprocess;
pub mod terms;
pub mod topics;
pub mod volume;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tdt_core::cluster::{ClusterId, TemporalClustering};
use tdt_core::document::Document;
use tdt_core::timeline::Timeline;
use tdt_core::vector::{normalize, TermWeights};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::models::Item;
use crate::queue::Queue;
use crate::report::{NoReport, TopicEvent, TopicReporter};

pub use checkpoints::CheckpointStrategy;
pub use preprocess::{Prepared, Preprocessor};
pub use terms::TermTrackingStrategy;
pub use volume::VolumeStrategy;

/// Lifecycle of a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsumerState {
    Init,
    Running,
    Stopping,
    Stopped,
}

/// Why a run left the `RUNNING` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// [`StopHandle::stop`] was called.
    Stopped,
    /// `max_time` elapsed.
    MaxTime,
    /// No input arrived within `max_inactivity`.
    Inactivity,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StopReason::Stopped => "stopped",
            StopReason::MaxTime => "max time",
            StopReason::Inactivity => "inactivity",
        };
        f.write_str(s)
    }
}

/// Time budgets of one run.
#[derive(Debug, Clone, Copy)]
pub struct RunLimits {
    /// Pause before the first wait for input.
    pub initial_wait: Duration,
    /// Upper bound on the `RUNNING` phase.
    pub max_time: Duration,
    /// Stop after this long without input. `None` waits forever.
    pub max_inactivity: Option<Duration>,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            initial_wait: Duration::ZERO,
            max_time: Duration::from_secs(3600),
            max_inactivity: Some(Duration::from_secs(60)),
        }
    }
}

/// Result of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Items taken off the queue.
    pub consumed: u64,
    /// Items rejected by the validity filter.
    pub filtered: u64,
    /// Documents ignored for being older than one window.
    pub skipped: u64,
    pub stop_reason: StopReason,
    pub timeline: Timeline,
}

/// A cluster found to be breaking, with its topic.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub cluster: ClusterId,
    /// Term → burst for the terms that made the cluster break.
    pub terms: TermWeights,
}

/// What [`TickStrategy::update_state`] did with a batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    /// Clusters that received documents.
    pub changed: Vec<ClusterId>,
    /// Documents ignored for being too old.
    pub skipped: usize,
}

/// The per-tick behaviour of a consumer.
///
/// The engine calls the four steps in order once per tick. A strategy
/// owns all of its state (stores, clusters, tracked topics) and is the
/// only writer to it.
#[async_trait]
pub trait TickStrategy: Send {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Filter raw items and convert the survivors into documents.
    async fn preprocess(&mut self, items: Vec<Item>) -> Prepared;

    /// Fold documents into the strategy's state.
    async fn update_state(&mut self, documents: &[Arc<Document>], now: i64) -> StateUpdate;

    /// Find breaking clusters among those that changed.
    async fn detect(&mut self, changed: &[ClusterId], now: i64) -> Vec<Detection>;

    /// Add detections to the timeline and evict expired state. Returns the
    /// detections that made it into the timeline.
    async fn emit(
        &mut self,
        detections: Vec<Detection>,
        now: i64,
        timeline: &mut Timeline,
    ) -> Vec<Detection>;

    /// The clustering engine, for reporting.
    fn clusters(&self) -> &TemporalClustering;
}

/// Cloneable handle that asks a running consumer to stop.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request a graceful stop. Idempotent.
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`stop`](StopHandle::stop) has been called.
    pub async fn stopped(&self) {
        let mut rx = self.tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                // the sender lives as long as `self`
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}

const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

enum Wake {
    Input,
    Stop(StopReason),
}

/// Drives a [`TickStrategy`] over a queue until told to stop.
pub struct Consumer<S: TickStrategy> {
    queue: Arc<Queue<Item>>,
    strategy: S,
    clock: Box<dyn Clock>,
    reporter: Box<dyn TopicReporter>,
    timeline: Timeline,
    state: ConsumerState,
    stop: StopHandle,
    consumed: u64,
    filtered: u64,
    skipped: u64,
}

impl<S: TickStrategy> Consumer<S> {
    /// Build a consumer in the `INIT` state. `expiry` configures the
    /// timeline it builds.
    pub fn new(queue: Arc<Queue<Item>>, strategy: S, clock: Box<dyn Clock>, expiry: i64) -> Self {
        Self {
            queue,
            strategy,
            clock,
            reporter: Box::new(NoReport),
            timeline: Timeline::new(expiry),
            state: ConsumerState::Init,
            stop: StopHandle::new(),
            consumed: 0,
            filtered: 0,
            skipped: 0,
        }
    }

    pub fn with_reporter(mut self, reporter: Box<dyn TopicReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// A handle that can stop this consumer from another task.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Request a graceful stop.
    pub fn stop(&self) {
        self.stop.stop();
    }

    fn transition(&mut self, next: ConsumerState) {
        debug!(from = ?self.state, to = ?next, strategy = self.strategy.name(), "consumer state");
        self.state = next;
    }

    /// Consume until stopped, out of time, or idle; then drain once and
    /// return the counts and the timeline.
    pub async fn run(mut self, limits: RunLimits) -> RunSummary {
        self.transition(ConsumerState::Running);
        info!(
            strategy = self.strategy.name(),
            max_time = ?limits.max_time,
            max_inactivity = ?limits.max_inactivity,
            "consumer started"
        );

        let reason = self.consume(limits).await;

        self.transition(ConsumerState::Stopping);
        info!(reason = %reason, queued = self.queue.len(), "consumer stopping");
        self.tick().await;
        self.transition(ConsumerState::Stopped);

        info!(
            consumed = self.consumed,
            filtered = self.filtered,
            skipped = self.skipped,
            nodes = self.timeline.len(),
            "consumer stopped"
        );
        self.reporter.report(TopicEvent::Finished {
            consumed: self.consumed,
            filtered: self.filtered,
            skipped: self.skipped,
            reason: reason.to_string(),
        });

        RunSummary {
            consumed: self.consumed,
            filtered: self.filtered,
            skipped: self.skipped,
            stop_reason: reason,
            timeline: self.timeline,
        }
    }

    async fn consume(&mut self, limits: RunLimits) -> StopReason {
        let stop = self.stop.clone();

        if !limits.initial_wait.is_zero() {
            tokio::select! {
                biased;
                _ = stop.stopped() => return StopReason::Stopped,
                _ = tokio::time::sleep(limits.initial_wait) => {}
            }
        }

        let deadline = Instant::now()
            .checked_add(limits.max_time)
            .unwrap_or_else(|| Instant::now() + FAR_FUTURE);
        loop {
            let queue = Arc::clone(&self.queue);
            let wake = tokio::select! {
                biased;
                _ = stop.stopped() => Wake::Stop(StopReason::Stopped),
                _ = tokio::time::sleep_until(deadline) => Wake::Stop(StopReason::MaxTime),
                ready = queue.wait_for_input(limits.max_inactivity) => {
                    if ready { Wake::Input } else { Wake::Stop(StopReason::Inactivity) }
                }
            };

            match wake {
                Wake::Input => self.tick().await,
                Wake::Stop(reason) => return reason,
            }
        }
    }

    /// One pass over everything currently queued.
    async fn tick(&mut self) {
        let items = self.queue.dequeue_all();
        if items.is_empty() {
            return;
        }
        self.consumed += items.len() as u64;

        let prepared = self.strategy.preprocess(items).await;
        self.filtered += prepared.filtered as u64;
        if prepared.documents.is_empty() {
            return;
        }

        self.clock.observe(&prepared.documents);
        let now = self.clock.now();

        let update = self.strategy.update_state(&prepared.documents, now).await;
        self.skipped += update.skipped as u64;

        let detections = self.strategy.detect(&update.changed, now).await;
        let added = self
            .strategy
            .emit(detections, now, &mut self.timeline)
            .await;

        debug!(
            now,
            documents = prepared.documents.len(),
            filtered = prepared.filtered,
            skipped = update.skipped,
            changed = update.changed.len(),
            added = added.len(),
            "tick"
        );

        for detection in added {
            let size = self
                .strategy
                .clusters()
                .get(detection.cluster)
                .map_or(0, |c| c.size());
            let mut terms: Vec<(String, f64)> = detection.terms.into_iter().collect();
            terms.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            self.reporter.report(TopicEvent::Reported {
                at: now,
                node: self.timeline.len().saturating_sub(1),
                cluster: detection.cluster,
                size,
                terms: terms.into_iter().map(|(t, _)| t).collect(),
            });
        }
    }
}

/// When a cluster's bursty terms make it a topic: at least `min_terms`
/// terms, or a mean burst above `min_mean_burst`.
#[derive(Debug, Clone, Copy)]
pub struct BreakingRule {
    pub min_terms: usize,
    pub min_mean_burst: f64,
}

impl BreakingRule {
    pub fn is_breaking(&self, terms: &TermWeights) -> bool {
        if terms.is_empty() {
            return false;
        }
        let mean = terms.values().sum::<f64>() / terms.len() as f64;
        terms.len() >= self.min_terms || mean > self.min_mean_burst
    }
}

/// Mark each detected cluster bursty and add it to the timeline with its
/// unit-length topic vector. Shared by the strategies' `emit` step.
pub(crate) fn publish(
    clusters: &mut TemporalClustering,
    detections: Vec<Detection>,
    now: i64,
    timeline: &mut Timeline,
) -> Vec<Detection> {
    let mut added = Vec::new();
    for detection in detections {
        let Some(cluster) = clusters.get_mut(detection.cluster) else {
            continue;
        };
        cluster.bursty = true;

        let mut topic = detection.terms.clone();
        normalize(&mut topic);
        if timeline.add(now, cluster, topic) {
            info!(
                cluster = detection.cluster,
                size = cluster.size(),
                terms = detection.terms.len(),
                node = timeline.len().saturating_sub(1),
                "topic added to timeline"
            );
            added.push(detection);
        }
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use tdt_core::vector::from_pairs;

    #[test]
    fn test_breaking_rule() {
        let rule = BreakingRule {
            min_terms: 3,
            min_mean_burst: 0.9,
        };
        assert!(!rule.is_breaking(&TermWeights::new()));
        assert!(!rule.is_breaking(&from_pairs([("a", 0.6), ("b", 0.7)])));
        assert!(rule.is_breaking(&from_pairs([("a", 0.6), ("b", 0.7), ("c", 0.5)])));
        assert!(rule.is_breaking(&from_pairs([("a", 0.95)])));
    }

    #[tokio::test]
    async fn test_stop_handle() {
        let handle = StopHandle::new();
        assert!(!handle.is_stopped());
        let waiter = handle.clone();
        let task = tokio::spawn(async move { waiter.stopped().await });
        handle.stop();
        handle.stop();
        task.await.unwrap();
        assert!(handle.is_stopped());
    }

    fn consumer(queue: Arc<Queue<Item>>) -> Consumer<TermTrackingStrategy> {
        let mut config = crate::config::Config::default();
        config.admission.filtering = tdt_core::admission::FilteringLevel::None;
        let preprocessor = Preprocessor::new(
            crate::filter::ItemFilter::new(config.admission.filtering),
            Arc::new(tdt_core::document::WordTokenizer::default()),
            Arc::new(tdt_core::document::TermFrequency),
        );
        let strategy = TermTrackingStrategy::from_config(&config, preprocessor).unwrap();
        Consumer::new(
            queue,
            strategy,
            Box::new(crate::clock::StreamClock::new()),
            config.timeline.expiry,
        )
    }

    fn limits(max_time: Duration, max_inactivity: Option<Duration>) -> RunLimits {
        RunLimits {
            initial_wait: Duration::ZERO,
            max_time,
            max_inactivity,
        }
    }

    #[tokio::test]
    async fn test_run_stops_on_inactivity() {
        let queue = Arc::new(Queue::new());
        queue.enqueue([Item::new("storm", 1), Item::new("flood", 2)]);
        let consumer = consumer(Arc::clone(&queue));
        assert_eq!(consumer.state(), ConsumerState::Init);

        let summary = consumer
            .run(limits(Duration::from_secs(60), Some(Duration::from_millis(30))))
            .await;
        assert_eq!(summary.stop_reason, StopReason::Inactivity);
        assert_eq!(summary.consumed, 2);
        assert_eq!(summary.filtered, 0);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_stop_before_run_still_drains() {
        let queue = Arc::new(Queue::new());
        let consumer = consumer(Arc::clone(&queue));
        queue.enqueue([Item::new("storm", 1), Item::new("flood", 2), Item::new("bad", -3)]);
        consumer.stop();

        let summary = consumer.run(limits(Duration::from_secs(60), None)).await;
        assert_eq!(summary.stop_reason, StopReason::Stopped);
        assert_eq!(summary.consumed, 3);
        assert_eq!(summary.filtered, 1);
    }

    #[tokio::test]
    async fn test_run_stops_at_max_time() {
        let queue = Arc::new(Queue::new());
        let summary = consumer(queue)
            .run(limits(Duration::from_millis(30), None))
            .await;
        assert_eq!(summary.stop_reason, StopReason::MaxTime);
        assert_eq!(summary.consumed, 0);
        assert!(summary.timeline.is_empty());
    }

    #[tokio::test]
    async fn test_stop_interrupts_initial_wait() {
        let queue = Arc::new(Queue::new());
        let consumer = consumer(queue);
        let handle = consumer.stop_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.stop();
        });

        let run = consumer.run(RunLimits {
            initial_wait: Duration::from_secs(30),
            max_time: Duration::from_secs(60),
            max_inactivity: None,
        });
        let summary = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .unwrap();
        assert_eq!(summary.stop_reason, StopReason::Stopped);
    }

    #[tokio::test]
    async fn test_stop_from_another_task() {
        let queue = Arc::new(Queue::new());
        let consumer = consumer(Arc::clone(&queue));
        let handle = consumer.stop_handle();
        let task = tokio::spawn(consumer.run(limits(Duration::from_secs(60), None)));

        queue.enqueue([Item::new("storm", 1)]);
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.stop();

        let summary = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.stop_reason, StopReason::Stopped);
        assert_eq!(summary.consumed, 1);
    }

    #[test]
    fn test_stop_reason_display() {
        assert_eq!(StopReason::Inactivity.to_string(), "inactivity");
        assert_eq!(StopReason::MaxTime.to_string(), "max time");
    }
}
