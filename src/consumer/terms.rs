//! Term-tracking strategy.
//!
//! Bursty terms are tracked over the whole stream; clusters are reported
//! when enough of the tracked terms appear in their centroid.
//!
//! Per tick, with `t = now` and `ws = window_size`:
//!
//! 1. documents with `t - timestamp >= ws` are skipped; the rest add their
//!    damped weight to the volume, nutrition and correlation stores at
//!    their own timestamp and are clustered;
//! 2. tracked terms are re-scored against `burst_end` and dropped when no
//!    longer bursty;
//! 3. unless the stream is dormant, new terms bursting above
//!    `burst_start` start being tracked;
//! 4. changed clusters go through admission, and each admitted cluster
//!    whose tracked terms satisfy the breaking rule becomes a detection.
//!
//! Both burst checks compare the window `(t - ws, t]` against up to
//! `windows` earlier windows.

use std::sync::Arc;

use async_trait::async_trait;
use tdt_core::admission::AdmissionFilter;
use tdt_core::burst::BurstDetector;
use tdt_core::cluster::{ClusterId, TemporalClustering};
use tdt_core::document::Document;
use tdt_core::store::{Correlations, MemoryStore, NutritionSet, NutritionStore, Volume};
use tdt_core::timeline::Timeline;
use tdt_core::vector::add_scaled;
use tdt_core::window;
use tracing::{debug, info};

use super::preprocess::{Prepared, Preprocessor};
use super::topics::Topics;
use super::{publish, BreakingRule, Detection, StateUpdate, TickStrategy};
use crate::config::Config;
use crate::damping::Damping;
use crate::models::Item;

pub struct TermTrackingStrategy {
    preprocessor: Preprocessor,
    damping: Damping,
    volume: MemoryStore<Volume>,
    nutrition: MemoryStore<NutritionSet>,
    correlations: MemoryStore<Correlations>,
    clustering: TemporalClustering,
    admission: AdmissionFilter,
    detector: BurstDetector,
    rule: BreakingRule,
    topics: Topics,
    window_size: i64,
    windows: usize,
    burst_start: f64,
    burst_end: f64,
    min_volume: f64,
    retention: i64,
}

impl TermTrackingStrategy {
    pub fn from_config(config: &Config, preprocessor: Preprocessor) -> tdt_core::Result<Self> {
        config.validate()?;
        let n = &config.nutrition;
        let d = &config.detection;
        let a = &config.admission;
        Ok(Self {
            preprocessor,
            damping: Damping::new(d.damping)?,
            volume: MemoryStore::new(),
            nutrition: MemoryStore::new(),
            correlations: MemoryStore::new(),
            clustering: TemporalClustering::new(
                config.clustering.threshold,
                config.clustering.freeze_period,
            )?,
            admission: AdmissionFilter::new(
                a.filtering,
                a.min_size,
                a.cooldown,
                a.max_intra_similarity,
            )?,
            detector: BurstDetector::new(n.decay_rate)?,
            rule: BreakingRule {
                min_terms: d.min_topic_terms,
                min_mean_burst: d.min_topic_burst,
            },
            topics: Topics::new(),
            window_size: n.window_size,
            windows: n.windows,
            burst_start: d.burst_start,
            burst_end: d.burst_end,
            min_volume: d.min_volume,
            retention: config.retention(),
        })
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    pub fn volume(&self) -> &MemoryStore<Volume> {
        &self.volume
    }

    pub fn nutrition(&self) -> &MemoryStore<NutritionSet> {
        &self.nutrition
    }

    /// Correlations over the window ending at `now`.
    pub fn combine_correlations(&self, now: i64, normalize: bool) -> Correlations {
        window::correlations(&self.correlations, now, self.window_size, normalize)
    }

    fn record(&self, document: &Document) {
        let ts = document.timestamp;
        let weight = self.damping.weight(document);

        self.volume.add(ts, self.volume.get(ts) + weight);

        let mut nutrition = self.nutrition.get(ts);
        add_scaled(&mut nutrition, &document.vector, weight);
        self.nutrition.add(ts, nutrition);

        let mut correlations = self.correlations.get(ts);
        for a in document.vector.keys() {
            let row = correlations.entry(a.clone()).or_default();
            for b in document.vector.keys().filter(|b| *b != a) {
                *row.entry(b.clone()).or_insert(0.0) += weight;
            }
        }
        self.correlations.add(ts, correlations);
    }

    /// Current window and its history at `now`.
    fn windows_at(&self, now: i64) -> (NutritionSet, MemoryStore<NutritionSet>) {
        let current = window::nutrition(&self.nutrition, now, self.window_size);
        let history =
            window::nutrition_history(&self.nutrition, now, self.window_size, self.windows);
        (current, history)
    }

    /// Re-score tracked terms against `burst_end`; returns the dropped ones.
    fn track(
        &mut self,
        now: i64,
        current: &NutritionSet,
        history: &MemoryStore<NutritionSet>,
    ) -> Vec<String> {
        if self.topics.is_empty() {
            return Vec::new();
        }
        let tracked = self.topics.terms();
        let still = self.detector.detect(
            history,
            current,
            now - self.window_size + 1,
            self.windows,
            self.burst_end,
            Some(&tracked),
        );
        self.topics.filter(&still, now)
    }

    /// Look for terms bursting above `burst_start`; returns how many are new.
    fn discover(
        &mut self,
        now: i64,
        current: &NutritionSet,
        history: &MemoryStore<NutritionSet>,
    ) -> usize {
        let results = self.detector.detect(
            history,
            current,
            now - self.window_size + 1,
            self.windows,
            self.burst_start,
            None,
        );
        self.topics.update(&results, now)
    }
}

#[async_trait]
impl TickStrategy for TermTrackingStrategy {
    fn name(&self) -> &str {
        "terms"
    }

    async fn preprocess(&mut self, items: Vec<Item>) -> Prepared {
        self.preprocessor.prepare(items)
    }

    async fn update_state(&mut self, documents: &[Arc<Document>], now: i64) -> StateUpdate {
        let mut fresh = Vec::with_capacity(documents.len());
        let mut skipped = 0;
        for document in documents {
            if now - document.timestamp >= self.window_size {
                skipped += 1;
                continue;
            }
            self.record(document);
            fresh.push(Arc::clone(document));
        }

        StateUpdate {
            changed: self.clustering.cluster(&fresh),
            skipped,
        }
    }

    async fn detect(&mut self, changed: &[ClusterId], now: i64) -> Vec<Detection> {
        let (current, history) = self.windows_at(now);

        let dropped = self.track(now, &current, &history);
        if !dropped.is_empty() {
            info!(?dropped, "terms no longer bursty");
        }

        if window::is_dormant(&self.volume, now, self.window_size, self.min_volume) {
            debug!(now, "stream dormant");
        } else {
            let added = self.discover(now, &current, &history);
            if added > 0 {
                info!(added, tracked = self.topics.len(), "new bursty terms");
            }
        }

        let admitted = self
            .admission
            .admit(self.clustering.select_mut(changed), now);

        let mut detections = Vec::new();
        for id in admitted {
            let Some(cluster) = self.clustering.get(id) else {
                continue;
            };
            let terms = self.topics.within(cluster.centroid());
            if self.rule.is_breaking(&terms) {
                self.topics.assign(terms.keys(), id);
                detections.push(Detection { cluster: id, terms });
            }
        }
        detections
    }

    async fn emit(
        &mut self,
        detections: Vec<Detection>,
        now: i64,
        timeline: &mut Timeline,
    ) -> Vec<Detection> {
        let added = publish(&mut self.clustering, detections, now, timeline);

        let horizon = now.saturating_sub(self.retention);
        self.volume.remove_older_than(horizon);
        self.nutrition.remove_older_than(horizon);
        self.correlations.remove_older_than(horizon);
        let discarded = self.clustering.discard_frozen_before(horizon);
        if discarded > 0 {
            debug!(discarded, "frozen clusters discarded");
        }
        added
    }

    fn clusters(&self) -> &TemporalClustering {
        &self.clustering
    }
}
