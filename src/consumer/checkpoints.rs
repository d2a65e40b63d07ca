//! Cluster-checkpoint strategy.
//!
//! Instead of tracking terms, this strategy burst-checks each admitted
//! cluster directly: the cluster's centroid is the "current" nutrition and
//! the history is a series of checkpoints, one per `window_size` seconds of
//! stream time.
//!
//! ```text
//!   buffer ──every window_size s──▶ checkpoint(t) = rescale(Σ damped vectors with ts ≤ t)
//!
//!   burst(term) = rescale(centroid)[term] − decayed mean over checkpoints before (now − ws, now]
//! ```
//!
//! Documents stay buffered until a checkpoint covers them. When the
//! stream jumps ahead, several checkpoints are created in one tick, empty
//! ones included, so history keeps a uniform spacing. Boundaries that
//! would already lie behind the retention horizon are never created.

use std::sync::Arc;

use async_trait::async_trait;
use tdt_core::admission::AdmissionFilter;
use tdt_core::burst::BurstDetector;
use tdt_core::cluster::{ClusterId, TemporalClustering};
use tdt_core::document::Document;
use tdt_core::store::{MemoryStore, NutritionSet, NutritionStore};
use tdt_core::timeline::Timeline;
use tdt_core::vector::{add_scaled, rescale, TermWeights};
use tracing::debug;

use super::preprocess::{Prepared, Preprocessor};
use super::{publish, BreakingRule, Detection, StateUpdate, TickStrategy};
use crate::config::Config;
use crate::damping::Damping;
use crate::models::Item;

pub struct CheckpointStrategy {
    preprocessor: Preprocessor,
    damping: Damping,
    buffer: Vec<Arc<Document>>,
    checkpoints: MemoryStore<NutritionSet>,
    last_checkpoint: Option<i64>,
    clustering: TemporalClustering,
    admission: AdmissionFilter,
    detector: BurstDetector,
    rule: BreakingRule,
    window_size: i64,
    windows: usize,
    burst_start: f64,
    retention: i64,
}

impl CheckpointStrategy {
    pub fn from_config(config: &Config, preprocessor: Preprocessor) -> tdt_core::Result<Self> {
        config.validate()?;
        let n = &config.nutrition;
        let d = &config.detection;
        let a = &config.admission;
        Ok(Self {
            preprocessor,
            damping: Damping::new(d.damping)?,
            buffer: Vec::new(),
            checkpoints: MemoryStore::new(),
            last_checkpoint: None,
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
            window_size: n.window_size,
            windows: n.windows,
            burst_start: d.burst_start,
            retention: config.retention(),
        })
    }

    pub fn checkpoints(&self) -> &MemoryStore<NutritionSet> {
        &self.checkpoints
    }

    /// Documents not yet covered by a checkpoint.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Create every checkpoint that is due at `now`. Returns how many.
    fn checkpoint(&mut self, now: i64) -> usize {
        let Some(mut last) = self
            .last_checkpoint
            .or_else(|| self.buffer.iter().map(|d| d.timestamp).min())
        else {
            return 0;
        };

        // Checkpoints before the horizon are evicted in this same tick, so
        // skip straight to the last boundary before it.
        let horizon = now.saturating_sub(self.retention);
        if horizon > last {
            last += (horizon - 1 - last) / self.window_size * self.window_size;
            self.buffer.retain(|d| d.timestamp > last);
        }

        let mut created = 0;
        while now.saturating_sub(last) >= self.window_size {
            last += self.window_size;

            let (covered, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.buffer)
                .into_iter()
                .partition(|d| d.timestamp <= last);
            self.buffer = rest;

            let mut set = NutritionSet::new();
            for document in &covered {
                add_scaled(&mut set, &document.vector, self.damping.weight(document));
            }
            self.checkpoints.add(last, rescale(&set));
            created += 1;
        }
        self.last_checkpoint = Some(last);
        created
    }
}

#[async_trait]
impl TickStrategy for CheckpointStrategy {
    fn name(&self) -> &str {
        "clusters"
    }

    async fn preprocess(&mut self, items: Vec<Item>) -> Prepared {
        self.preprocessor.prepare(items)
    }

    async fn update_state(&mut self, documents: &[Arc<Document>], now: i64) -> StateUpdate {
        self.buffer.extend(documents.iter().cloned());
        let created = self.checkpoint(now);
        if created > 0 {
            debug!(created, last = ?self.last_checkpoint, "checkpoints created");
        }

        let (fresh, stale): (Vec<_>, Vec<_>) = documents
            .iter()
            .cloned()
            .partition(|d| now - d.timestamp < self.window_size);

        StateUpdate {
            changed: self.clustering.cluster(&fresh),
            skipped: stale.len(),
        }
    }

    async fn detect(&mut self, changed: &[ClusterId], now: i64) -> Vec<Detection> {
        let admitted = self
            .admission
            .admit(self.clustering.select_mut(changed), now);

        let mut detections = Vec::new();
        for id in admitted {
            let Some(cluster) = self.clustering.get(id) else {
                continue;
            };
            let current = rescale(cluster.centroid());
            let terms: TermWeights = self
                .detector
                .detect(
                    &self.checkpoints,
                    &current,
                    now - self.window_size + 1,
                    self.windows,
                    self.burst_start,
                    None,
                )
                .into_iter()
                .map(|r| (r.term, r.burst))
                .collect();
            if self.rule.is_breaking(&terms) {
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
        self.checkpoints.remove_older_than(horizon);
        self.clustering.discard_frozen_before(horizon);
        added
    }

    fn clusters(&self) -> &TemporalClustering {
        &self.clustering
    }
}
