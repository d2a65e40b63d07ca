//! Volume-spike strategy.
//!
//! Only the number of documents per second decides whether something is
//! happening. While the stream volume spikes, every admitted cluster that
//! grew during the emerging half of the spike is reported, with its
//! rescaled centroid as the topic.
//!
//! ```text
//!   documents ──damped count──▶ volume store ──SpikeDetector──▶ Spike { start, end }
//!                │                                                  │
//!                └──clustering──▶ changed ──admission──▶ last_updated >= start
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tdt_core::admission::AdmissionFilter;
use tdt_core::cluster::{ClusterId, TemporalClustering};
use tdt_core::document::Document;
use tdt_core::spike::SpikeDetector;
use tdt_core::store::{MemoryStore, NutritionStore, Volume};
use tdt_core::timeline::Timeline;
use tdt_core::vector::rescale;
use tracing::debug;

use super::preprocess::{Prepared, Preprocessor};
use super::{publish, Detection, StateUpdate, TickStrategy};
use crate::config::Config;
use crate::damping::Damping;
use crate::models::Item;

pub struct VolumeStrategy {
    preprocessor: Preprocessor,
    damping: Damping,
    volume: MemoryStore<Volume>,
    clustering: TemporalClustering,
    admission: AdmissionFilter,
    detector: SpikeDetector,
    window_size: i64,
    retention: i64,
}

impl VolumeStrategy {
    pub fn from_config(config: &Config, preprocessor: Preprocessor) -> tdt_core::Result<Self> {
        config.validate()?;
        let d = &config.detection;
        let a = &config.admission;
        Ok(Self {
            preprocessor,
            damping: Damping::new(d.damping)?,
            volume: MemoryStore::new(),
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
            detector: SpikeDetector::new(d.spike_windows.clone(), d.post_rate)?,
            window_size: config.nutrition.window_size,
            retention: config.retention(),
        })
    }

    pub fn volume(&self) -> &MemoryStore<Volume> {
        &self.volume
    }
}

#[async_trait]
impl TickStrategy for VolumeStrategy {
    fn name(&self) -> &str {
        "volume"
    }

    async fn preprocess(&mut self, items: Vec<Item>) -> Prepared {
        self.preprocessor.prepare(items)
    }

    async fn update_state(&mut self, documents: &[Arc<Document>], now: i64) -> StateUpdate {
        let mut fresh = Vec::with_capacity(documents.len());
        for document in documents {
            if now.saturating_sub(document.timestamp) >= self.window_size {
                continue;
            }
            let ts = document.timestamp;
            self.volume
                .add(ts, self.volume.get(ts) + self.damping.weight(document));
            fresh.push(Arc::clone(document));
        }

        StateUpdate {
            skipped: documents.len() - fresh.len(),
            changed: self.clustering.cluster(&fresh),
        }
    }

    async fn detect(&mut self, changed: &[ClusterId], now: i64) -> Vec<Detection> {
        let admitted = self
            .admission
            .admit(self.clustering.select_mut(changed), now);

        // the current second is part of the recent half
        let Some(spike) = self.detector.detect(&self.volume, now.saturating_add(1)) else {
            return Vec::new();
        };
        debug!(?spike, "volume spike");

        admitted
            .into_iter()
            .filter_map(|id| self.clustering.get(id))
            .filter(|cluster| cluster.last_updated() >= spike.start)
            .map(|cluster| Detection {
                cluster: cluster.id(),
                terms: rescale(cluster.centroid()),
            })
            .collect()
    }

    async fn emit(
        &mut self,
        detections: Vec<Detection>,
        now: i64,
        timeline: &mut Timeline,
    ) -> Vec<Detection> {
        let added = publish(&mut self.clustering, detections, now, timeline);

        self.volume
            .remove_older_than(now.saturating_sub(self.detector.span()));
        self.clustering
            .discard_frozen_before(now.saturating_sub(self.retention));
        added
    }

    fn clusters(&self) -> &TemporalClustering {
        &self.clustering
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::ItemFilter;
    use tdt_core::admission::FilteringLevel;
    use tdt_core::document::{TermFrequency, WordTokenizer};

    fn strategy() -> VolumeStrategy {
        let mut config = Config::default();
        config.detection.strategy = crate::config::StrategyKind::Volume;
        config.nutrition.window_size = 10;
        config.nutrition.windows = 3;
        config.detection.spike_windows = vec![10];
        config.admission.filtering = FilteringLevel::None;
        config.clustering.freeze_period = 30;
        let preprocessor = Preprocessor::new(
            ItemFilter::new(config.admission.filtering),
            Arc::new(WordTokenizer::default()),
            Arc::new(TermFrequency),
        );
        VolumeStrategy::from_config(&config, preprocessor).unwrap()
    }

    async fn tick(
        strategy: &mut VolumeStrategy,
        texts: &[(&str, i64)],
        now: i64,
        timeline: &mut Timeline,
    ) -> (StateUpdate, Vec<Detection>) {
        let items = texts.iter().map(|(t, ts)| Item::new(*t, *ts)).collect();
        let prepared = strategy.preprocess(items).await;
        let update = strategy.update_state(&prepared.documents, now).await;
        let detections = strategy.detect(&update.changed, now).await;
        let added = strategy.emit(detections, now, timeline).await;
        (update, added)
    }

    const CHATTER: &str = "coffee morning commute";
    const QUAKE: &str = "earthquake shakes downtown";

    #[tokio::test]
    async fn test_steady_stream_reports_nothing() {
        let mut strategy = strategy();
        let mut timeline = Timeline::new(90);
        // one full window of history first, so both halves are populated
        let history: Vec<(&str, i64)> = (0..10).map(|ts| (CHATTER, ts)).collect();
        tick(&mut strategy, &history, 9, &mut timeline).await;
        for ts in 10..30 {
            tick(&mut strategy, &[(CHATTER, ts)], ts, &mut timeline).await;
        }
        assert!(timeline.is_empty());
        assert_eq!(strategy.volume().get(29), 1.0);
        assert!(strategy.volume().len() <= 11);
    }

    #[tokio::test]
    async fn test_spike_reports_growing_cluster() {
        let mut strategy = strategy();
        let mut timeline = Timeline::new(90);
        for ts in 0..5 {
            tick(&mut strategy, &[(CHATTER, ts)], ts, &mut timeline).await;
        }
        let (_, added) = tick(
            &mut strategy,
            &[(QUAKE, 5), (QUAKE, 5), (QUAKE, 5), (QUAKE, 5)],
            5,
            &mut timeline,
        )
        .await;

        assert_eq!(added.len(), 1);
        assert!(added[0].terms.contains_key("earthquake"));
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.nodes()[0].entries[0].documents.len(), 4);
    }

    #[tokio::test]
    async fn test_stale_documents_are_skipped() {
        let mut strategy = strategy();
        let mut timeline = Timeline::new(90);
        let (update, _) = tick(
            &mut strategy,
            &[(CHATTER, 0), (CHATTER, 30)],
            30,
            &mut timeline,
        )
        .await;
        assert_eq!(update.skipped, 1);
        assert_eq!(strategy.volume().get(0), 0.0);
    }
}
