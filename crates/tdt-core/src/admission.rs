//! Cluster admission filter.
//!
//! Decides which of the clusters that changed in a tick are worth a burst
//! check. The rules, by [`FilteringLevel`]:
//!
//! | Rule | none | lenient | strict |
//! |------|:----:|:-------:|:------:|
//! | not already bursty | ✓ | ✓ | ✓ |
//! | `size >= min_size` | | ✓ | ✓ |
//! | `timestamp - last_checked > cooldown` (or never checked) | | ✓ | ✓ |
//! | `intra_similarity <= max_intra_similarity` | | | ✓ |
//! | average URLs per document `<= 1` | | | ✓ |
//! | fraction of replies `<= 0.5` | | | ✓ |
//!
//! Every evaluated cluster, admitted or not, has its `last_checked` set to
//! the evaluation timestamp. That is the filter's only side effect.

use serde::{Deserialize, Serialize};

use crate::cluster::{Cluster, ClusterId};
use crate::error::{ensure_range, Result, TdtError};

/// How aggressively items and clusters are filtered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilteringLevel {
    None,
    Lenient,
    #[default]
    Strict,
}

const MAX_URLS_PER_DOCUMENT: f64 = 1.0;
const MAX_REPLY_FRACTION: f64 = 0.5;

/// Gate between the clustering engine and the burst detector.
#[derive(Debug, Clone)]
pub struct AdmissionFilter {
    pub level: FilteringLevel,
    pub min_size: usize,
    pub cooldown: i64,
    pub max_intra_similarity: f64,
}

impl AdmissionFilter {
    pub fn new(
        level: FilteringLevel,
        min_size: usize,
        cooldown: i64,
        max_intra_similarity: f64,
    ) -> Result<Self> {
        if min_size == 0 {
            return Err(TdtError::config("min_size", "must be >= 1"));
        }
        if cooldown < 0 {
            return Err(TdtError::config("cooldown", "must be >= 0"));
        }
        ensure_range("max_intra_similarity", max_intra_similarity, 0.0, 1.0)?;
        Ok(Self {
            level,
            min_size,
            cooldown,
            max_intra_similarity,
        })
    }

    /// Evaluate `clusters` at `timestamp` and return the ids of those
    /// admitted, in input order.
    pub fn admit<'a, I>(&self, clusters: I, timestamp: i64) -> Vec<ClusterId>
    where
        I: IntoIterator<Item = &'a mut Cluster>,
    {
        let mut admitted = Vec::new();
        for cluster in clusters {
            if self.passes(cluster, timestamp) {
                admitted.push(cluster.id());
            }
            cluster.mark_checked(timestamp);
        }
        admitted
    }

    fn passes(&self, cluster: &Cluster, timestamp: i64) -> bool {
        if cluster.bursty {
            return false;
        }
        if self.level == FilteringLevel::None {
            return true;
        }

        if cluster.size() < self.min_size {
            return false;
        }
        if let Some(checked) = cluster.cooldown_reference(timestamp) {
            if timestamp - checked <= self.cooldown {
                return false;
            }
        }
        if self.level == FilteringLevel::Lenient {
            return true;
        }

        if cluster.intra_similarity() > self.max_intra_similarity {
            return false;
        }
        let size = cluster.size() as f64;
        let urls: usize = cluster.documents().iter().map(|d| d.meta.urls).sum();
        if urls as f64 / size > MAX_URLS_PER_DOCUMENT {
            return false;
        }
        let replies = cluster
            .documents()
            .iter()
            .filter(|d| d.meta.reply || d.text.starts_with('@'))
            .count();
        replies as f64 / size <= MAX_REPLY_FRACTION
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cluster::TemporalClustering;
    use crate::document::{Document, DocumentMeta};
    use crate::vector::from_pairs;

    fn doc(ts: i64, text: &str, pairs: &[(&str, f64)], meta: DocumentMeta) -> Arc<Document> {
        Arc::new(
            Document::new(
                format!("d{}", ts),
                ts,
                text,
                from_pairs(pairs.iter().map(|(t, w)| (*t, *w))),
                meta,
            )
            .unwrap(),
        )
    }

    /// One cluster of `n` documents that are similar but not identical.
    fn engine_with(n: i64, meta: DocumentMeta, text: &str) -> (TemporalClustering, Vec<ClusterId>) {
        let mut engine = TemporalClustering::new(0.1, 1000).unwrap();
        let docs: Vec<_> = (0..n)
            .map(|i| {
                let other = format!("t{}", i);
                doc(
                    i,
                    text,
                    &[("goal", 1.0), (other.as_str(), 1.0)],
                    meta.clone(),
                )
            })
            .collect();
        let changed = engine.cluster(&docs);
        (engine, changed)
    }

    fn strict() -> AdmissionFilter {
        AdmissionFilter::new(FilteringLevel::Strict, 3, 1, 0.8).unwrap()
    }

    #[test]
    fn test_admits_good_cluster() {
        let (mut engine, changed) = engine_with(4, DocumentMeta::default(), "goal");
        assert_eq!(strict().admit(engine.select_mut(&changed), 10), changed);
    }

    #[test]
    fn test_min_size() {
        let (mut engine, changed) = engine_with(2, DocumentMeta::default(), "goal");
        assert!(strict().admit(engine.select_mut(&changed), 10).is_empty());
    }

    #[test]
    fn test_sets_last_checked_on_rejection() {
        let (mut engine, changed) = engine_with(2, DocumentMeta::default(), "goal");
        strict().admit(engine.select_mut(&changed), 10);
        assert_eq!(engine.get(changed[0]).unwrap().last_checked(), Some(10));
    }

    #[test]
    fn test_cooldown() {
        let (mut engine, changed) = engine_with(4, DocumentMeta::default(), "goal");
        let filter = strict();
        assert_eq!(filter.admit(engine.select_mut(&changed), 10).len(), 1);
        assert!(filter.admit(engine.select_mut(&changed), 11).is_empty());
        assert_eq!(filter.admit(engine.select_mut(&changed), 13).len(), 1);
    }

    #[test]
    fn test_same_timestamp_is_idempotent() {
        let (mut engine, changed) = engine_with(4, DocumentMeta::default(), "goal");
        let filter = strict();
        let first = filter.admit(engine.select_mut(&changed), 10);
        let second = filter.admit(engine.select_mut(&changed), 10);
        assert_eq!(first, second);
        assert_eq!(engine.get(changed[0]).unwrap().last_checked(), Some(10));
    }

    #[test]
    fn test_bursty_never_readmitted() {
        let (mut engine, changed) = engine_with(4, DocumentMeta::default(), "goal");
        engine.get_mut(changed[0]).unwrap().bursty = true;
        let none = AdmissionFilter::new(FilteringLevel::None, 1, 0, 1.0).unwrap();
        assert!(none.admit(engine.select_mut(&changed), 10).is_empty());
    }

    #[test]
    fn test_near_duplicates_rejected() {
        let mut engine = TemporalClustering::new(0.1, 1000).unwrap();
        let docs: Vec<_> = (0..4)
            .map(|i| doc(i, "goal", &[("goal", 1.0)], DocumentMeta::default()))
            .collect();
        let changed = engine.cluster(&docs);
        assert!(strict().admit(engine.select_mut(&changed), 10).is_empty());
        let lenient = AdmissionFilter::new(FilteringLevel::Lenient, 3, 1, 0.8).unwrap();
        assert_eq!(lenient.admit(engine.select_mut(&changed), 20), changed);
    }

    #[test]
    fn test_too_many_urls() {
        let meta = DocumentMeta {
            urls: 2,
            ..Default::default()
        };
        let (mut engine, changed) = engine_with(4, meta, "goal");
        assert!(strict().admit(engine.select_mut(&changed), 10).is_empty());
    }

    #[test]
    fn test_too_many_replies() {
        let (mut engine, changed) = engine_with(4, DocumentMeta::default(), "@keeper goal");
        assert!(strict().admit(engine.select_mut(&changed), 10).is_empty());
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(AdmissionFilter::new(FilteringLevel::Strict, 0, 1, 0.8).is_err());
        assert!(AdmissionFilter::new(FilteringLevel::Strict, 1, -1, 0.8).is_err());
        assert!(AdmissionFilter::new(FilteringLevel::Strict, 1, 1, 1.2).is_err());
    }

    #[test]
    fn test_filtering_level_serde() {
        let level: FilteringLevel = serde_json::from_str("\"lenient\"").unwrap();
        assert_eq!(level, FilteringLevel::Lenient);
    }
}
