//! Bursty terms being tracked across ticks.
//!
//! A term enters the map when it bursts above `burst_start` and leaves it
//! once its burst no longer exceeds `burst_end`. The gap between the two
//! thresholds keeps terms at the boundary from flapping.

use std::collections::BTreeMap;

use serde::Serialize;
use tdt_core::burst::BurstResult;
use tdt_core::cluster::ClusterId;
use tdt_core::vector::TermWeights;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedTopic {
    pub burst: f64,
    pub first_seen: i64,
    pub last_seen: i64,
    /// Last cluster this term was reported with.
    pub cluster: Option<ClusterId>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Topics {
    topics: BTreeMap<String, TrackedTopic>,
}

impl Topics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn get(&self, term: &str) -> Option<&TrackedTopic> {
        self.topics.get(term)
    }

    pub fn contains(&self, term: &str) -> bool {
        self.topics.contains_key(term)
    }

    /// Tracked terms, sorted.
    pub fn terms(&self) -> Vec<String> {
        self.topics.keys().cloned().collect()
    }

    /// The results whose terms are not tracked yet.
    pub fn new_topics<'a>(&self, results: &'a [BurstResult]) -> Vec<&'a BurstResult> {
        results
            .iter()
            .filter(|r| !self.topics.contains_key(&r.term))
            .collect()
    }

    /// Start tracking new terms and refresh known ones, keeping the larger
    /// burst. Returns how many terms were new.
    pub fn update(&mut self, results: &[BurstResult], now: i64) -> usize {
        let mut added = 0;
        for result in results {
            match self.topics.get_mut(&result.term) {
                Some(topic) => {
                    topic.burst = topic.burst.max(result.burst);
                    topic.last_seen = now;
                }
                None => {
                    self.topics.insert(
                        result.term.clone(),
                        TrackedTopic {
                            burst: result.burst,
                            first_seen: now,
                            last_seen: now,
                            cluster: None,
                        },
                    );
                    added += 1;
                }
            }
        }
        added
    }

    /// Keep only the terms that are still bursty, taking their latest
    /// score. Returns the dropped terms.
    pub fn filter(&mut self, still_bursty: &[BurstResult], now: i64) -> Vec<String> {
        let scores: BTreeMap<&str, f64> = still_bursty
            .iter()
            .map(|r| (r.term.as_str(), r.burst))
            .collect();

        let mut dropped = Vec::new();
        self.topics.retain(|term, topic| match scores.get(term.as_str()) {
            Some(&burst) => {
                topic.burst = burst;
                topic.last_seen = now;
                true
            }
            None => {
                dropped.push(term.clone());
                false
            }
        });
        dropped
    }

    /// Term → burst for every tracked term with weight in `vector`.
    pub fn within(&self, vector: &TermWeights) -> TermWeights {
        self.topics
            .iter()
            .filter(|(term, _)| vector.get(*term).is_some_and(|w| *w > 0.0))
            .map(|(term, topic)| (term.clone(), topic.burst))
            .collect()
    }

    /// Record that `terms` were reported with `cluster`.
    pub fn assign<'a>(&mut self, terms: impl IntoIterator<Item = &'a String>, cluster: ClusterId) {
        for term in terms {
            if let Some(topic) = self.topics.get_mut(term) {
                topic.cluster = Some(cluster);
            }
        }
    }
}
