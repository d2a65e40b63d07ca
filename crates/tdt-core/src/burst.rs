//! Burst (emergence) detection.
//!
//! A term is bursty when its weight in the current window exceeds its
//! decayed historical baseline by more than a threshold:
//!
//! ```text
//! burst(term) = current(term) - Σ w_i · h_i(term) / Σ w_i
//!
//!   h_i  = i-th most recent historical bucket (i = 1 .. windows)
//!   w_i  = exp(-decay_rate · i)
//! ```
//!
//! Terms missing from a historical bucket count as `0.0` for that bucket.
//! With all inputs in `[0, 1]` the baseline is a convex combination and
//! every score stays in `[-1, 1]`. An empty history gives a baseline of
//! `0.0`, so the burst equals the current weight.
//!
//! The detector is read-only with respect to the store.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::{ensure_range, Result};
use crate::store::{NutritionSet, NutritionStore};

/// One scored term.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BurstResult {
    pub term: String,
    pub burst: f64,
}

/// Compares current nutrition against decayed history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurstDetector {
    decay_rate: f64,
}

impl Default for BurstDetector {
    fn default() -> Self {
        Self { decay_rate: 0.5 }
    }
}

impl BurstDetector {
    /// Create a detector. `decay_rate` must be finite and non-negative.
    pub fn new(decay_rate: f64) -> Result<Self> {
        ensure_range("decay_rate", decay_rate, 0.0, f64::MAX)?;
        Ok(Self { decay_rate })
    }

    pub fn decay_rate(&self) -> f64 {
        self.decay_rate
    }

    /// Weight of the `i`-th most recent historical bucket, 1-indexed.
    pub fn weight(&self, i: usize) -> f64 {
        (-self.decay_rate * i as f64).exp()
    }

    /// Score every term of `current` (or of `focus`, when given) against
    /// `history`, which must be ordered most recent first.
    pub fn scores(
        &self,
        current: &NutritionSet,
        history: &[NutritionSet],
        focus: Option<&[String]>,
    ) -> HashMap<String, f64> {
        let terms: HashSet<&String> = match focus {
            Some(focus) => focus.iter().collect(),
            None => current.keys().collect(),
        };

        let weights: Vec<f64> = (1..=history.len()).map(|i| self.weight(i)).collect();
        let total: f64 = weights.iter().sum();

        terms
            .into_iter()
            .map(|term| {
                let baseline = if total > 0.0 {
                    history
                        .iter()
                        .zip(&weights)
                        .map(|(bucket, w)| w * bucket.get(term).copied().unwrap_or(0.0))
                        .sum::<f64>()
                        / total
                } else {
                    0.0
                };
                let now = current.get(term).copied().unwrap_or(0.0);
                (term.clone(), now - baseline)
            })
            .collect()
    }

    /// Fetch up to `windows` buckets with keys `< timestamp`, most recent
    /// first, and report the terms whose burst is strictly above `threshold`.
    ///
    /// Results are sorted by descending burst, then by term.
    pub fn detect<S>(
        &self,
        store: &S,
        current: &NutritionSet,
        timestamp: i64,
        windows: usize,
        threshold: f64,
        focus: Option<&[String]>,
    ) -> Vec<BurstResult>
    where
        S: NutritionStore<NutritionSet> + ?Sized,
    {
        let history: Vec<NutritionSet> = store
            .until(timestamp)
            .into_values()
            .rev()
            .take(windows)
            .collect();

        let mut results: Vec<BurstResult> = self
            .scores(current, &history, focus)
            .into_iter()
            .filter(|(_, burst)| *burst > threshold)
            .map(|(term, burst)| BurstResult { term, burst })
            .collect();
        sort_results(&mut results);
        results
    }
}

/// Sort by descending burst, ties by term, so output is deterministic.
pub fn sort_results(results: &mut [BurstResult]) {
    results.sort_by(|a, b| {
        b.burst
            .partial_cmp(&a.burst)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.term.cmp(&b.term))
    });
}
