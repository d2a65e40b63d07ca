//! Windowed views over nutrition stores.
//!
//! Stores are keyed per second; the engine reasons in windows of
//! `window_size` seconds. The window *ending* at `t` covers `(t - window_size, t]`,
//! which in the half-open store contract is
//! `between(t - window_size + 1, t + 1)`. Historical windows end at
//! `t - window_size`, `t - 2·window_size`, … and are only considered while
//! their end is not before the earliest stored key.

use crate::store::{Correlations, MemoryStore, NutritionSet, NutritionStore, Volume};
use crate::vector::{add_scaled, concatenate, rescale};

/// Half-open store bounds `[start, end)` of the window ending at `t`.
pub fn bounds(t: i64, window_size: i64) -> (i64, i64) {
    (t - window_size + 1, t + 1)
}

/// Total volume of the window ending at `t`.
pub fn volume<S>(store: &S, t: i64, window_size: i64) -> f64
where
    S: NutritionStore<Volume> + ?Sized,
{
    let (start, end) = bounds(t, window_size);
    store.between(start, end).values().sum()
}

/// Aggregated nutrition of the window ending at `t`, rescaled into `[0, 1]`.
pub fn nutrition<S>(store: &S, t: i64, window_size: i64) -> NutritionSet
where
    S: NutritionStore<NutritionSet> + ?Sized,
{
    let (start, end) = bounds(t, window_size);
    rescale(&concatenate(store.between(start, end).values()))
}

/// End timestamps of the historical windows preceding the window ending at
/// `t`, most recent first, stopping at the earliest stored key.
pub fn history_ends(first_key: Option<i64>, t: i64, window_size: i64) -> Vec<i64> {
    let Some(first) = first_key else {
        return Vec::new();
    };
    let mut ends = Vec::new();
    let mut end = t - window_size;
    while end >= first {
        ends.push(end);
        end -= window_size;
    }
    ends
}

/// Aggregated nutrition of up to `windows` historical windows, keyed by
/// window end, as a store the burst detector can read.
pub fn nutrition_history<S>(
    store: &S,
    t: i64,
    window_size: i64,
    windows: usize,
) -> MemoryStore<NutritionSet>
where
    S: NutritionStore<NutritionSet> + ?Sized,
{
    history_ends(store.first_key(), t, window_size)
        .into_iter()
        .take(windows)
        .map(|end| (end, nutrition(store, end, window_size)))
        .collect()
}

/// Volumes of every historical window, most recent first.
pub fn partition<S>(store: &S, t: i64, window_size: i64) -> Vec<f64>
where
    S: NutritionStore<Volume> + ?Sized,
{
    history_ends(store.first_key(), t, window_size)
        .into_iter()
        .map(|end| volume(store, end, window_size))
        .collect()
}

/// Whether the stream is too quiet at `t` to look for new bursts.
///
/// The window ending at `t` is dormant when its volume does not exceed
/// `max(min_volume, mean + stdev)` of the preceding windows. The standard
/// deviation is the sample deviation and needs two windows; with fewer it
/// is zero. An empty store is always dormant.
pub fn is_dormant<S>(store: &S, t: i64, window_size: i64, min_volume: f64) -> bool
where
    S: NutritionStore<Volume> + ?Sized,
{
    if store.is_empty() {
        return true;
    }

    let current = volume(store, t, window_size);
    let historic = partition(store, t, window_size);
    current <= dormancy_threshold(&historic, min_volume)
}

/// `max(min_volume, mean + stdev)` of the given window volumes.
pub fn dormancy_threshold(volumes: &[f64], min_volume: f64) -> f64 {
    if volumes.is_empty() {
        return min_volume;
    }
    let n = volumes.len() as f64;
    let mean = volumes.iter().sum::<f64>() / n;
    let stdev = if volumes.len() > 1 {
        (volumes.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
    } else {
        0.0
    };
    min_volume.max(mean + stdev)
}

/// Sum of the correlations in the window ending at `t`.
///
/// With `normalize`, every term's row is scaled so it sums to `1.0`.
pub fn correlations<S>(store: &S, t: i64, window_size: i64, normalize: bool) -> Correlations
where
    S: NutritionStore<Correlations> + ?Sized,
{
    let (start, end) = bounds(t, window_size);
    let mut combined = Correlations::new();
    for bucket in store.between(start, end).values() {
        for (term, row) in bucket {
            add_scaled(combined.entry(term.clone()).or_default(), row, 1.0);
        }
    }

    if normalize {
        for row in combined.values_mut() {
            let total: f64 = row.values().sum();
            if total > 0.0 {
                row.values_mut().for_each(|w| *w /= total);
            }
        }
    }
    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::from_pairs;

    #[test]
    fn test_bounds() {
        assert_eq!(bounds(10, 5), (6, 11));
        assert_eq!(bounds(10, 1), (10, 11));
    }

    #[test]
    fn test_volume_window_is_start_exclusive_end_inclusive() {
        let store: MemoryStore<Volume> = [(5, 1.0), (6, 2.0), (10, 4.0), (11, 8.0)]
            .into_iter()
            .collect();
        assert_eq!(volume(&store, 10, 5), 6.0);
    }

    #[test]
    fn test_history_ends_reach_earliest_data() {
        assert_eq!(history_ends(Some(1), 10, 2), vec![8, 6, 4, 2]);
        assert_eq!(history_ends(Some(9), 10, 2), Vec::<i64>::new());
        assert_eq!(history_ends(None, 10, 2), Vec::<i64>::new());
    }

    #[test]
    fn test_partition() {
        let store: MemoryStore<Volume> = [(1, 3.0), (3, 1.0), (4, 2.0), (10, 5.0)]
            .into_iter()
            .collect();
        // windows end at 8, 6, 4, 2: (6,8], (4,6], (2,4], (0,2]
        assert_eq!(partition(&store, 10, 2), vec![0.0, 0.0, 3.0, 3.0]);
    }

    #[test]
    fn test_empty_store_is_dormant() {
        let store: MemoryStore<Volume> = MemoryStore::new();
        assert!(is_dormant(&store, 10, 5, 0.0));
    }

    #[test]
    fn test_dormant_below_min_volume() {
        let store: MemoryStore<Volume> = [(10, 5.0)].into_iter().collect();
        assert!(is_dormant(&store, 10, 5, 5.0));
        assert!(!is_dormant(&store, 10, 5, 4.0));
    }

    #[test]
    fn test_dormant_against_mean_plus_stdev() {
        // historic windows: 2.0 and 4.0 -> mean 3, sample stdev ~1.414
        let store: MemoryStore<Volume> = [(5, 2.0), (10, 4.0), (15, 4.4)].into_iter().collect();
        assert!(is_dormant(&store, 15, 5, 0.0));
        store.add(15, 4.5);
        assert!(!is_dormant(&store, 15, 5, 0.0));
    }

    #[test]
    fn test_dormancy_threshold_single_window() {
        assert_eq!(dormancy_threshold(&[3.0], 1.0), 3.0);
        assert_eq!(dormancy_threshold(&[], 1.0), 1.0);
    }

    #[test]
    fn test_nutrition_rescaled() {
        let store: MemoryStore<NutritionSet> = [
            (9, from_pairs([("a", 1.0)])),
            (10, from_pairs([("a", 1.0), ("b", 1.0)])),
        ]
        .into_iter()
        .collect();
        let n = nutrition(&store, 10, 5);
        assert_eq!(n["a"], 1.0);
        assert_eq!(n["b"], 0.5);
    }

    #[test]
    fn test_nutrition_history_keys() {
        let store: MemoryStore<NutritionSet> = [
            (5, from_pairs([("b", 1.0)])),
            (10, from_pairs([("a", 1.0)])),
            (15, from_pairs([("a", 1.0)])),
        ]
        .into_iter()
        .collect();
        let history = nutrition_history(&store, 15, 5, 1);
        assert_eq!(history.all().keys().copied().collect::<Vec<_>>(), vec![10]);
        let history = nutrition_history(&store, 15, 5, 5);
        assert_eq!(history.all().keys().copied().collect::<Vec<_>>(), vec![5, 10]);
    }

    #[test]
    fn test_correlations_normalized_rows() {
        let mut bucket = Correlations::new();
        bucket.insert("a".into(), from_pairs([("b", 1.0), ("c", 3.0)]));
        let store: MemoryStore<Correlations> = [(10, bucket.clone()), (9, bucket)]
            .into_iter()
            .collect();

        let raw = correlations(&store, 10, 5, false);
        assert_eq!(raw["a"]["c"], 6.0);

        let normalized = correlations(&store, 10, 5, true);
        assert!((normalized["a"]["b"] - 0.25).abs() < 1e-9);
        assert!((normalized["a"]["c"] - 0.75).abs() < 1e-9);
    }
}
