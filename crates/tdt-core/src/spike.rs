//! Volume spike detection.
//!
//! A feature-free alternative to [`burst`](crate::burst): only the number of
//! documents per second is looked at. Each candidate window ending at `t` is
//! split in two halves, and the window is emerging when the recent half
//! carries at least `post_rate` times the volume of the older one:
//!
//! ```text
//!   t - w          t - w/2            t
//!     │── older ─────│── recent ───────│      recent / older >= post_rate
//! ```
//!
//! Windows are tried shortest first; a window whose older half is empty is
//! skipped. The first emerging window wins.

use serde::Serialize;

use crate::error::{ensure_range, Result, TdtError};
use crate::store::{NutritionStore, Volume};

/// Window lengths tried by default, in seconds.
pub const DEFAULT_WINDOWS: [i64; 4] = [10, 20, 30, 60];

/// Default minimum ratio between the two halves.
pub const DEFAULT_POST_RATE: f64 = 1.7;

/// The emerging half of a window: the first and last second with volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Spike {
    pub start: i64,
    pub end: i64,
    /// Length of the window that fired.
    pub window: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpikeDetector {
    windows: Vec<i64>,
    post_rate: f64,
}

impl Default for SpikeDetector {
    fn default() -> Self {
        Self {
            windows: DEFAULT_WINDOWS.to_vec(),
            post_rate: DEFAULT_POST_RATE,
        }
    }
}

impl SpikeDetector {
    /// Windows must be at least two seconds long and are sorted shortest
    /// first. `post_rate` must be positive.
    pub fn new(mut windows: Vec<i64>, post_rate: f64) -> Result<Self> {
        if windows.is_empty() {
            return Err(TdtError::config("detection.spike_windows", "must not be empty"));
        }
        if windows.iter().any(|w| *w < 2) {
            return Err(TdtError::config(
                "detection.spike_windows",
                "every window must be >= 2 seconds",
            ));
        }
        ensure_range("detection.post_rate", post_rate, f64::MIN_POSITIVE, f64::MAX)?;
        windows.sort_unstable();
        windows.dedup();
        Ok(Self { windows, post_rate })
    }

    /// The longest window; volume older than this is never read again.
    pub fn span(&self) -> i64 {
        self.windows.last().copied().unwrap_or(0)
    }

    /// Look for a spike in the windows ending at `timestamp` (exclusive).
    pub fn detect(&self, store: &impl NutritionStore<Volume>, timestamp: i64) -> Option<Spike> {
        for &window in &self.windows {
            let half = window / 2;
            let older: Volume = store
                .between(timestamp.saturating_sub(window), timestamp.saturating_sub(half))
                .values()
                .sum();
            if older <= 0.0 {
                continue;
            }

            let recent = store.between(timestamp.saturating_sub(half), timestamp);
            let volume: Volume = recent.values().sum();
            if volume / older >= self.post_rate {
                let start = *recent.keys().next()?;
                let end = *recent.keys().next_back()?;
                return Some(Spike { start, end, window });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn store(volumes: &[(i64, f64)]) -> MemoryStore<Volume> {
        let store = MemoryStore::new();
        for (ts, v) in volumes {
            store.add(*ts, *v);
        }
        store
    }

    #[test]
    fn test_spike_in_shortest_window() {
        // 1 post/s, then 2 posts/s over the last five seconds
        let volumes: Vec<(i64, f64)> = (90..95)
            .map(|ts| (ts, 1.0))
            .chain((95..100).map(|ts| (ts, 2.0)))
            .collect();
        let spike = SpikeDetector::default().detect(&store(&volumes), 100).unwrap();
        assert_eq!(spike, Spike { start: 95, end: 99, window: 10 });
    }

    #[test]
    fn test_steady_volume_is_not_a_spike() {
        let volumes: Vec<(i64, f64)> = (40..100).map(|ts| (ts, 3.0)).collect();
        assert_eq!(SpikeDetector::default().detect(&store(&volumes), 100), None);
    }

    #[test]
    fn test_empty_older_half_falls_through_to_longer_window() {
        // nothing in [90, 95), so the 10s window is skipped; the 20s window
        // compares [80, 90) against [90, 100)
        let s = store(&[(85, 1.0), (97, 1.0), (98, 1.0)]);
        let spike = SpikeDetector::default().detect(&s, 100).unwrap();
        assert_eq!(spike.window, 20);
        assert_eq!((spike.start, spike.end), (97, 98));
    }

    #[test]
    fn test_ratio_threshold_is_inclusive() {
        let s = store(&[(92, 1.0), (97, 2.0)]);
        let detector = SpikeDetector::new(vec![10], 2.0).unwrap();
        assert!(detector.detect(&s, 100).is_some());
        let detector = SpikeDetector::new(vec![10], 2.5).unwrap();
        assert!(detector.detect(&s, 100).is_none());
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(SpikeDetector::new(Vec::new(), 1.7).is_err());
        assert!(SpikeDetector::new(vec![1], 1.7).is_err());
        assert!(SpikeDetector::new(vec![10], 0.0).is_err());
        let detector = SpikeDetector::new(vec![60, 10, 10], 1.7).unwrap();
        assert_eq!(detector.span(), 60);
    }
}
