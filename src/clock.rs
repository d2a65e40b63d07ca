//! Clock sources for the consumer.
//!
//! The consumer asks its clock for "now" once per tick. [`WallClock`] reads
//! system time; [`StreamClock`] follows the documents themselves, which
//! makes replays of recorded streams deterministic regardless of how fast
//! they are fed.

use std::sync::Arc;

use tdt_core::document::Document;

pub trait Clock: Send {
    /// Current time in seconds.
    fn now(&self) -> i64;

    /// Called with every batch of documents before `now` is read.
    fn observe(&mut self, _documents: &[Arc<Document>]) {}
}

/// System time.
#[derive(Debug, Default, Clone, Copy)]
pub struct WallClock;

impl Clock for WallClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Time as told by the stream: the latest document timestamp seen so far.
/// Never moves backwards.
#[derive(Debug, Default, Clone, Copy)]
pub struct StreamClock {
    latest: Option<i64>,
}

impl StreamClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for StreamClock {
    fn now(&self) -> i64 {
        self.latest.unwrap_or(0)
    }

    fn observe(&mut self, documents: &[Arc<Document>]) {
        if let Ok(latest) = tdt_core::document::latest_timestamp(documents.iter().map(|d| &**d)) {
            self.latest = Some(self.latest.map_or(latest, |t| t.max(latest)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tdt_core::document::DocumentMeta;
    use tdt_core::vector::TermWeights;

    fn docs(timestamps: &[i64]) -> Vec<Arc<Document>> {
        timestamps
            .iter()
            .map(|&ts| {
                Arc::new(
                    Document::new("d", ts, "", TermWeights::new(), DocumentMeta::default())
                        .unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_stream_clock_follows_latest() {
        let mut clock = StreamClock::new();
        assert_eq!(clock.now(), 0);
        clock.observe(&docs(&[10, 30, 20]));
        assert_eq!(clock.now(), 30);
    }

    #[test]
    fn test_stream_clock_never_goes_back() {
        let mut clock = StreamClock::new();
        clock.observe(&docs(&[50]));
        clock.observe(&docs(&[40]));
        clock.observe(&[]);
        assert_eq!(clock.now(), 50);
    }

    #[test]
    fn test_wall_clock_is_recent() {
        // 2020-01-01
        assert!(WallClock.now() > 1_577_836_800);
    }
}
