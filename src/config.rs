//! TOML configuration parsing and validation.
//!
//! Every option has a default, so an empty file (or a missing section) is a
//! valid configuration. Validation runs eagerly in [`load_config`] and
//! [`Config::validate`]; a consumer is never built from an invalid config.
//!
//! See `config/tdt.example.toml` for every recognised option.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tdt_core::admission::FilteringLevel;
use tdt_core::error::{ensure_range, TdtError};
use tdt_core::spike::{self, SpikeDetector};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub nutrition: NutritionConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub clustering: ClusteringConfig,
    #[serde(default)]
    pub admission: AdmissionConfig,
    #[serde(default)]
    pub timeline: TimelineConfig,
    #[serde(default)]
    pub consumer: ConsumerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NutritionConfig {
    /// Seconds per window.
    #[serde(default = "default_window_size")]
    pub window_size: i64,
    /// Historical windows compared by the burst detector.
    #[serde(default = "default_windows")]
    pub windows: usize,
    /// Windows of state retained before eviction.
    #[serde(default = "default_sets")]
    pub sets: usize,
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,
}

impl Default for NutritionConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            windows: default_windows(),
            sets: default_sets(),
            decay_rate: default_decay_rate(),
        }
    }
}

fn default_window_size() -> i64 {
    60
}
fn default_windows() -> usize {
    5
}
fn default_sets() -> usize {
    10
}
fn default_decay_rate() -> f64 {
    0.5
}

/// Which tick strategy drives the consumer.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Track bursty terms over the whole stream.
    #[default]
    Terms,
    /// Burst-check cluster centroids against periodic checkpoints.
    Clusters,
    /// Report growing clusters while the stream volume spikes.
    Volume,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectionConfig {
    #[serde(default)]
    pub strategy: StrategyKind,
    #[serde(default = "default_burst_start")]
    pub burst_start: f64,
    #[serde(default = "default_burst_end")]
    pub burst_end: f64,
    #[serde(default = "default_min_volume")]
    pub min_volume: f64,
    /// Repost decay per minute of delay.
    #[serde(default = "default_damping")]
    pub damping: f64,
    #[serde(default = "default_min_topic_terms")]
    pub min_topic_terms: usize,
    #[serde(default = "default_min_topic_burst")]
    pub min_topic_burst: f64,
    /// Volume strategy: minimum recent/older ratio of a window's halves.
    #[serde(default = "default_post_rate")]
    pub post_rate: f64,
    /// Volume strategy: window lengths in seconds, tried shortest first.
    #[serde(default = "default_spike_windows")]
    pub spike_windows: Vec<i64>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            burst_start: default_burst_start(),
            burst_end: default_burst_end(),
            min_volume: default_min_volume(),
            damping: default_damping(),
            min_topic_terms: default_min_topic_terms(),
            min_topic_burst: default_min_topic_burst(),
            post_rate: default_post_rate(),
            spike_windows: default_spike_windows(),
        }
    }
}

fn default_burst_start() -> f64 {
    0.5
}
fn default_burst_end() -> f64 {
    0.2
}
fn default_min_volume() -> f64 {
    10.0
}
fn default_damping() -> f64 {
    0.5
}
fn default_min_topic_terms() -> usize {
    3
}
fn default_min_topic_burst() -> f64 {
    0.9
}
fn default_post_rate() -> f64 {
    spike::DEFAULT_POST_RATE
}
fn default_spike_windows() -> Vec<i64> {
    spike::DEFAULT_WINDOWS.to_vec()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClusteringConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Seconds without growth before a cluster freezes.
    #[serde(default = "default_freeze_period")]
    pub freeze_period: i64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            freeze_period: default_freeze_period(),
        }
    }
}

fn default_threshold() -> f64 {
    0.5
}
fn default_freeze_period() -> i64 {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdmissionConfig {
    #[serde(default)]
    pub filtering: FilteringLevel,
    #[serde(default = "default_min_size")]
    pub min_size: usize,
    #[serde(default = "default_cooldown")]
    pub cooldown: i64,
    #[serde(default = "default_max_intra_similarity")]
    pub max_intra_similarity: f64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            filtering: FilteringLevel::default(),
            min_size: default_min_size(),
            cooldown: default_cooldown(),
            max_intra_similarity: default_max_intra_similarity(),
        }
    }
}

fn default_min_size() -> usize {
    3
}
fn default_cooldown() -> i64 {
    1
}
fn default_max_intra_similarity() -> f64 {
    0.8
}

#[derive(Debug, Deserialize, Clone)]
pub struct TimelineConfig {
    #[serde(default = "default_expiry")]
    pub expiry: i64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            expiry: default_expiry(),
        }
    }
}

fn default_expiry() -> i64 {
    90
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConsumerConfig {
    /// Seconds to wait before consuming.
    #[serde(default)]
    pub initial_wait: u64,
    /// Upper bound on a run, in seconds.
    #[serde(default = "default_max_time")]
    pub max_time: u64,
    /// Seconds without input before stopping; negative waits forever.
    #[serde(default = "default_max_inactivity")]
    pub max_inactivity: i64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            initial_wait: 0,
            max_time: default_max_time(),
            max_inactivity: default_max_inactivity(),
        }
    }
}

fn default_max_time() -> u64 {
    3600
}
fn default_max_inactivity() -> i64 {
    60
}

impl ConsumerConfig {
    pub fn initial_wait(&self) -> Duration {
        Duration::from_secs(self.initial_wait)
    }

    pub fn max_time(&self) -> Duration {
        Duration::from_secs(self.max_time)
    }

    /// `None` when the consumer should wait for input indefinitely.
    pub fn max_inactivity(&self) -> Option<Duration> {
        u64::try_from(self.max_inactivity)
            .ok()
            .map(Duration::from_secs)
    }
}

impl Config {
    /// Parse a TOML document and validate it.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Check every option against its documented range.
    pub fn validate(&self) -> Result<(), TdtError> {
        let n = &self.nutrition;
        if n.window_size <= 0 {
            return Err(TdtError::config("nutrition.window_size", "must be > 0"));
        }
        if n.windows == 0 {
            return Err(TdtError::config("nutrition.windows", "must be > 0"));
        }
        if n.sets < n.windows {
            return Err(TdtError::config(
                "nutrition.sets",
                format!("must be >= nutrition.windows ({})", n.windows),
            ));
        }
        if self.checked_retention().is_none() {
            return Err(TdtError::config(
                "nutrition.window_size",
                "window_size * (sets + 1) overflows",
            ));
        }
        ensure_range("nutrition.decay_rate", n.decay_rate, 0.0, f64::MAX)?;

        let d = &self.detection;
        ensure_range("detection.burst_start", d.burst_start, -1.0, 1.0)?;
        ensure_range("detection.burst_end", d.burst_end, -1.0, 1.0)?;
        if d.burst_end > d.burst_start {
            return Err(TdtError::config(
                "detection.burst_end",
                "must not exceed detection.burst_start",
            ));
        }
        ensure_range("detection.min_volume", d.min_volume, 0.0, f64::MAX)?;
        ensure_range("detection.damping", d.damping, 0.0, f64::MAX)?;
        if d.min_topic_terms == 0 {
            return Err(TdtError::config("detection.min_topic_terms", "must be >= 1"));
        }
        SpikeDetector::new(d.spike_windows.clone(), d.post_rate)?;

        ensure_range("clustering.threshold", self.clustering.threshold, 0.0, 1.0)?;
        if self.clustering.freeze_period < 0 {
            return Err(TdtError::config("clustering.freeze_period", "must be >= 0"));
        }

        let a = &self.admission;
        if a.min_size == 0 {
            return Err(TdtError::config("admission.min_size", "must be >= 1"));
        }
        if a.cooldown < 0 {
            return Err(TdtError::config("admission.cooldown", "must be >= 0"));
        }
        ensure_range(
            "admission.max_intra_similarity",
            a.max_intra_similarity,
            0.0,
            1.0,
        )?;

        if self.timeline.expiry < 0 {
            return Err(TdtError::config("timeline.expiry", "must be >= 0"));
        }
        if self.consumer.max_time == 0 {
            return Err(TdtError::config("consumer.max_time", "must be > 0"));
        }
        Ok(())
    }

    /// Seconds of state kept behind "now": `window_size * (sets + 1)`.
    ///
    /// Saturates for configs that did not pass [`validate`](Self::validate).
    pub fn retention(&self) -> i64 {
        self.checked_retention().unwrap_or(i64::MAX)
    }

    fn checked_retention(&self) -> Option<i64> {
        let sets = i64::try_from(self.nutrition.sets).ok()?.checked_add(1)?;
        self.nutrition.window_size.checked_mul(sets)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    Config::from_toml_str(&content)
}
