//! Time-bucketed nutrition stores.
//!
//! The [`NutritionStore`] trait is an ordered map from an integer timestamp
//! to one value. The engine keeps three independent instances with the
//! same operation set:
//!
//! | Store | Value type | Holds |
//! |-------|------------|-------|
//! | volume | [`Volume`] | damped document count per bucket |
//! | nutrition | [`NutritionSet`] | damped term weights per bucket |
//! | correlation | [`Correlations`] | damped term co-occurrence per bucket |
//!
//! Reads never fail: an absent bucket reads as `V::default()`. Ranges are
//! half-open, `start <= key < end`, everywhere.
//!
//! Implementations must be `Send + Sync` so a store can be shared with the
//! async consumer; the single-writer discipline is the caller's.

pub mod memory;

use std::collections::{BTreeMap, HashMap};

use crate::vector::TermWeights;

pub use memory::MemoryStore;

/// Damped document volume of one bucket.
pub type Volume = f64;

/// Term weights of one bucket.
pub type NutritionSet = TermWeights;

/// Pairwise term co-occurrence of one bucket: `a → b → weight`.
pub type Correlations = HashMap<String, TermWeights>;

/// Ordered timestamp → value mapping.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`add`](NutritionStore::add) | Upsert the value at a timestamp (last write wins) |
/// | [`get`](NutritionStore::get) | Value at a timestamp, or the default |
/// | [`between`](NutritionStore::between) | Entries with `start <= key < end` |
/// | [`since`](NutritionStore::since) | Entries with `key >= start` |
/// | [`until`](NutritionStore::until) | Entries with `key < end` |
/// | [`all`](NutritionStore::all) | Every entry |
/// | [`remove_older_than`](NutritionStore::remove_older_than) | Evict entries with `key < timestamp` |
pub trait NutritionStore<V>: Send + Sync
where
    V: Clone + Default + Send + Sync,
{
    /// Store `value` at `timestamp`, replacing any existing value.
    fn add(&self, timestamp: i64, value: V);

    /// The value at `timestamp`, or `V::default()` when absent.
    fn get(&self, timestamp: i64) -> V;

    /// All entries with `start <= key < end`. Empty when `start >= end`.
    fn between(&self, start: i64, end: i64) -> BTreeMap<i64, V>;

    /// All entries with `key >= start`.
    fn since(&self, start: i64) -> BTreeMap<i64, V> {
        self.between(start, i64::MAX)
    }

    /// All entries with `key < end`.
    fn until(&self, end: i64) -> BTreeMap<i64, V> {
        self.between(i64::MIN, end)
    }

    /// Every entry.
    fn all(&self) -> BTreeMap<i64, V>;

    /// Remove every entry with a key strictly less than `timestamp`.
    fn remove_older_than(&self, timestamp: i64);

    /// Number of stored buckets.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Earliest stored key.
    fn first_key(&self) -> Option<i64> {
        self.all().keys().next().copied()
    }
}
