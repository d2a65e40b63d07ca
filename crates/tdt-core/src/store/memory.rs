//! In-memory [`NutritionStore`] implementation.
//!
//! Uses a `BTreeMap` behind `std::sync::RwLock`, so range queries are
//! ordered and cheap. A poisoned lock is recovered rather than propagated:
//! every write leaves the map consistent.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use super::NutritionStore;

/// In-memory nutrition store.
#[derive(Debug)]
pub struct MemoryStore<V> {
    buckets: RwLock<BTreeMap<i64, V>>,
}

impl<V> MemoryStore<V> {
    pub fn new() -> Self {
        Self {
            buckets: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> FromIterator<(i64, V)> for MemoryStore<V> {
    fn from_iter<I: IntoIterator<Item = (i64, V)>>(iter: I) -> Self {
        Self {
            buckets: RwLock::new(iter.into_iter().collect()),
        }
    }
}

impl<V> NutritionStore<V> for MemoryStore<V>
where
    V: Clone + Default + Send + Sync,
{
    fn add(&self, timestamp: i64, value: V) {
        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        buckets.insert(timestamp, value);
    }

    fn get(&self, timestamp: i64) -> V {
        let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
        buckets.get(&timestamp).cloned().unwrap_or_default()
    }

    fn between(&self, start: i64, end: i64) -> BTreeMap<i64, V> {
        if start >= end {
            return BTreeMap::new();
        }
        let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
        buckets
            .range(start..end)
            .map(|(k, v)| (*k, v.clone()))
            .collect()
    }

    fn all(&self) -> BTreeMap<i64, V> {
        self.buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn remove_older_than(&self, timestamp: i64) {
        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        let kept = buckets.split_off(&timestamp);
        *buckets = kept;
    }

    fn len(&self) -> usize {
        self.buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn first_key(&self) -> Option<i64> {
        self.buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .next()
            .copied()
    }
}
