//! Incremental temporal clustering.
//!
//! Documents are assigned one at a time, in input order, to the most
//! similar active cluster:
//!
//! ```text
//! for each document d:
//!     freeze every active cluster with d.timestamp - last_updated > freeze_period
//!     best = argmax cosine(d, centroid) over active clusters   (ties: oldest cluster)
//!     if cosine(d, best) >= threshold: add d to best
//!     else:                            start a new cluster with d
//! ```
//!
//! A frozen cluster never receives documents again but stays queryable.
//! Centroids are the unit-length sum of member vectors, maintained
//! incrementally.

use std::sync::Arc;

use crate::document::Document;
use crate::error::{ensure_range, Result, TdtError};
use crate::vector::{add_scaled, cosine_similarity, normalize, TermWeights};

/// Identifier of a cluster. Assigned in creation order, so a smaller id
/// is an older cluster.
pub type ClusterId = u64;

/// Rounding slack for similarity comparisons, so that a document identical
/// to a centroid always clears a threshold of `1.0`.
const SIMILARITY_EPSILON: f64 = 1e-9;

/// A growing group of similar documents.
#[derive(Debug, Clone)]
pub struct Cluster {
    id: ClusterId,
    documents: Vec<Arc<Document>>,
    sum: TermWeights,
    centroid: TermWeights,
    created_at: i64,
    last_updated: i64,
    frozen: bool,
    last_checked: Option<i64>,
    checked_before: Option<i64>,
    /// Set once the cluster has produced a topic; it is never re-admitted.
    pub bursty: bool,
}

impl Cluster {
    fn new(id: ClusterId, document: Arc<Document>) -> Self {
        let timestamp = document.timestamp;
        let mut cluster = Self {
            id,
            documents: Vec::new(),
            sum: TermWeights::new(),
            centroid: TermWeights::new(),
            created_at: timestamp,
            last_updated: timestamp,
            frozen: false,
            last_checked: None,
            checked_before: None,
            bursty: false,
        };
        cluster.push(document);
        cluster
    }

    fn push(&mut self, document: Arc<Document>) {
        add_scaled(&mut self.sum, &document.vector, 1.0);
        self.centroid = self.sum.clone();
        normalize(&mut self.centroid);
        self.last_updated = self.last_updated.max(document.timestamp);
        self.documents.push(document);
    }

    pub fn id(&self) -> ClusterId {
        self.id
    }

    pub fn documents(&self) -> &[Arc<Document>] {
        &self.documents
    }

    pub fn size(&self) -> usize {
        self.documents.len()
    }

    /// Unit-length centroid.
    pub fn centroid(&self) -> &TermWeights {
        &self.centroid
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn last_updated(&self) -> i64 {
        self.last_updated
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// When the admission filter last evaluated this cluster.
    pub fn last_checked(&self) -> Option<i64> {
        self.last_checked
    }

    /// Record an evaluation at `timestamp`. Re-evaluating at the same
    /// timestamp keeps the earlier check as the cooldown reference.
    pub(crate) fn mark_checked(&mut self, timestamp: i64) {
        if self.last_checked != Some(timestamp) {
            self.checked_before = self.last_checked;
            self.last_checked = Some(timestamp);
        }
    }

    /// The check that the cooldown at `timestamp` is measured from.
    pub(crate) fn cooldown_reference(&self, timestamp: i64) -> Option<i64> {
        if self.last_checked == Some(timestamp) {
            self.checked_before
        } else {
            self.last_checked
        }
    }

    /// Cosine similarity between `vector` and the centroid.
    pub fn similarity(&self, vector: &TermWeights) -> f64 {
        cosine_similarity(&self.centroid, vector)
    }

    /// Average similarity between the members and the centroid. High values
    /// mean near-duplicate content.
    pub fn intra_similarity(&self) -> f64 {
        if self.documents.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .documents
            .iter()
            .map(|d| self.similarity(&d.vector))
            .sum();
        total / self.documents.len() as f64
    }
}

/// Online clustering with time-based freezing.
#[derive(Debug)]
pub struct TemporalClustering {
    threshold: f64,
    freeze_period: i64,
    clusters: Vec<Cluster>,
    next_id: ClusterId,
}

impl TemporalClustering {
    /// `threshold` must be in `[0, 1]`; `freeze_period` in seconds, `>= 0`.
    pub fn new(threshold: f64, freeze_period: i64) -> Result<Self> {
        ensure_range("threshold", threshold, 0.0, 1.0)?;
        if freeze_period < 0 {
            return Err(TdtError::config("freeze_period", "must be >= 0"));
        }
        Ok(Self {
            threshold,
            freeze_period,
            clusters: Vec::new(),
            next_id: 0,
        })
    }

    /// Assign `documents` in order and return the ids of the clusters that
    /// received at least one of them, in order of first change.
    pub fn cluster(&mut self, documents: &[Arc<Document>]) -> Vec<ClusterId> {
        let mut changed: Vec<ClusterId> = Vec::new();

        for document in documents {
            self.freeze_inactive(document.timestamp);

            let mut best: Option<(usize, f64)> = None;
            for (i, cluster) in self.clusters.iter().enumerate() {
                if cluster.frozen {
                    continue;
                }
                let sim = cluster.similarity(&document.vector);
                // strict comparison keeps the oldest cluster on ties
                if best.map_or(true, |(_, s)| sim > s) {
                    best = Some((i, sim));
                }
            }

            let id = match best {
                Some((i, sim)) if sim + SIMILARITY_EPSILON >= self.threshold => {
                    self.clusters[i].push(Arc::clone(document));
                    self.clusters[i].id
                }
                _ => {
                    let id = self.next_id;
                    self.next_id += 1;
                    self.clusters.push(Cluster::new(id, Arc::clone(document)));
                    id
                }
            };

            if !changed.contains(&id) {
                changed.push(id);
            }
        }

        changed
    }

    fn freeze_inactive(&mut self, now: i64) {
        for cluster in self.clusters.iter_mut().filter(|c| !c.frozen) {
            if now - cluster.last_updated > self.freeze_period {
                cluster.frozen = true;
            }
        }
    }

    pub fn get(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.id == id)
    }

    pub fn get_mut(&mut self, id: ClusterId) -> Option<&mut Cluster> {
        self.clusters.iter_mut().find(|c| c.id == id)
    }

    /// Mutable access to the clusters named in `ids`.
    pub fn select_mut<'a>(
        &'a mut self,
        ids: &'a [ClusterId],
    ) -> impl Iterator<Item = &'a mut Cluster> + 'a {
        self.clusters.iter_mut().filter(move |c| ids.contains(&c.id))
    }

    /// All clusters, frozen or not, oldest first.
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn active(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter().filter(|c| !c.frozen)
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Drop frozen clusters last updated before `horizon`.
    ///
    /// Keeps memory bounded on long streams; timelines hold their own
    /// snapshots of the documents they report.
    pub fn discard_frozen_before(&mut self, horizon: i64) -> usize {
        let before = self.clusters.len();
        self.clusters
            .retain(|c| !(c.frozen && c.last_updated < horizon));
        before - self.clusters.len()
    }
}
