//! Timeline of topical nodes.
//!
//! A [`Timeline`] is an append-only sequence of [`TimelineNode`]s. Each node
//! groups the (cluster, topic) pairs detected close together in time:
//!
//! ```text
//!  t=0        t=50              t=200
//!  ┌──────────────────┐         ┌──────────┐
//!  │ node 0           │  gap >  │ node 1   │
//!  │ created_at=0     │ expiry  │          │
//!  │ last_updated=50  │────────▶│          │
//!  └──────────────────┘         └──────────┘
//! ```
//!
//! A node closes once a call arrives more than `expiry` seconds after its
//! last update; closed nodes are never reopened. A topic vector equal to
//! one already anywhere in the timeline is never added again.

use std::sync::Arc;

use serde::Serialize;

use crate::cluster::{Cluster, ClusterId};
use crate::document::Document;
use crate::vector::TermWeights;

/// A cluster snapshot and the topic it was reported with.
#[derive(Debug, Clone, Serialize)]
pub struct TopicEntry {
    pub cluster: ClusterId,
    pub topic: TermWeights,
    /// Members of the cluster when the topic was reported.
    pub documents: Vec<Arc<Document>>,
}

/// A group of topics that belong to the same development.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineNode {
    pub created_at: i64,
    pub last_updated: i64,
    pub entries: Vec<TopicEntry>,
}

impl TimelineNode {
    fn new(timestamp: i64) -> Self {
        Self {
            created_at: timestamp,
            last_updated: timestamp,
            entries: Vec::new(),
        }
    }

    /// Whether a call at `timestamp` falls outside this node.
    pub fn expired(&self, expiry: i64, timestamp: i64) -> bool {
        timestamp - self.last_updated > expiry
    }

    pub fn topics(&self) -> impl Iterator<Item = &TermWeights> {
        self.entries.iter().map(|e| &e.topic)
    }

    /// Documents of every entry, first occurrence of each id only.
    pub fn documents(&self) -> Vec<Arc<Document>> {
        let mut seen = std::collections::HashSet::new();
        self.entries
            .iter()
            .flat_map(|e| e.documents.iter())
            .filter(|d| seen.insert(d.id.clone()))
            .cloned()
            .collect()
    }
}

/// Chronological sequence of topical nodes.
#[derive(Debug, Clone, Serialize)]
pub struct Timeline {
    expiry: i64,
    nodes: Vec<TimelineNode>,
}

impl Timeline {
    pub fn new(expiry: i64) -> Self {
        Self {
            expiry,
            nodes: Vec::new(),
        }
    }

    pub fn expiry(&self) -> i64 {
        self.expiry
    }

    pub fn nodes(&self) -> &[TimelineNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether an equal topic vector exists in any node.
    pub fn contains_topic(&self, topic: &TermWeights) -> bool {
        self.nodes.iter().flat_map(|n| n.topics()).any(|t| t == topic)
    }

    /// Add `cluster` with `topic` at `timestamp`.
    ///
    /// Opens a new node first when there is none or the last one expired.
    /// Returns `false` when an equal topic already exists, in which case
    /// nothing is appended.
    pub fn add(&mut self, timestamp: i64, cluster: &Cluster, topic: TermWeights) -> bool {
        let open = match self.nodes.last() {
            Some(node) => !node.expired(self.expiry, timestamp),
            None => false,
        };
        if !open {
            self.nodes.push(TimelineNode::new(timestamp));
        }

        if self.contains_topic(&topic) {
            return false;
        }

        let Some(node) = self.nodes.last_mut() else {
            return false;
        };
        node.entries.push(TopicEntry {
            cluster: cluster.id(),
            topic,
            documents: cluster.documents().to_vec(),
        });
        node.last_updated = timestamp;
        true
    }
}
