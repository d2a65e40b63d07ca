//! Sparse term-weight vectors and similarity computation.
//!
//! Documents, centroids, nutrition sets and topics are all sparse maps from
//! a term to a weight. The helpers here are pure functions over
//! [`TermWeights`]; none of them allocate more than the result they return.

use std::collections::HashMap;

/// A sparse vector: term → weight. Absent terms have weight `0.0`.
pub type TermWeights = HashMap<String, f64>;

/// Euclidean length of a sparse vector.
pub fn magnitude(v: &TermWeights) -> f64 {
    v.values().map(|w| w * w).sum::<f64>().sqrt()
}

/// Scale `v` in place to unit length. A zero vector is left untouched.
pub fn normalize(v: &mut TermWeights) {
    let mag = magnitude(v);
    if mag < f64::EPSILON {
        return;
    }
    for w in v.values_mut() {
        *w /= mag;
    }
}

/// Return a copy of `v` scaled so its largest weight is `1.0`.
///
/// Nutrition sets are compared on a `[0, 1]` scale, so every aggregated
/// window goes through this before it reaches the burst detector. An empty
/// vector, or one without a positive weight, is returned unchanged.
pub fn rescale(v: &TermWeights) -> TermWeights {
    let max = v.values().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max.is_nan() || max <= 0.0 {
        return v.clone();
    }
    v.iter().map(|(t, w)| (t.clone(), w / max)).collect()
}

/// Add `scale × source` into `target`.
pub fn add_scaled(target: &mut TermWeights, source: &TermWeights, scale: f64) {
    for (term, w) in source {
        *target.entry(term.clone()).or_insert(0.0) += w * scale;
    }
}

/// Sum a sequence of vectors into one.
pub fn concatenate<'a>(vectors: impl IntoIterator<Item = &'a TermWeights>) -> TermWeights {
    let mut sum = TermWeights::new();
    for v in vectors {
        add_scaled(&mut sum, v, 1.0);
    }
    sum
}

/// Compute cosine similarity between two sparse vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (no shared terms)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` when either vector is empty or has zero length.
pub fn cosine_similarity(a: &TermWeights, b: &TermWeights) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot: f64 = small
        .iter()
        .filter_map(|(term, x)| large.get(term).map(|y| x * y))
        .sum();

    let denom = magnitude(a) * magnitude(b);
    if denom < f64::EPSILON {
        return 0.0;
    }

    (dot / denom).clamp(-1.0, 1.0)
}

/// Build a vector from `(term, weight)` pairs.
pub fn from_pairs<S: Into<String>>(pairs: impl IntoIterator<Item = (S, f64)>) -> TermWeights {
    pairs.into_iter().map(|(t, w)| (t.into(), w)).collect()
}
