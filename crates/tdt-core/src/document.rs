//! Documents and the tokenizer collaborator.
//!
//! A [`Document`] is the single concrete shape every raw item is converted
//! into at the queue boundary: a normalised sparse term vector, an integer
//! timestamp, the original text, and the few metadata flags the engine reads
//! (repost origin, URL count, reply flag). Documents are immutable once
//! built and are shared as `Arc<Document>` between clusters and timelines.
//!
//! Turning text into terms is delegated to two small traits,
//! [`Tokenizer`] and [`TermWeighting`]. The defaults ([`WordTokenizer`],
//! [`TermFrequency`]) are deliberately simple; callers inject richer ones.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TdtError};
use crate::vector::{normalize, TermWeights};

/// Flags carried over from the raw item that influence weighting and
/// cluster admission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    /// Timestamp of the original post when this document is a repost.
    #[serde(default)]
    pub repost_of: Option<i64>,
    /// Whether the document quotes another post with its own commentary.
    #[serde(default)]
    pub quoted: bool,
    /// Number of URLs (links and media) in the original item.
    #[serde(default)]
    pub urls: usize,
    /// Whether the document is a reply.
    #[serde(default)]
    pub reply: bool,
}

impl DocumentMeta {
    /// A repost that is not a quote.
    pub fn is_repost(&self) -> bool {
        self.repost_of.is_some() && !self.quoted
    }
}

/// A weighted, timestamped document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    /// Seconds since the epoch (or any monotonic stream origin). Never negative.
    pub timestamp: i64,
    pub text: String,
    /// Unit-length term vector.
    pub vector: TermWeights,
    #[serde(default)]
    pub meta: DocumentMeta,
}

impl Document {
    /// Build a document from an already-weighted vector. The vector is
    /// normalised to unit length.
    pub fn new(
        id: impl Into<String>,
        timestamp: i64,
        text: impl Into<String>,
        mut vector: TermWeights,
        meta: DocumentMeta,
    ) -> Result<Self> {
        if timestamp < 0 {
            return Err(TdtError::InvalidDocument(format!(
                "negative timestamp {}",
                timestamp
            )));
        }
        normalize(&mut vector);
        Ok(Self {
            id: id.into(),
            timestamp,
            text: text.into(),
            vector,
            meta,
        })
    }

    /// Tokenize and weigh `text`, then build the document.
    pub fn from_text(
        id: impl Into<String>,
        timestamp: i64,
        text: impl Into<String>,
        tokenizer: &dyn Tokenizer,
        weighting: &dyn TermWeighting,
        meta: DocumentMeta,
    ) -> Result<Self> {
        let text = text.into();
        let tokens = tokenizer.tokenize(&text);
        let vector = weighting.weigh(&tokens);
        Self::new(id, timestamp, text, vector, meta)
    }
}

/// Latest timestamp among `documents`.
///
/// Fails with [`TdtError::EmptyInput`] when there is nothing to look at.
pub fn latest_timestamp<'a, I>(documents: I) -> Result<i64>
where
    I: IntoIterator<Item = &'a Document>,
{
    documents
        .into_iter()
        .map(|d| d.timestamp)
        .max()
        .ok_or(TdtError::EmptyInput("latest timestamp of no documents"))
}

/// Splits text into an ordered sequence of terms.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// Turns a token sequence into a term-weight vector.
pub trait TermWeighting: Send + Sync {
    fn weigh(&self, tokens: &[String]) -> TermWeights;
}

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her", "was",
    "one", "our", "out", "has", "have", "his", "how", "its", "who", "did", "get", "him", "she",
    "too", "use", "that", "with", "this", "from", "they", "will", "would", "there", "their",
    "what", "about", "which", "when", "were", "been", "than", "then", "them", "into", "just",
    "also", "your", "some", "more", "very",
];

/// Lowercasing word tokenizer for short social-media posts.
///
/// Drops URLs, mentions, numbers and punctuation, keeps hashtag words
/// without the `#`, and removes tokens shorter than `min_length` or found
/// in the stop-word list.
#[derive(Debug, Clone)]
pub struct WordTokenizer {
    pub min_length: usize,
    stopwords: HashSet<String>,
}

impl WordTokenizer {
    pub fn new(min_length: usize) -> Self {
        Self {
            min_length,
            stopwords: STOPWORDS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the stop-word list.
    pub fn with_stopwords<S: Into<String>>(mut self, words: impl IntoIterator<Item = S>) -> Self {
        self.stopwords = words.into_iter().map(Into::into).collect();
        self
    }
}

impl Default for WordTokenizer {
    fn default() -> Self {
        Self::new(3)
    }
}

impl Tokenizer for WordTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        text.split_whitespace()
            .filter(|raw| {
                !raw.starts_with('@')
                    && !raw.starts_with("http://")
                    && !raw.starts_with("https://")
                    && !raw.starts_with("www.")
            })
            .flat_map(|raw| {
                raw.split(|c: char| !c.is_alphanumeric())
                    .map(str::to_lowercase)
                    .collect::<Vec<_>>()
            })
            .filter(|token| {
                token.chars().count() >= self.min_length
                    && !token.chars().all(|c| c.is_numeric())
                    && !self.stopwords.contains(token)
            })
            .collect()
    }
}

/// Raw term frequency.
#[derive(Debug, Clone, Copy, Default)]
pub struct TermFrequency;

impl TermWeighting for TermFrequency {
    fn weigh(&self, tokens: &[String]) -> TermWeights {
        let mut weights = TermWeights::new();
        for token in tokens {
            *weights.entry(token.clone()).or_insert(0.0) += 1.0;
        }
        weights
    }
}
