//! Raw stream items and their conversion into documents.
//!
//! An [`Item`] is the typed shape accepted at the queue boundary, one JSON
//! object per post. Source-specific schemas are mapped onto it before
//! enqueueing; everything downstream of the queue only ever sees
//! [`Document`]s.

use serde::{Deserialize, Serialize};
use tdt_core::document::{Document, DocumentMeta, TermWeighting, Tokenizer};
use uuid::Uuid;

/// The post a repost or quote refers to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Origin {
    #[serde(default)]
    pub id: Option<String>,
    /// Publication time of the original post, in seconds.
    pub timestamp: i64,
    /// Text of the original post. Plain reposts are weighed on this text.
    #[serde(default)]
    pub text: Option<String>,
}

/// Author statistics used by the validity filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub statuses: u64,
    #[serde(default)]
    pub favourites: u64,
    #[serde(default)]
    pub bio: String,
}

/// One post from the ingestion source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default)]
    pub id: Option<String>,
    pub text: String,
    /// Publication time, in seconds.
    pub timestamp: i64,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub reply: bool,
    /// Set for reposts and quotes.
    #[serde(default)]
    pub origin: Option<Origin>,
    /// A quote carries its own commentary in `text`.
    #[serde(default)]
    pub quoted: bool,
    #[serde(default)]
    pub author: Author,
}

impl Item {
    /// Build an item with just text and a timestamp.
    pub fn new(text: impl Into<String>, timestamp: i64) -> Self {
        Self {
            text: text.into(),
            timestamp,
            ..Default::default()
        }
    }

    /// A repost that does not add commentary.
    pub fn is_plain_repost(&self) -> bool {
        self.origin.is_some() && !self.quoted
    }

    /// The text the document is weighed on: the original's text for plain
    /// reposts when available, the item's own text otherwise.
    pub fn content(&self) -> &str {
        match &self.origin {
            Some(Origin {
                text: Some(text), ..
            }) if !self.quoted => text,
            _ => &self.text,
        }
    }

    /// Convert into a [`Document`], generating an id when the item has none.
    pub fn to_document(
        &self,
        tokenizer: &dyn Tokenizer,
        weighting: &dyn TermWeighting,
    ) -> tdt_core::Result<Document> {
        let id = self
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let meta = DocumentMeta {
            repost_of: self.origin.as_ref().map(|o| o.timestamp),
            quoted: self.quoted,
            urls: self.urls.len(),
            reply: self.reply || self.text.starts_with('@'),
        };
        Document::from_text(
            id,
            self.timestamp,
            self.content(),
            tokenizer,
            weighting,
            meta,
        )
    }
}
