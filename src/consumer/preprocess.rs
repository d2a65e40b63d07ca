//! Items in, documents out.

use std::sync::Arc;

use tdt_core::document::{Document, TermWeighting, Tokenizer};
use tracing::debug;

use crate::filter::ItemFilter;
use crate::models::Item;

/// Documents produced from one batch of items.
#[derive(Debug, Default)]
pub struct Prepared {
    pub documents: Vec<Arc<Document>>,
    /// Items dropped by the validity filter or rejected during conversion.
    pub filtered: usize,
}

/// Applies the validity filter and converts the survivors with the injected
/// tokenizer and weighting.
#[derive(Clone)]
pub struct Preprocessor {
    filter: ItemFilter,
    tokenizer: Arc<dyn Tokenizer>,
    weighting: Arc<dyn TermWeighting>,
}

impl Preprocessor {
    pub fn new(
        filter: ItemFilter,
        tokenizer: Arc<dyn Tokenizer>,
        weighting: Arc<dyn TermWeighting>,
    ) -> Self {
        Self {
            filter,
            tokenizer,
            weighting,
        }
    }

    pub fn prepare(&self, items: Vec<Item>) -> Prepared {
        let (kept, mut filtered) = self.filter.apply(items);

        let mut documents = Vec::with_capacity(kept.len());
        for item in kept {
            match item.to_document(self.tokenizer.as_ref(), self.weighting.as_ref()) {
                Ok(document) => documents.push(Arc::new(document)),
                Err(e) => {
                    debug!(error = %e, "item rejected");
                    filtered += 1;
                }
            }
        }
        Prepared {
            documents,
            filtered,
        }
    }
}
