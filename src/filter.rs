//! Item validity filter.
//!
//! Cheap spam and language heuristics applied to raw items before they are
//! tokenized. The rule set depends on the [`FilteringLevel`]:
//!
//! | Rule | lenient | strict |
//! |------|:-------:|:------:|
//! | language is English | ✓ | ✓ |
//! | at most 2 hashtags | ✓ | ✓ |
//! | at most 1 URL | ✓ | ✓ |
//! | author has favourited something | | ✓ |
//! | at least one follower per thousand statuses | | ✓ |
//! | author bio is not empty | | ✓ |
//!
//! With [`FilteringLevel::None`] every item passes.

use tdt_core::admission::FilteringLevel;

use crate::models::Item;

const MAX_HASHTAGS: usize = 2;
const MAX_URLS: usize = 1;
const MIN_FOLLOWER_RATIO: f64 = 1e-3;

#[derive(Debug, Clone, Copy, Default)]
pub struct ItemFilter {
    pub level: FilteringLevel,
}

impl ItemFilter {
    pub fn new(level: FilteringLevel) -> Self {
        Self { level }
    }

    pub fn accepts(&self, item: &Item) -> bool {
        if self.level == FilteringLevel::None {
            return true;
        }

        let english = item.lang.as_deref() == Some("en");
        if !english || item.hashtags.len() > MAX_HASHTAGS || item.urls.len() > MAX_URLS {
            return false;
        }
        if self.level == FilteringLevel::Lenient {
            return true;
        }

        let author = &item.author;
        // an author without statuses has nothing to be a spammer with
        let ratio = author.followers as f64 / author.statuses.max(1) as f64;
        author.favourites > 0 && ratio >= MIN_FOLLOWER_RATIO && !author.bio.trim().is_empty()
    }

    /// Keep accepted items in order; return them with the number rejected.
    pub fn apply(&self, items: Vec<Item>) -> (Vec<Item>, usize) {
        let total = items.len();
        let kept: Vec<Item> = items.into_iter().filter(|i| self.accepts(i)).collect();
        let rejected = total - kept.len();
        (kept, rejected)
    }
}
