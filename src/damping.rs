//! Repost damping.
//!
//! Reposts say less about what is happening *now* the longer they trail
//! the original. Each document contributes to the nutrition stores with a
//! weight in `[0, 1]`:
//!
//! ```text
//! original or quote:  1.0
//! plain repost:       exp(-rate * minutes since the original)
//! ```

use tdt_core::document::Document;
use tdt_core::error::{ensure_range, Result};

#[derive(Debug, Clone, Copy)]
pub struct Damping {
    rate: f64,
}

impl Damping {
    /// `rate` is per minute and must be `>= 0`.
    pub fn new(rate: f64) -> Result<Self> {
        ensure_range("damping", rate, 0.0, f64::MAX)?;
        Ok(Self { rate })
    }

    pub fn weight(&self, document: &Document) -> f64 {
        if !document.meta.is_repost() {
            return 1.0;
        }
        let Some(original) = document.meta.repost_of else {
            return 1.0;
        };
        let minutes = (document.timestamp - original).max(0) as f64 / 60.0;
        (-self.rate * minutes).exp().clamp(0.0, 1.0)
    }
}
