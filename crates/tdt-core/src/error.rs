//! Error types for the topic detection engine.
//!
//! Only construction-time and boundary problems are errors. Sparse data
//! (missing buckets, empty windows, empty clusters) is resolved with
//! defaults by the components themselves and never reaches this type.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, TdtError>;

/// Errors raised by the engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TdtError {
    /// A parameter is outside its valid range. Raised eagerly, before any
    /// stream processing starts.
    #[error("invalid configuration '{field}': {reason}")]
    Configuration {
        /// The offending option.
        field: &'static str,
        /// Description of what's wrong.
        reason: String,
    },

    /// An operation that needs at least one element received none.
    #[error("empty input: {0}")]
    EmptyInput(&'static str),

    /// An item could not be normalised into a document.
    #[error("invalid document: {0}")]
    InvalidDocument(String),
}

impl TdtError {
    /// Shorthand for a [`TdtError::Configuration`] error.
    pub fn config(field: &'static str, reason: impl Into<String>) -> Self {
        TdtError::Configuration {
            field,
            reason: reason.into(),
        }
    }
}

/// Check that `value` lies in `[min, max]`.
pub fn ensure_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<()> {
    if value.is_nan() || value < min || value > max {
        return Err(TdtError::config(
            field,
            format!("must be in [{}, {}], got {}", min, max, value),
        ));
    }
    Ok(())
}
