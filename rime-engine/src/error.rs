//! Error types for the rating inference engine

use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine error taxonomy.
///
/// Only conditions that would corrupt the shadow state or silently
/// misclassify ownership surface here; locally recoverable conditions
/// (no rated children, absent critic rating, no manual twin) are policy
/// and never become errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// External catalog write still failing after bounded retries.
    /// The run aborts with the checkpoint at the last successful commit.
    #[error("Catalog write failed after {attempts} attempts: {message}")]
    CatalogWrite { attempts: u32, message: String },

    /// Catalog request or response failure
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Bulk exchange file error
    #[error("Bulk file error: {0}")]
    Bulk(#[from] csv::Error),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Shared error from rime-common (database, config, identity)
    #[error(transparent)]
    Common(#[from] rime_common::Error),
}

impl EngineError {
    /// Convenience for configuration validation failures
    pub fn config(msg: impl Into<String>) -> Self {
        EngineError::Common(rime_common::Error::Config(msg.into()))
    }
}
