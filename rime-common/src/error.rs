//! Common error types for RIME

use thiserror::Error;

/// Common result type for RIME operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the RIME tools
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Shadow state is stamped for a different library
    #[error("Library identity mismatch: state belongs to {stored}, catalog reports {found}")]
    IdentityMismatch { stored: String, found: String },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
