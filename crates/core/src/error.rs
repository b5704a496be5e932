//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("unknown asset domain: {0}")]
    UnknownDomain(String),

    #[error("invalid variant spec {filename}: {reason}")]
    InvalidVariantSpec { filename: String, reason: String },

    #[error("invalid image status: {0}")]
    InvalidStatus(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
