//! Alignment-specific error types.

use thiserror::Error;

/// Result type for alignment configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Alignment configuration error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Configuration JSON could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
