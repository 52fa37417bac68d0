//! Error types for stripsync-core.

use thiserror::Error;

/// Result type alias for stripsync operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for stripsync operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The two redundant trigger counters of a readout entry disagree.
    #[error("integrity mismatch at clock {clock}: counters {counters:?}")]
    IntegrityMismatch { clock: u64, counters: Vec<u32> },

    /// No matching entry pair was found while seeking the stream offset.
    #[error("no matching entries found in the first {window} entries of both streams")]
    AlignmentNotFound { window: usize },

    /// Channel outside the configured detector geometry.
    #[error("invalid channel: layer {layer}, tile {tile}, strip {strip}")]
    InvalidChannel { layer: u16, tile: u16, strip: u16 },

    /// Stream entry index out of range.
    #[error("entry {index} not found (stream length {len})")]
    NotFound { index: usize, len: usize },

    /// A stored record could not be decoded.
    #[error("invalid record at entry {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}
