//! Error types for vislog
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using VislogError
pub type Result<T> = std::result::Result<T, VislogError>;

/// Unified error type for vislog operations
#[derive(Debug, Error)]
pub enum VislogError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("Truncated frame: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("Codec error: {0}")]
    Codec(String),

    // -------------------------------------------------------------------------
    // Index Errors
    // -------------------------------------------------------------------------
    #[error("Index corruption detected: {0}")]
    Corruption(String),

    #[error("Id space exhausted")]
    IdsExhausted,

    // -------------------------------------------------------------------------
    // Streaming Errors
    // -------------------------------------------------------------------------
    #[error("Bad entry offsets: beg={beg} end={end}")]
    Range { beg: u64, end: u64 },

    #[error("Stream cancelled")]
    Cancelled,

    #[error("Loader thread panicked")]
    LoaderPanicked,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store was opened read-only")]
    ReadOnly,
}

impl VislogError {
    /// True for failures to decode bytes (truncated or malformed frames).
    ///
    /// A linear scan treats these as the end of the log.
    pub fn is_codec(&self) -> bool {
        matches!(self, VislogError::Truncated { .. } | VislogError::Codec(_))
    }
}

impl From<bincode::Error> for VislogError {
    fn from(e: bincode::Error) -> Self {
        VislogError::Codec(e.to_string())
    }
}
