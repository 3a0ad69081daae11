//! Error types for canopy-codec.

use thiserror::Error;

/// Result type for record encoding and decoding.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors that can occur while encoding or decoding a record.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The buffer ended before the header or an element was complete.
    #[error("record truncated: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    /// Bytes were left over after the declared element count was decoded.
    #[error("record has {0} trailing bytes after its last element")]
    TrailingBytes(usize),

    /// The element codec rejected a value.
    #[error("element codec error: {0}")]
    Element(#[from] bincode::Error),

    /// A count does not fit the platform's `usize`.
    #[error("element count {0} does not fit in memory")]
    CountOverflow(u64),
}
