//! Error types for psdlist-core.

use crate::marker::format_marker;
use thiserror::Error;

/// Result type alias for psdlist operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structural decode errors.
///
/// Every variant is fatal for the decode it occurs in. Recoverable data
/// problems (bad pixel indices, foreign triggers) are counted instead, see
/// `DecodeStatistics` in psdlist-mesytec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The file does not start with the list-mode magic text or its header
    /// marker is missing.
    #[error("not a recognized list-mode file: {0}")]
    InvalidHeader(String),

    /// A block did not end with the block separator.
    #[error(
        "corrupt block at offset {offset}: found separator {} but expected {}",
        format_marker(.found),
        format_marker(.expected)
    )]
    Integrity {
        /// Byte offset of the bad separator within its chunk.
        offset: usize,
        /// Bytes found where the separator should be.
        found: [u8; 8],
        /// The block separator.
        expected: [u8; 8],
    },

    /// A buffer header announced fewer words than the header itself needs.
    #[error("invalid buffer length {0} (must be at least 21 words)")]
    InvalidBufferLength(u16),

    /// The stream ended in the middle of a field.
    #[error("truncated stream at offset {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        /// Cursor position when the read was attempted.
        offset: usize,
        /// Bytes requested.
        needed: usize,
        /// Bytes left in the stream.
        available: usize,
    },

    /// A separator marker was not found before the end of the stream.
    #[error("marker {} not found", format_marker(.0))]
    MarkerNotFound([u8; 8]),

    /// The decode was cancelled; all output was discarded.
    #[error("decode cancelled")]
    Cancelled,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Shifts stream offsets by `base`, turning chunk-relative positions
    /// into file positions.
    #[must_use]
    pub fn with_base_offset(self, base: usize) -> Self {
        match self {
            Error::Integrity {
                offset,
                found,
                expected,
            } => Error::Integrity {
                offset: offset + base,
                found,
                expected,
            },
            Error::Truncated {
                offset,
                needed,
                available,
            } => Error::Truncated {
                offset: offset + base,
                needed,
                available,
            },
            other => other,
        }
    }
}
