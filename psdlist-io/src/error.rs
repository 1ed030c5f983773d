//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Memory mapping error.
    #[error("memory mapping error: {0}")]
    MmapError(String),

    /// Decoding error.
    #[error("decode error: {0}")]
    CoreError(#[from] psdlist_core::Error),
}

impl Error {
    /// Returns the decoder error, if this is one.
    #[must_use]
    pub fn as_core(&self) -> Option<&psdlist_core::Error> {
        match self {
            Self::CoreError(e) => Some(e),
            _ => None,
        }
    }
}
