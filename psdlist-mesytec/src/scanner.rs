//! Separator marker search.
//!
//! Uses the Horspool variant of Boyer-Moore: on a mismatch the window is
//! shifted by the distance of its trailing byte from the end of the marker.

use crate::stream::ByteStream;
use psdlist_core::{Error, Result, BLOCK_SEPARATOR, HEADER_SEPARATOR, MARKER_LEN};

/// Finds occurrences of a fixed 8-byte marker in a [`ByteStream`].
#[derive(Debug, Clone)]
pub struct SeparatorScanner {
    marker: [u8; MARKER_LEN],
    skip: [usize; 256],
}

impl SeparatorScanner {
    /// Builds the skip table for `marker`.
    #[must_use]
    pub fn new(marker: [u8; MARKER_LEN]) -> Self {
        let mut skip = [MARKER_LEN; 256];
        for (i, &b) in marker.iter().enumerate().take(MARKER_LEN - 1) {
            skip[usize::from(b)] = MARKER_LEN - 1 - i;
        }
        Self { marker, skip }
    }

    /// Scanner for the end of the file header.
    #[must_use]
    pub fn header() -> Self {
        Self::new(HEADER_SEPARATOR)
    }

    /// Scanner for block separators.
    #[must_use]
    pub fn block() -> Self {
        Self::new(BLOCK_SEPARATOR)
    }

    /// Shift applied when the window ends in `byte`.
    #[must_use]
    pub fn shift_for(&self, byte: u8) -> usize {
        self.skip[usize::from(byte)]
    }

    /// Finds the next marker at or after the cursor.
    ///
    /// Returns the bytes between the cursor and the marker and leaves the
    /// stream positioned just after the marker.
    ///
    /// # Errors
    /// Returns [`Error::MarkerNotFound`] when the stream is exhausted; the
    /// stream is then positioned at its end.
    pub fn find_next<'a>(&self, stream: &mut ByteStream<'a>) -> Result<&'a [u8]> {
        let start = stream.position();
        let data = stream.rest();

        let mut i = 0;
        while i + MARKER_LEN <= data.len() {
            let window = &data[i..i + MARKER_LEN];
            if window == self.marker {
                stream.seek(start + i + MARKER_LEN);
                return Ok(&data[..i]);
            }
            i += self.shift_for(window[MARKER_LEN - 1]);
        }

        stream.seek(stream.total_size());
        Err(Error::MarkerNotFound(self.marker))
    }
}
