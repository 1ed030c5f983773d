//! Block-aligned chunking for parallel decoding.

use crate::scanner::SeparatorScanner;
use crate::stream::ByteStream;
use psdlist_core::header::HEADER_WORDS;
use psdlist_core::{BLOCK_SEPARATOR, MARKER_LEN};

/// Lower bound for the chunk size in bytes.
pub const MIN_CHUNK_BYTES: usize = 1_000_000;

/// A contiguous run of whole blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    /// Byte offset of the chunk within the stream data.
    pub offset: usize,
    /// Chunk contents.
    pub data: &'a [u8],
}

impl Chunk<'_> {
    /// Number of bytes in this chunk.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the chunk holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns true if the chunk ends on a block separator.
    #[must_use]
    pub fn ends_on_separator(&self) -> bool {
        self.data.ends_with(&BLOCK_SEPARATOR)
    }
}

/// Splits the block section of a stream into independently decodable chunks.
#[derive(Debug, Clone)]
pub struct ChunkSplitter {
    min_chunk_bytes: usize,
    scanner: SeparatorScanner,
}

impl Default for ChunkSplitter {
    fn default() -> Self {
        Self::new(MIN_CHUNK_BYTES)
    }
}

impl ChunkSplitter {
    /// Creates a splitter with the given minimum chunk size.
    #[must_use]
    pub fn new(min_chunk_bytes: usize) -> Self {
        Self {
            min_chunk_bytes,
            scanner: SeparatorScanner::block(),
        }
    }

    /// Chunk size used for a stream of `total_size` bytes.
    #[must_use]
    pub fn chunk_size(&self, total_size: usize, target_count: usize) -> usize {
        self.min_chunk_bytes.max(total_size / target_count.max(1))
    }

    /// Splits everything from the cursor to the end of `stream`.
    ///
    /// Each chunk covers at least the chunk size and is then extended to the
    /// end of the next block, so no buffer header or event record straddles
    /// two chunks. A separator match only counts as a boundary when walking
    /// the buffer lengths from the chunk start lands on it; event payloads
    /// may contain the separator bytes. Bytes after the last block (the
    /// closing signature, or a truncated block) form the final chunk.
    /// Concatenating the chunks reproduces the input.
    pub fn split<'a>(&self, stream: &mut ByteStream<'a>, target_count: usize) -> Vec<Chunk<'a>> {
        let chunk_size = self.chunk_size(stream.total_size(), target_count);
        let mut chunks = Vec::with_capacity(target_count.max(1));

        while !stream.at_eof() {
            let start = stream.position();
            // Start the search one marker early so a separator ending
            // exactly on the nominal boundary is found.
            stream.skip(chunk_size.saturating_sub(MARKER_LEN));
            let end = self.next_block_end(stream, start);
            stream.seek(end);
            chunks.push(Chunk {
                offset: start,
                data: stream.slice(start, end),
            });
        }

        chunks
    }

    /// Finds the first separator at or after the cursor that ends a block.
    ///
    /// `block_start` must be the start of a block at or before the cursor.
    /// Returns the stream size when no such separator exists or the block
    /// lengths cannot be followed.
    fn next_block_end(&self, stream: &mut ByteStream<'_>, block_start: usize) -> usize {
        let mut walked = block_start;
        loop {
            if self.scanner.find_next(stream).is_err() {
                log::trace!("no block separator after offset {walked}, closing final chunk");
                return stream.total_size();
            }
            let candidate = stream.position();
            match walk_blocks(stream, walked, candidate) {
                Some(end) if end == candidate => return candidate,
                Some(end) => {
                    // Match inside a block; search again ending at the block end.
                    walked = end;
                    stream.seek(end.saturating_sub(MARKER_LEN));
                }
                None => {
                    log::trace!(
                        "unreadable buffer length after offset {walked}, closing final chunk"
                    );
                    return stream.total_size();
                }
            }
        }
    }
}

/// Hops over whole blocks from `offset` until reaching or passing `target`.
///
/// Returns `None` if a buffer length is missing or shorter than a header.
fn walk_blocks(stream: &ByteStream<'_>, mut offset: usize, target: usize) -> Option<usize> {
    while offset < target {
        let words = stream.u16_at(offset)?;
        if words < HEADER_WORDS {
            return None;
        }
        offset += usize::from(words) * 2 + MARKER_LEN;
    }
    Some(offset)
}
