//! File header and data block decoding.

use crate::accumulator::EventAccumulator;
use crate::scanner::SeparatorScanner;
use crate::splitter::Chunk;
use crate::stream::ByteStream;
use psdlist_core::header::HEADER_PARAMETER_BYTES;
use psdlist_core::marker::format_marker;
use psdlist_core::{
    BufferHeader, Error, EventKind, EventWord, PixelIndex, Result, BLOCK_SEPARATOR,
    CLOSING_SIGNATURE, MAGIC_TEXT,
};

/// Reads the free-text file header up to and including its separator.
///
/// Returns the header bytes (without the separator).
///
/// # Errors
/// Returns [`Error::InvalidHeader`] if the separator is missing or the
/// header does not start with the list-mode magic text.
pub fn parse_file_header<'a>(stream: &mut ByteStream<'a>) -> Result<&'a [u8]> {
    let header = SeparatorScanner::header()
        .find_next(stream)
        .map_err(|_| Error::InvalidHeader("header separator not found".to_string()))?;

    if !header.starts_with(MAGIC_TEXT) {
        return Err(Error::InvalidHeader(format!(
            "header does not start with \"{}\"",
            String::from_utf8_lossy(MAGIC_TEXT)
        )));
    }
    Ok(header)
}

/// Parses a buffer header and skips its parameter counters.
///
/// # Errors
/// Returns [`Error::Truncated`] if the stream ends inside the header.
pub fn parse_buffer_header(stream: &mut ByteStream<'_>) -> Result<BufferHeader> {
    let buffer_length = stream.read_u16()?;
    let buffer_version = stream.read_u16()?;
    let header_length = stream.read_u16()?;
    let buffer_number = stream.read_u16()?;
    let run_id = stream.read_u16()?;
    let device_id = stream.read_u8()?;
    let device_status = stream.read_u8()?;
    let timestamp = read_word48(stream)?;
    stream.read_exact(HEADER_PARAMETER_BYTES)?;

    Ok(BufferHeader {
        buffer_length,
        buffer_version,
        header_length,
        buffer_number,
        run_id,
        device_id,
        device_status,
        timestamp,
    })
}

/// Reads three words and assembles them, first word least significant.
fn read_word48(stream: &mut ByteStream<'_>) -> Result<u64> {
    let w1 = stream.read_u16()?;
    let w2 = stream.read_u16()?;
    let w3 = stream.read_u16()?;
    Ok(psdlist_core::event::assemble_words(w1, w2, w3))
}

/// Reads one packed event record.
///
/// # Errors
/// Returns [`Error::Truncated`] if fewer than six bytes remain.
pub fn read_event_word(stream: &mut ByteStream<'_>) -> Result<EventWord> {
    read_word48(stream).map(EventWord::new)
}

/// Returns true if another data block starts at the cursor.
///
/// Blocks run until the stream ends or the closing signature starts.
#[must_use]
pub fn has_next_block(stream: &ByteStream<'_>) -> bool {
    stream.peek().is_some_and(|b| b != CLOSING_SIGNATURE[0])
}

/// Reads one block, handing each event record to `visit`, and checks the
/// trailing separator.
///
/// # Errors
/// Returns [`Error::InvalidBufferLength`] for a buffer shorter than its
/// header, [`Error::Truncated`] if the stream ends inside the block and
/// [`Error::Integrity`] if the block separator does not match.
pub fn read_block<F>(stream: &mut ByteStream<'_>, mut visit: F) -> Result<BufferHeader>
where
    F: FnMut(&BufferHeader, EventWord),
{
    let header = parse_buffer_header(stream)?;
    let event_count = header
        .event_count()
        .ok_or(Error::InvalidBufferLength(header.buffer_length))?;

    for _ in 0..event_count {
        visit(&header, read_event_word(stream)?);
    }

    let offset = stream.position();
    let found = stream.read_array::<8>()?;
    if found != BLOCK_SEPARATOR {
        return Err(Error::Integrity {
            offset,
            found,
            expected: BLOCK_SEPARATOR,
        });
    }
    Ok(header)
}

/// Decodes data blocks into an [`EventAccumulator`].
#[derive(Debug, Clone, Copy)]
pub struct BlockDecoder {
    chopper_channel: u8,
}

impl BlockDecoder {
    /// Creates a decoder keeping triggers of `chopper_channel` (1-4).
    #[must_use]
    pub fn new(chopper_channel: u8) -> Self {
        Self { chopper_channel }
    }

    /// Decodes every block of a chunk.
    ///
    /// Error offsets are reported relative to the start of the file.
    ///
    /// # Errors
    /// Returns the first structural error encountered.
    pub fn decode_chunk(&self, chunk: &Chunk<'_>, acc: &mut EventAccumulator) -> Result<()> {
        let mut stream = ByteStream::new(chunk.data);
        self.decode_blocks(&mut stream, acc)
            .map_err(|e| e.with_base_offset(chunk.offset))
    }

    /// Decodes blocks until the stream ends or the closing signature starts.
    ///
    /// # Errors
    /// Returns the first structural error encountered.
    pub fn decode_blocks(
        &self,
        stream: &mut ByteStream<'_>,
        acc: &mut EventAccumulator,
    ) -> Result<()> {
        while has_next_block(stream) {
            self.decode_block(stream, acc)?;
        }
        check_closing_signature(stream);
        Ok(())
    }

    /// Decodes one block: header, event records and trailing separator.
    ///
    /// # Errors
    /// See [`read_block`].
    pub fn decode_block(
        &self,
        stream: &mut ByteStream<'_>,
        acc: &mut EventAccumulator,
    ) -> Result<BufferHeader> {
        let header = read_block(stream, |header, word| self.dispatch(header, word, acc))?;
        acc.record_block();
        Ok(header)
    }

    #[inline]
    fn dispatch(&self, header: &BufferHeader, word: EventWord, acc: &mut EventAccumulator) {
        let timestamp = header.absolute_time(word.local_time());
        match word.kind() {
            EventKind::Trigger => {
                if word.is_chopper_trigger(self.chopper_channel) {
                    acc.add_trigger(timestamp);
                } else {
                    acc.record_foreign_trigger();
                }
            }
            EventKind::Neutron => {
                match PixelIndex::from_channel(header.device_id, word.slot(), word.position()) {
                    Some(pixel) => acc.add_neutron(pixel, timestamp),
                    None => acc.record_bad_pixel(),
                }
            }
        }
    }
}

/// Consumes the remaining bytes, warning if they are not the closing signature.
fn check_closing_signature(stream: &mut ByteStream<'_>) {
    let rest = stream.rest();
    if !rest.is_empty() && rest != CLOSING_SIGNATURE {
        log::warn!(
            "ignoring {} trailing bytes at offset {} that do not match the closing signature {}",
            rest.len(),
            stream.position(),
            format_marker(&CLOSING_SIGNATURE)
        );
    }
    stream.skip(rest.len());
}
