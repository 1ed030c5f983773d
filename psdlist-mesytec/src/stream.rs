//! Sequential byte cursor over list-mode data.

use psdlist_core::{Error, Result};

/// Byte order of multi-byte integers in a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    /// Most significant byte first (the list-mode default).
    #[default]
    Big,
    /// Least significant byte first.
    Little,
}

/// Index-based cursor over a byte slice.
///
/// The slice may be a memory-mapped file or an in-memory buffer; the cursor
/// only ever stores an offset into it.
#[derive(Debug, Clone)]
pub struct ByteStream<'a> {
    data: &'a [u8],
    pos: usize,
    endianness: Endianness,
}

impl<'a> ByteStream<'a> {
    /// Creates a big-endian stream positioned at the start of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_endianness(data, Endianness::Big)
    }

    /// Creates a stream with an explicit byte order.
    #[must_use]
    pub fn with_endianness(data: &'a [u8], endianness: Endianness) -> Self {
        Self {
            data,
            pos: 0,
            endianness,
        }
    }

    /// Byte order used by the integer readers.
    #[must_use]
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Total size of the underlying data in bytes.
    #[must_use]
    pub fn total_size(&self) -> usize {
        self.data.len()
    }

    /// Current cursor offset.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left after the cursor.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns true when no bytes are left.
    #[must_use]
    pub fn at_eof(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Returns the next byte without consuming it, `None` at end of stream.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Reads a 16-bit word at an absolute offset without moving the cursor.
    #[must_use]
    pub fn u16_at(&self, offset: usize) -> Option<u16> {
        let bytes: [u8; 2] = self.data.get(offset..offset.checked_add(2)?)?.try_into().ok()?;
        Some(match self.endianness {
            Endianness::Big => u16::from_be_bytes(bytes),
            Endianness::Little => u16::from_le_bytes(bytes),
        })
    }

    /// Returns the unread bytes without consuming them.
    #[must_use]
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Returns the bytes between two absolute offsets.
    ///
    /// Offsets are clamped to the data length.
    #[must_use]
    pub fn slice(&self, start: usize, end: usize) -> &'a [u8] {
        let end = end.min(self.data.len());
        &self.data[start.min(end)..end]
    }

    /// Advances the cursor by up to `n` bytes, stopping at the end.
    pub fn skip(&mut self, n: usize) {
        self.pos = self.pos.saturating_add(n).min(self.data.len());
    }

    /// Moves the cursor to an absolute offset (clamped to the end).
    pub fn seek(&mut self, offset: usize) {
        self.pos = offset.min(self.data.len());
    }

    /// Reads exactly `n` bytes.
    ///
    /// # Errors
    /// Returns [`Error::Truncated`] if fewer than `n` bytes remain; the
    /// cursor is left unchanged in that case.
    pub fn read_exact(&mut self, n: usize) -> Result<&'a [u8]> {
        let available = self.remaining();
        if n > available {
            return Err(Error::Truncated {
                offset: self.pos,
                needed: n,
                available,
            });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Reads `N` bytes into an array.
    ///
    /// # Errors
    /// Returns [`Error::Truncated`] if fewer than `N` bytes remain.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_exact(N)?);
        Ok(out)
    }

    /// Reads one byte.
    ///
    /// # Errors
    /// Returns [`Error::Truncated`] at end of stream.
    pub fn read_u8(&mut self) -> Result<u8> {
        let [b] = self.read_array::<1>()?;
        Ok(b)
    }

    /// Reads a 16-bit word in the stream's byte order.
    ///
    /// # Errors
    /// Returns [`Error::Truncated`] if fewer than two bytes remain.
    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_array::<2>()?;
        Ok(match self.endianness {
            Endianness::Big => u16::from_be_bytes(bytes),
            Endianness::Little => u16::from_le_bytes(bytes),
        })
    }
}
