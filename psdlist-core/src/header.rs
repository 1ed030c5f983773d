//! Data buffer header.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Size of the buffer header in 16-bit words, parameters included.
pub const HEADER_WORDS: u16 = 21;

/// Bytes of named header fields.
pub const HEADER_FIELD_BYTES: usize = 18;

/// Bytes of the four 48-bit parameter counters following the fields.
pub const HEADER_PARAMETER_BYTES: usize = 24;

/// Size of one event record in 16-bit words.
pub const EVENT_WORDS: u16 = 3;

/// Size of one event record in bytes.
pub const EVENT_BYTES: usize = 6;

/// Header preceding the event records of every data block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BufferHeader {
    /// Buffer length in 16-bit words, header included.
    pub buffer_length: u16,
    /// Buffer format version.
    pub buffer_version: u16,
    /// Header length in 16-bit words.
    pub header_length: u16,
    /// Running buffer number.
    pub buffer_number: u16,
    /// Run id.
    pub run_id: u16,
    /// Front-end device id.
    pub device_id: u8,
    /// Front-end status bits.
    pub device_status: u8,
    /// 48-bit header timestamp.
    pub timestamp: u64,
}

impl BufferHeader {
    /// Number of event records announced by `buffer_length`, or `None` if
    /// the length is smaller than the header itself.
    #[inline]
    #[must_use]
    pub fn event_count(&self) -> Option<usize> {
        self.buffer_length
            .checked_sub(HEADER_WORDS)
            .map(|words| usize::from(words / EVENT_WORDS))
    }

    /// Absolute timestamp of an event with the given local time.
    #[inline]
    #[must_use]
    pub fn absolute_time(&self, local_time: u64) -> u64 {
        self.timestamp + local_time
    }
}
