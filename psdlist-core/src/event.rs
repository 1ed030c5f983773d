//! Packed 48-bit event records and the compact event type.
//!
//! An event record is three 16-bit words. Assembled into a 48-bit value
//! (first word least significant) the layout is:
//!
//! ```text
//!  47 | 46..44 | 43..40  | 39..19              | 18..0
//!  1  | trig   | data id | data (ignored)      | local time     Trigger
//!  0  | module | slot (43..39) | amp (38..29) | pos (28..19) | local time   Neutron
//! ```

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Mask for the 19-bit local time field.
pub const LOCAL_TIME_MASK: u64 = 0x7_FFFF;

/// Trigger id reported by the front-end for register changes.
pub const TRIGGER_ID_REGISTER_CHANGE: u8 = 7;

/// Assembles a 48-bit value from three words, `w3` most significant.
#[inline]
#[must_use]
pub fn assemble_words(w1: u16, w2: u16, w3: u16) -> u64 {
    (u64::from(w3) << 32) | (u64::from(w2) << 16) | u64::from(w1)
}

/// Splits a 48-bit value back into `(w1, w2, w3)`.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn split_words(value: u64) -> (u16, u16, u16) {
    (
        (value & 0xFFFF) as u16,
        ((value >> 16) & 0xFFFF) as u16,
        ((value >> 32) & 0xFFFF) as u16,
    )
}

/// Classification of an event record by its discriminator bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EventKind {
    /// Detector hit.
    Neutron,
    /// Trigger or register-change notification.
    Trigger,
}

/// A raw 48-bit event record with named field accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventWord(u64);

#[allow(clippy::cast_possible_truncation)]
impl EventWord {
    /// Wraps a raw value; bits above 47 are discarded.
    #[inline]
    #[must_use]
    pub fn new(raw: u64) -> Self {
        Self(raw & 0xFFFF_FFFF_FFFF)
    }

    /// Builds the record from its three words as read from the stream.
    #[inline]
    #[must_use]
    pub fn from_words(w1: u16, w2: u16, w3: u16) -> Self {
        Self(assemble_words(w1, w2, w3))
    }

    /// Returns the raw 48-bit value.
    #[inline]
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Discriminator bit 47.
    #[inline]
    #[must_use]
    pub fn kind(self) -> EventKind {
        if (self.0 >> 47) & 0x1 == 1 {
            EventKind::Trigger
        } else {
            EventKind::Neutron
        }
    }

    /// Time offset relative to the buffer header timestamp (bits 0..18).
    #[inline]
    #[must_use]
    pub fn local_time(self) -> u64 {
        self.0 & LOCAL_TIME_MASK
    }

    /// Trigger id (bits 44..46), trigger records only.
    #[inline]
    #[must_use]
    pub fn trigger_id(self) -> u8 {
        ((self.0 >> 44) & 0x7) as u8
    }

    /// Trigger data id (bits 40..43), trigger records only.
    #[inline]
    #[must_use]
    pub fn data_id(self) -> u8 {
        ((self.0 >> 40) & 0xF) as u8
    }

    /// Module id (bits 44..46), neutron records only.
    #[inline]
    #[must_use]
    pub fn module_id(self) -> u8 {
        ((self.0 >> 44) & 0x7) as u8
    }

    /// Slot / channel within the device (bits 39..43), neutron records only.
    #[inline]
    #[must_use]
    pub fn slot(self) -> u8 {
        ((self.0 >> 39) & 0x1F) as u8
    }

    /// Pulse amplitude (bits 29..38), neutron records only.
    #[inline]
    #[must_use]
    pub fn amplitude(self) -> u16 {
        ((self.0 >> 29) & 0x3FF) as u16
    }

    /// Position along the detector tube (bits 19..28), neutron records only.
    #[inline]
    #[must_use]
    pub fn position(self) -> u16 {
        ((self.0 >> 19) & 0x3FF) as u16
    }

    /// Returns true for a register-change trigger on the given chopper
    /// channel (1-4). Data ids 0-3 map to chopper channels 1-4.
    #[inline]
    #[must_use]
    pub fn is_chopper_trigger(self, chopper_channel: u8) -> bool {
        self.kind() == EventKind::Trigger
            && self.trigger_id() == TRIGGER_ID_REGISTER_CHANGE
            && chopper_channel >= 1
            && self.data_id() == chopper_channel - 1
    }
}

/// A decoded event reduced to its absolute timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CompactEvent {
    /// Absolute timestamp in front-end ticks.
    pub timestamp: u64,
}

impl CompactEvent {
    /// Creates a new compact event.
    #[inline]
    #[must_use]
    pub fn new(timestamp: u64) -> Self {
        Self { timestamp }
    }
}
