//! Detector pixel addressing.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Positions resolved along one detector tube.
pub const POSITIONS_PER_CHANNEL: usize = 1024;

/// Number of detector channels (tubes).
pub const CHANNEL_COUNT: usize = 128;

/// Total number of detector pixels.
pub const DETECTOR_PIXEL_COUNT: usize = POSITIONS_PER_CHANNEL * CHANNEL_COUNT;

/// Index of a detector pixel in `0..DETECTOR_PIXEL_COUNT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PixelIndex(usize);

impl PixelIndex {
    /// Wraps a raw index, returning `None` when it is out of range.
    #[inline]
    #[must_use]
    pub fn new(index: usize) -> Option<Self> {
        (index < DETECTOR_PIXEL_COUNT).then_some(Self(index))
    }

    /// Computes the pixel for a neutron event.
    ///
    /// The channel combines the device id with the 5-bit slot,
    /// `channel = device_id << 5 | slot`, and the pixel is
    /// `channel * 1024 + position`.
    #[inline]
    #[must_use]
    pub fn from_channel(device_id: u8, slot: u8, position: u16) -> Option<Self> {
        let channel = (usize::from(device_id) << 5) | usize::from(slot & 0x1F);
        let index = channel * POSITIONS_PER_CHANNEL + usize::from(position);
        Self::new(index)
    }

    /// Returns the raw index.
    #[inline]
    #[must_use]
    pub fn as_usize(self) -> usize {
        self.0
    }

    /// Channel (tube) of this pixel.
    #[inline]
    #[must_use]
    pub fn channel(self) -> usize {
        self.0 / POSITIONS_PER_CHANNEL
    }

    /// Position along the tube.
    #[inline]
    #[must_use]
    pub fn position(self) -> usize {
        self.0 % POSITIONS_PER_CHANNEL
    }
}
