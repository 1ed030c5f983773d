//! psdlist-core: Core types for mesytec PSD list-mode data.
//!
//! This crate provides the framing markers, packed event record accessors,
//! buffer header and pixel addressing shared by the decoder and I/O crates.
//!

pub mod cancel;
pub mod error;
pub mod event;
pub mod header;
pub mod marker;
pub mod pixel;

pub use cancel::CancellationToken;
pub use error::{Error, Result};
pub use event::{CompactEvent, EventKind, EventWord};
pub use header::BufferHeader;
pub use marker::{BLOCK_SEPARATOR, CLOSING_SIGNATURE, HEADER_SEPARATOR, MAGIC_TEXT, MARKER_LEN};
pub use pixel::{PixelIndex, DETECTOR_PIXEL_COUNT};
