//! Fixed framing markers of the mesytec PSD list-mode format.

use std::fmt::Write;

/// Length of every framing marker in bytes.
pub const MARKER_LEN: usize = 8;

/// ASCII text every list-mode file starts with.
pub const MAGIC_TEXT: &[u8] = b"mesytec psd listmode data";

/// Terminates the free-text file header.
pub const HEADER_SEPARATOR: [u8; MARKER_LEN] = [0x00, 0x00, 0x55, 0x55, 0xAA, 0xAA, 0xFF, 0xFF];

/// Terminates every data block.
pub const BLOCK_SEPARATOR: [u8; MARKER_LEN] = [0x00, 0x00, 0xFF, 0xFF, 0x55, 0x55, 0xAA, 0xAA];

/// Optional trailer after the last block.
pub const CLOSING_SIGNATURE: [u8; MARKER_LEN] = [0xFF, 0xFF, 0xAA, 0xAA, 0x55, 0x55, 0x00, 0x00];

/// Formats marker bytes as space separated lowercase hex.
#[must_use]
pub fn format_marker(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{b:02x}");
    }
    out
}
