//! psdlist-io: Memory-mapped file I/O for psdlist.
//!
//! This crate maps list-mode files into memory via memmap2, runs them
//! through the decoder and writes the resulting time-of-flight lists.
//!

mod error;
mod reader;
mod writer;

pub use error::{Error, Result};
pub use reader::{BlockScan, ListmodeFileReader, MappedFileReader};
pub use writer::{OutputFormat, TofFileWriter};
