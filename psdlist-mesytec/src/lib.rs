//! psdlist-mesytec: mesytec PSD list-mode decoder.
//!
//! This crate turns the raw list-mode byte stream written by mesytec
//! detector front-ends into per-pixel time-of-flight lists.
//!
//! # Key Components
//!
//! - [`ByteStream`] - Index-based big-endian byte cursor
//! - [`SeparatorScanner`] - Horspool search for the 8-byte framing markers
//! - [`ChunkSplitter`] - Block-aligned chunking for parallel decoding
//! - [`BlockDecoder`] - Buffer header and event record decoding
//! - [`EventAccumulator`] / [`merge`] - Per-chunk storage and merge
//! - [`TimeSynchronizer`] - Chopper trigger matching
//! - [`ListmodeDecoder`] - The whole pipeline
//!
//! # Processing Pipeline
//!
//! 1. **Phase 1 (Sequential)**: Validate the header, split into chunks
//! 2. **Phase 2 (Parallel)**: Decode chunks into accumulators
//! 3. **Phase 3 (Parallel per pixel)**: Merge and sort
//! 4. **Phase 4 (Sequential)**: Synchronize to chopper triggers

pub mod accumulator;
pub mod block;
pub mod config;
pub mod decoder;
pub mod scanner;
pub mod splitter;
pub mod stream;
pub mod sync;

pub use accumulator::{merge, DecodeStatistics, EventAccumulator};
pub use block::{has_next_block, parse_buffer_header, parse_file_header, read_block, BlockDecoder};
pub use config::{DecoderConfig, InstrumentConfig, InstrumentParameters};
pub use decoder::{DecodedRun, ListmodeDecoder, Stage, TofSink};
pub use scanner::SeparatorScanner;
pub use splitter::{Chunk, ChunkSplitter, MIN_CHUNK_BYTES};
pub use stream::{ByteStream, Endianness};
pub use sync::{chopper_timestamp, time_of_flight, SyncOutput, TimeSynchronizer};

// Re-export core types for convenience
pub use psdlist_core::{CancellationToken, Error, Result};
