//! End-to-end list-mode decode pipeline.
//!
//! 1. **Sequential**: validate the file header, split the block section into
//!    block-aligned chunks.
//! 2. **Parallel**: decode each chunk into its own [`EventAccumulator`].
//! 3. **Parallel over pixels**: merge and sort the accumulators.
//! 4. **Sequential**: match neutron events to chopper triggers.
//!
//! A structural error in any chunk aborts the whole decode; nothing is
//! returned in that case.

use crate::accumulator::{merge, DecodeStatistics, EventAccumulator};
use crate::block::{parse_file_header, BlockDecoder};
use crate::config::{DecoderConfig, InstrumentParameters};
use crate::splitter::ChunkSplitter;
use crate::stream::ByteStream;
use crate::sync::TimeSynchronizer;
use psdlist_core::{CancellationToken, Error, Result};
use rayon::prelude::*;
use std::fmt;

/// Progress of a [`ListmodeDecoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// No decode started.
    Idle,
    /// File header matched the list-mode magic text.
    HeaderValidated,
    /// Cutting the block section into chunks.
    Splitting,
    /// Chunks are being decoded in parallel.
    Decoding,
    /// Per-chunk events are being merged.
    Merging,
    /// Neutron events are being matched to chopper triggers.
    Synchronizing,
    /// Decode finished successfully.
    Done,
    /// The file header was rejected.
    HeaderInvalid,
    /// A block failed its integrity checks.
    CorruptBlock,
    /// The stream ended inside a record.
    Truncated,
    /// The decode was cancelled.
    Cancelled,
    /// The decode was rejected for another reason (e.g. configuration).
    Failed,
}

impl Stage {
    /// Terminal stage reached after `error`.
    #[must_use]
    pub fn from_error(error: &Error) -> Self {
        match error {
            Error::InvalidHeader(_) | Error::MarkerNotFound(_) => Stage::HeaderInvalid,
            Error::Integrity { .. } | Error::InvalidBufferLength(_) => Stage::CorruptBlock,
            Error::Truncated { .. } => Stage::Truncated,
            Error::Cancelled => Stage::Cancelled,
            Error::Config(_) => Stage::Failed,
        }
    }

    /// Returns true for stages a decode ends in.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(
            self,
            Stage::Idle
                | Stage::HeaderValidated
                | Stage::Splitting
                | Stage::Decoding
                | Stage::Merging
                | Stage::Synchronizing
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::HeaderValidated => "header validated",
            Stage::Splitting => "splitting",
            Stage::Decoding => "decoding",
            Stage::Merging => "merging",
            Stage::Synchronizing => "synchronizing",
            Stage::Done => "done",
            Stage::HeaderInvalid => "header invalid",
            Stage::CorruptBlock => "corrupt block",
            Stage::Truncated => "truncated",
            Stage::Cancelled => "cancelled",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Receiver of decoded time-of-flight data, e.g. a histogram builder.
pub trait TofSink {
    /// Error type of the sink.
    type Error;

    /// Called once before any pixel data.
    ///
    /// # Errors
    /// Implementation defined.
    fn begin(
        &mut self,
        pixel_count: usize,
        bin_edges: Option<[f64; 2]>,
    ) -> std::result::Result<(), Self::Error>;

    /// Called once per pixel with at least one event.
    ///
    /// # Errors
    /// Implementation defined.
    fn pixel_events(&mut self, pixel: usize, tof: &[f64]) -> std::result::Result<(), Self::Error>;

    /// Called after the last pixel.
    ///
    /// # Errors
    /// Implementation defined.
    fn finish(&mut self) -> std::result::Result<(), Self::Error>;
}

/// Result of a successful decode.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRun {
    /// Free-text file header.
    pub header: String,
    /// Time-of-flight values per pixel.
    pub tof: Vec<Vec<f64>>,
    /// Common bin edges when bin boundaries are normalized.
    pub bin_edges: Option<[f64; 2]>,
    /// Decode counters.
    pub statistics: DecodeStatistics,
}

impl DecodedRun {
    /// Total number of time-of-flight values.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.tof.iter().map(Vec::len).sum()
    }

    /// Iterates over `(pixel, tof)` pairs in pixel order.
    pub fn events(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.tof
            .iter()
            .enumerate()
            .flat_map(|(pixel, values)| values.iter().map(move |&tof| (pixel, tof)))
    }

    /// Hands the decoded data to `sink`.
    ///
    /// # Errors
    /// Propagates the first sink error.
    pub fn write_to<S: TofSink>(&self, sink: &mut S) -> std::result::Result<(), S::Error> {
        sink.begin(self.tof.len(), self.bin_edges)?;
        for (pixel, values) in self.tof.iter().enumerate() {
            if !values.is_empty() {
                sink.pixel_events(pixel, values)?;
            }
        }
        sink.finish()
    }
}

/// Decodes complete list-mode files held in memory.
#[derive(Debug)]
pub struct ListmodeDecoder {
    config: DecoderConfig,
    chopper_channel: u8,
    cancel: CancellationToken,
    stage: Stage,
}

impl ListmodeDecoder {
    /// Creates a decoder; the chopper channel must be set explicitly.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the chopper channel is 0 or out of range.
    pub fn new(config: DecoderConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Creates a decoder resolving a chopper channel of 0 from `instrument`.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the chopper channel cannot be resolved.
    pub fn with_instrument(
        config: DecoderConfig,
        instrument: &dyn InstrumentParameters,
    ) -> Result<Self> {
        Self::build(config, Some(instrument))
    }

    fn build(config: DecoderConfig, instrument: Option<&dyn InstrumentParameters>) -> Result<Self> {
        let chopper_channel = config.resolve_chopper_channel(instrument)?;
        Ok(Self {
            config,
            chopper_channel,
            cancel: CancellationToken::new(),
            stage: Stage::Idle,
        })
    }

    /// Uses `token` for cooperative cancellation.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The resolved chopper channel.
    #[must_use]
    pub fn chopper_channel(&self) -> u8 {
        self.chopper_channel
    }

    /// Current pipeline stage.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Decodes a complete list-mode file.
    ///
    /// # Errors
    /// Returns the first structural error, [`Error::Cancelled`] on
    /// cancellation or [`Error::Config`] if the worker pool cannot be built.
    /// The decoder's stage then reflects the failure.
    pub fn decode(&mut self, data: &[u8]) -> Result<DecodedRun> {
        self.enter(Stage::Idle);
        let result = self.run(data);
        if let Err(e) = &result {
            self.enter(Stage::from_error(e));
        }
        result
    }

    fn enter(&mut self, stage: Stage) {
        log::debug!("list-mode decode: {} -> {}", self.stage, stage);
        self.stage = stage;
    }

    fn run(&mut self, data: &[u8]) -> Result<DecodedRun> {
        let mut stream = ByteStream::new(data);
        let header = String::from_utf8_lossy(parse_file_header(&mut stream)?).into_owned();
        self.enter(Stage::HeaderValidated);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.effective_threads())
            .build()
            .map_err(|e| Error::Config(format!("cannot build worker pool: {e}")))?;
        pool.install(|| self.decode_body(stream, header))
    }

    fn decode_body(&mut self, mut stream: ByteStream<'_>, header: String) -> Result<DecodedRun> {
        self.enter(Stage::Splitting);
        let workers = rayon::current_num_threads();
        let chunks = ChunkSplitter::new(self.config.min_chunk_bytes).split(&mut stream, workers);
        log::debug!(
            "split {} bytes into {} chunks for {} workers",
            stream.total_size(),
            chunks.len(),
            workers
        );
        self.cancel.check()?;

        self.enter(Stage::Decoding);
        let decoder = BlockDecoder::new(self.chopper_channel);
        let accumulators = chunks
            .par_iter()
            .map(|chunk| -> Result<EventAccumulator> {
                let mut acc = EventAccumulator::new();
                decoder.decode_chunk(chunk, &mut acc)?;
                Ok(acc)
            })
            .collect::<Result<Vec<_>>>()?;
        self.cancel.check()?;

        self.enter(Stage::Merging);
        let mut merged = merge(accumulators);
        merged.statistics.chunks = chunks.len() as u64;
        self.cancel.check()?;

        self.enter(Stage::Synchronizing);
        let synchronizer =
            TimeSynchronizer::new(self.config.discard_pre_chopper_events, self.cancel.clone());
        let sync = synchronizer.synchronize(&merged)?;

        let mut statistics = merged.statistics;
        statistics.pre_chopper_discarded = sync.pre_chopper_discarded;
        statistics.emitted_events = sync.emitted;

        let bin_edges = self
            .config
            .normalize_bin_boundaries
            .then(|| [0.0, sync.max_tof.unwrap_or(0.0)]);

        self.enter(Stage::Done);
        statistics.report();

        Ok(DecodedRun {
            header,
            tof: sync.tof,
            bin_edges,
            statistics,
        })
    }
}
