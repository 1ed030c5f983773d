//! Decoder and instrument configuration.

use crate::splitter::MIN_CHUNK_BYTES;
use psdlist_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Highest chopper channel supported by the front-end.
pub const MAX_CHOPPER_CHANNEL: u8 = 4;

/// Source of instrument-level parameters.
///
/// Used to resolve settings the caller leaves at their "ask the instrument"
/// value, such as a chopper channel of 0.
pub trait InstrumentParameters {
    /// Chopper channel (1-4) wired on this instrument, if known.
    fn chopper_channel(&self) -> Option<u8>;
}

/// Instrument parameters loaded from a JSON file.
///
/// ```json
/// { "instrument": { "chopper_channel": 2 } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// Chopper channel wired on this instrument.
    pub chopper_channel: Option<u8>,
}

#[derive(Deserialize)]
struct JsonInstrumentFile {
    #[serde(default)]
    instrument: InstrumentConfig,
}

impl InstrumentConfig {
    /// Loads instrument parameters from a JSON string.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: JsonInstrumentFile =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        Ok(file.instrument)
    }

    /// Loads instrument parameters from a JSON file.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        let parsed: JsonInstrumentFile = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Ok(parsed.instrument)
    }
}

impl InstrumentParameters for InstrumentConfig {
    fn chopper_channel(&self) -> Option<u8> {
        self.chopper_channel
    }
}

/// Configuration of a list-mode decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Chopper channel 1-4, or 0 to take it from the instrument parameters.
    pub chopper_channel: u8,
    /// Drop neutron events recorded before the first chopper trigger.
    pub discard_pre_chopper_events: bool,
    /// Give all pixels one common bin range `[0, max_tof]`.
    pub normalize_bin_boundaries: bool,
    /// Worker threads; `None` uses the available parallelism.
    pub threads: Option<usize>,
    /// Lower bound for the chunk size in bytes.
    pub min_chunk_bytes: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            chopper_channel: 0,
            discard_pre_chopper_events: true,
            normalize_bin_boundaries: false,
            threads: None,
            min_chunk_bytes: MIN_CHUNK_BYTES,
        }
    }
}

impl DecoderConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the chopper channel.
    #[must_use]
    pub fn with_chopper_channel(mut self, channel: u8) -> Self {
        self.chopper_channel = channel;
        self
    }

    /// Sets whether events before the first chopper trigger are dropped.
    #[must_use]
    pub fn with_discard_pre_chopper_events(mut self, discard: bool) -> Self {
        self.discard_pre_chopper_events = discard;
        self
    }

    /// Sets whether all pixels share one bin range.
    #[must_use]
    pub fn with_normalize_bin_boundaries(mut self, normalize: bool) -> Self {
        self.normalize_bin_boundaries = normalize;
        self
    }

    /// Sets the number of worker threads.
    #[must_use]
    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    /// Sets the minimum chunk size.
    #[must_use]
    pub fn with_min_chunk_bytes(mut self, bytes: usize) -> Self {
        self.min_chunk_bytes = bytes;
        self
    }

    /// Loads a configuration from a JSON string; missing fields keep their
    /// defaults.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Resolves the effective chopper channel.
    ///
    /// A configured channel of 0 is looked up in `instrument`.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the channel cannot be resolved or lies
    /// outside 1-4.
    pub fn resolve_chopper_channel(
        &self,
        instrument: Option<&dyn InstrumentParameters>,
    ) -> Result<u8> {
        let channel = match self.chopper_channel {
            0 => instrument
                .and_then(|params| params.chopper_channel())
                .ok_or_else(|| {
                    Error::Config(
                        "chopper channel is 0 and the instrument does not define one".to_string(),
                    )
                })?,
            channel => channel,
        };

        if !(1..=MAX_CHOPPER_CHANNEL).contains(&channel) {
            return Err(Error::Config(format!(
                "chopper channel {channel} outside 1-{MAX_CHOPPER_CHANNEL}"
            )));
        }
        Ok(channel)
    }

    /// Number of worker threads to use.
    #[must_use]
    pub fn effective_threads(&self) -> usize {
        self.threads
            .filter(|&n| n > 0)
            .unwrap_or_else(rayon::current_num_threads)
    }
}
