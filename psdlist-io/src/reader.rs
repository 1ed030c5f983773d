//! Memory-mapped file readers.
//!

use crate::{Error, Result};
use memmap2::Mmap;
use psdlist_core::header::EVENT_BYTES;
use psdlist_core::{EventKind, CLOSING_SIGNATURE};
use psdlist_mesytec::{
    has_next_block, parse_file_header, read_block, ByteStream, CancellationToken, DecodedRun,
    DecoderConfig, InstrumentConfig, ListmodeDecoder,
};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A memory-mapped file reader.
///
/// Uses memmap2 to efficiently access file contents without
/// loading the entire file into memory.
pub struct MappedFileReader {
    mmap: Arc<Mmap>,
    path: PathBuf,
}

impl MappedFileReader {
    /// Opens a file for memory-mapped reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        // This is the standard safety contract for memory mapping.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| Error::MmapError(format!("{}: {e}", path.display())))?;
        Ok(Self {
            mmap: Arc::new(mmap),
            path: path.to_path_buf(),
        })
    }

    /// Returns the file contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Path the file was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Structural overview of a list-mode file, without chopper matching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockScan {
    /// Free-text file header.
    pub header: String,
    /// Data blocks found.
    pub blocks: u64,
    /// Neutron records over all blocks.
    pub neutron_events: u64,
    /// Trigger records over all blocks, any channel.
    pub trigger_events: u64,
    /// Whether the file ends with the closing signature.
    pub closed: bool,
}

/// A list-mode file reader with memory-mapped I/O.
pub struct ListmodeFileReader {
    reader: MappedFileReader,
    config: DecoderConfig,
    instrument: Option<InstrumentConfig>,
    cancel: CancellationToken,
}

impl ListmodeFileReader {
    /// Opens a list-mode file for reading with default configuration.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = MappedFileReader::open(path)?;
        Ok(Self {
            reader,
            config: DecoderConfig::default(),
            instrument: None,
            cancel: CancellationToken::new(),
        })
    }

    /// Sets the decoder configuration.
    #[must_use]
    pub fn with_config(mut self, config: DecoderConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the instrument parameters used to resolve a chopper channel of 0.
    #[must_use]
    pub fn with_instrument(mut self, instrument: InstrumentConfig) -> Self {
        self.instrument = Some(instrument);
        self
    }

    /// Uses `token` for cooperative cancellation of [`Self::decode`].
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn file_size(&self) -> usize {
        self.reader.len()
    }

    /// Decodes the whole file into per-pixel time-of-flight lists.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the file is not
    /// a well-formed list-mode file.
    pub fn decode(&self) -> Result<DecodedRun> {
        let config = self.config.clone();
        let decoder = match &self.instrument {
            Some(instrument) => ListmodeDecoder::with_instrument(config, instrument)?,
            None => ListmodeDecoder::new(config)?,
        };
        let mut decoder = decoder.with_cancellation(self.cancel.clone());

        log::debug!(
            "decoding {} ({} bytes) with chopper channel {}",
            self.reader.path().display(),
            self.file_size(),
            decoder.chopper_channel()
        );
        let run = decoder.decode(self.reader.as_bytes())?;
        Ok(run)
    }

    /// Walks the block structure and counts blocks and records.
    ///
    /// # Errors
    /// Returns the first structural error.
    pub fn scan(&self) -> Result<BlockScan> {
        let mut stream = ByteStream::new(self.reader.as_bytes());
        let header = parse_file_header(&mut stream)?;
        let mut scan = BlockScan {
            header: String::from_utf8_lossy(header).into_owned(),
            ..BlockScan::default()
        };

        while has_next_block(&stream) {
            read_block(&mut stream, |_, word| match word.kind() {
                EventKind::Neutron => scan.neutron_events += 1,
                EventKind::Trigger => scan.trigger_events += 1,
            })?;
            scan.blocks += 1;
        }

        scan.closed = stream.rest() == CLOSING_SIGNATURE;
        log::debug!(
            "scanned {} blocks ({} bytes of event records)",
            scan.blocks,
            (scan.neutron_events + scan.trigger_events) * EVENT_BYTES as u64
        );
        Ok(scan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use psdlist_core::event::split_words;
    use psdlist_core::{BLOCK_SEPARATOR, HEADER_SEPARATOR};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn push_word48(out: &mut Vec<u8>, value: u64) {
        let (w1, w2, w3) = split_words(value);
        for w in [w1, w2, w3] {
            out.extend_from_slice(&w.to_be_bytes());
        }
    }

    fn make_block(timestamp: u64, events: &[u64]) -> Vec<u8> {
        let mut out = Vec::new();
        let buffer_length = 21 + 3 * u16::try_from(events.len()).unwrap();
        for w in [buffer_length, 1, 21, 0, 1] {
            out.extend_from_slice(&w.to_be_bytes());
        }
        out.extend_from_slice(&[0, 0]);
        push_word48(&mut out, timestamp);
        out.extend_from_slice(&[0u8; 24]);
        for &e in events {
            push_word48(&mut out, e);
        }
        out.extend_from_slice(&BLOCK_SEPARATOR);
        out
    }

    fn make_file(blocks: &[Vec<u8>], closing: bool) -> NamedTempFile {
        let mut data = b"mesytec psd listmode data\n".to_vec();
        data.extend_from_slice(&HEADER_SEPARATOR);
        for block in blocks {
            data.extend_from_slice(block);
        }
        if closing {
            data.extend_from_slice(&CLOSING_SIGNATURE);
        }
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&data).unwrap();
        file.flush().unwrap();
        file
    }

    const CHOPPER: u64 = (1 << 47) | (7 << 44) | 50;
    const NEUTRON_42: u64 = (42 << 19) | 200;

    #[test]
    fn test_mapped_reader() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        file.flush().unwrap();

        let reader = MappedFileReader::open(file.path()).unwrap();
        assert_eq!(reader.len(), 8);
        assert!(!reader.is_empty());
        assert_eq!(reader.as_bytes(), &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(reader.path(), file.path());
    }

    #[test]
    fn test_open_missing_file() {
        assert!(matches!(
            ListmodeFileReader::open("/nonexistent/run.mdat"),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_decode_file() {
        let file = make_file(&[make_block(1000, &[CHOPPER, NEUTRON_42])], true);
        let reader = ListmodeFileReader::open(file.path())
            .unwrap()
            .with_config(DecoderConfig::new().with_chopper_channel(1));

        let run = reader.decode().unwrap();
        assert_eq!(run.event_count(), 1);
        assert_relative_eq!(run.tof[42][0], 15.0);
    }

    #[test]
    fn test_decode_with_instrument() {
        let file = make_file(&[make_block(1000, &[CHOPPER, NEUTRON_42])], false);
        let reader = ListmodeFileReader::open(file.path())
            .unwrap()
            .with_instrument(InstrumentConfig {
                chopper_channel: Some(1),
            });
        assert_eq!(reader.decode().unwrap().event_count(), 1);
    }

    #[test]
    fn test_decode_without_channel_fails() {
        let file = make_file(&[make_block(1000, &[CHOPPER, NEUTRON_42])], false);
        let reader = ListmodeFileReader::open(file.path()).unwrap();
        let err = reader.decode().unwrap_err();
        assert!(matches!(err.as_core(), Some(psdlist_core::Error::Config(_))));
    }

    #[test]
    fn test_scan() {
        let blocks = vec![
            make_block(0, &[CHOPPER, NEUTRON_42, NEUTRON_42]),
            make_block(500, &[]),
            make_block(900, &[NEUTRON_42]),
        ];
        let file = make_file(&blocks, true);
        let reader = ListmodeFileReader::open(file.path()).unwrap();

        let scan = reader.scan().unwrap();
        assert_eq!(scan.header, "mesytec psd listmode data\n");
        assert_eq!(scan.blocks, 3);
        assert_eq!(scan.neutron_events, 3);
        assert_eq!(scan.trigger_events, 1);
        assert!(scan.closed);
    }

    #[test]
    fn test_scan_corrupt_separator() {
        let mut block = make_block(0, &[NEUTRON_42]);
        let len = block.len();
        block[len - 1] = 0;
        let file = make_file(&[block], false);
        let reader = ListmodeFileReader::open(file.path()).unwrap();

        let err = reader.scan().unwrap_err();
        assert!(matches!(
            err.as_core(),
            Some(psdlist_core::Error::Integrity { .. })
        ));
    }
}
