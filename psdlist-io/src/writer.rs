//! File writers for decoded time-of-flight data.

use crate::{Error, Result};
use psdlist_mesytec::TofSink;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// On-disk layout written by [`TofFileWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Text with a `pixel,tof` header line.
    Csv,
    /// Little-endian records: u32 (pixel) + f64 (tof), 12 bytes each.
    Binary,
}

impl OutputFormat {
    /// Picks CSV for a `.csv` extension and binary otherwise.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Self::Csv,
            _ => Self::Binary,
        }
    }
}

/// Writer for per-pixel time-of-flight output.
///
/// Receives decoded data through [`TofSink`].
pub struct TofFileWriter {
    writer: BufWriter<File>,
    format: OutputFormat,
    written: u64,
}

impl TofFileWriter {
    /// Creates a writer, choosing the format from the file extension.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let format = OutputFormat::from_path(path.as_ref());
        Self::create_with_format(path, format)
    }

    /// Creates a writer with an explicit format.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create_with_format<P: AsRef<Path>>(path: P, format: OutputFormat) -> Result<Self> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        Ok(Self {
            writer,
            format,
            written: 0,
        })
    }

    /// Output format of this writer.
    #[must_use]
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Number of `(pixel, tof)` records written so far.
    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if the underlying file cannot be written.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl TofSink for TofFileWriter {
    type Error = Error;

    fn begin(&mut self, pixel_count: usize, bin_edges: Option<[f64; 2]>) -> Result<()> {
        log::debug!("writing {pixel_count} pixels as {:?}, bin edges {bin_edges:?}", self.format);
        if self.format == OutputFormat::Csv {
            writeln!(self.writer, "pixel,tof")?;
        }
        Ok(())
    }

    fn pixel_events(&mut self, pixel: usize, tof: &[f64]) -> Result<()> {
        match self.format {
            OutputFormat::Csv => {
                for t in tof {
                    writeln!(self.writer, "{pixel},{t}")?;
                }
            }
            OutputFormat::Binary => {
                let pixel = u32::try_from(pixel).map_err(|_| {
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("pixel index {pixel} does not fit the binary layout"),
                    )
                })?;
                for t in tof {
                    self.writer.write_all(&pixel.to_le_bytes())?;
                    self.writer.write_all(&t.to_le_bytes())?;
                }
            }
        }
        self.written += tof.len() as u64;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.flush()
    }
}
