//! psdlist CLI
//!
//! Decodes mesytec PSD list-mode files into per-pixel time-of-flight data.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::redundant_closure_for_method_calls
)]

use clap::{Parser, Subcommand};
use psdlist_io::{ListmodeFileReader, TofFileWriter};
use psdlist_mesytec::{DecodedRun, DecoderConfig, InstrumentConfig, InstrumentParameters};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    PsdlistIo(#[from] psdlist_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] psdlist_core::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// mesytec PSD list-mode decoder.
#[derive(Parser)]
#[command(name = "psdlist")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a list-mode file into time-of-flight data
    Decode {
        /// Input list-mode file
        input: PathBuf,

        /// Output file path (.csv for text, anything else for binary)
        #[arg(short, long)]
        output: PathBuf,

        /// Chopper channel 1-4 (0 takes it from the instrument config)
        #[arg(long, default_value = "0")]
        chopper_channel: u8,

        /// Instrument parameter file (JSON)
        #[arg(long)]
        instrument_config: Option<PathBuf>,

        /// Decoder configuration file (JSON); flags override its values
        #[arg(long)]
        config: Option<PathBuf>,

        /// Keep neutron events recorded before the first chopper trigger
        #[arg(long)]
        keep_pre_chopper: bool,

        /// Give all pixels one common bin range
        #[arg(long)]
        normalize_bins: bool,

        /// Number of worker threads (default: all cores)
        #[arg(long)]
        threads: Option<usize>,

        /// Write decode statistics as JSON
        #[arg(long)]
        summary_json: Option<PathBuf>,
    },

    /// Show information about a list-mode file
    Info {
        /// Input list-mode file
        input: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn decoder_config(
    config: Option<&Path>,
    chopper_channel: u8,
    keep_pre_chopper: bool,
    normalize_bins: bool,
    threads: Option<usize>,
) -> Result<DecoderConfig> {
    let mut decoder_config = match config {
        Some(path) => DecoderConfig::from_file(path)?,
        None => DecoderConfig::default(),
    };
    if chopper_channel != 0 {
        decoder_config.chopper_channel = chopper_channel;
    }
    if keep_pre_chopper {
        decoder_config.discard_pre_chopper_events = false;
    }
    if normalize_bins {
        decoder_config.normalize_bin_boundaries = true;
    }
    if threads.is_some() {
        decoder_config.threads = threads;
    }
    Ok(decoder_config)
}

fn write_summary(path: &Path, input: &Path, run: &DecodedRun, chopper_channel: u8) -> Result<()> {
    let summary = serde_json::json!({
        "input": input.display().to_string(),
        "chopper_channel": chopper_channel,
        "events": run.event_count(),
        "bin_edges": run.bin_edges,
        "statistics": run.statistics,
    });
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, &summary)?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Decode {
            input,
            output,
            chopper_channel,
            instrument_config,
            config,
            keep_pre_chopper,
            normalize_bins,
            threads,
            summary_json,
        } => {
            let decoder_config = decoder_config(
                config.as_deref(),
                chopper_channel,
                keep_pre_chopper,
                normalize_bins,
                threads,
            )?;

            let instrument = instrument_config
                .as_deref()
                .map(InstrumentConfig::from_file)
                .transpose()?;
            let chopper_channel = decoder_config.resolve_chopper_channel(
                instrument.as_ref().map(|i| i as &dyn InstrumentParameters),
            )?;

            let mut reader = ListmodeFileReader::open(&input)?.with_config(decoder_config);
            if let Some(instrument) = instrument {
                reader = reader.with_instrument(instrument);
            }

            log::info!("decoding {} (chopper channel {})", input.display(), chopper_channel);
            let start = Instant::now();
            let run = reader.decode()?;
            let decode_time = start.elapsed();

            let mut writer = TofFileWriter::create(&output)?;
            log::debug!("writing {:?} output to {}", writer.format(), output.display());
            run.write_to(&mut writer)?;

            if let Some(path) = &summary_json {
                write_summary(path, &input, &run, chopper_channel)?;
            }

            let stats = &run.statistics;
            println!(
                "Decoded {} in {:.2}s",
                input.display(),
                decode_time.as_secs_f64()
            );
            println!("Blocks: {}", stats.blocks);
            println!("Chopper triggers: {}", stats.trigger_events);
            println!("Neutron events: {}", stats.neutron_events);
            println!("Dropped (bad pixel): {}", stats.bad_pixel_events);
            println!("Dropped (before first chopper): {}", stats.pre_chopper_discarded);
            println!("Events written: {}", writer.written());
            if let Some([lo, hi]) = run.bin_edges {
                println!("Bin range: {} - {}", lo, hi);
            }
        }

        Commands::Info { input } => {
            let reader = ListmodeFileReader::open(&input)?;
            let file_size = reader.file_size();
            let scan = reader.scan()?;

            println!("File: {}", input.display());
            println!(
                "Size: {} bytes ({:.2} MB)",
                file_size,
                file_size as f64 / 1_000_000.0
            );
            println!("Header:");
            for line in scan.header.lines() {
                println!("  {}", line);
            }
            println!("Blocks: {}", scan.blocks);
            println!("Neutron events: {}", scan.neutron_events);
            println!("Trigger events: {}", scan.trigger_events);
            println!(
                "Closing signature: {}",
                if scan.closed { "present" } else { "missing" }
            );
        }
    }

    Ok(())
}
