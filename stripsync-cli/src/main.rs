//! stripsync CLI
//!
//! Clusters strip-detector readout, builds hot channel maps and correlates
//! per-event quantities of independently clocked subsystems.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, info, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use stripsync_algorithms::{
    Axis, ClusteringStatistics, EventClusterer, EventSummary, Histogram2D, OccupancyAccumulator,
};
use stripsync_align::{align, MatchMode};
use stripsync_core::RawReadout;
use stripsync_io::{
    AnalysisConfig, CalibrationTable, DataFileWriter, EventBuilder, ExternalRecord, JsonlStream,
};
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    StripsyncIo(#[from] stripsync_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] stripsync_core::Error),

    #[error("Alignment error: {0}")]
    Align(#[from] stripsync_align::Error),
}

/// Seek matching mode.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Raw clock values agree within the match epsilon
    Raw,
    /// Two consecutive clock deltas agree
    Delta,
}

impl From<Mode> for MatchMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Raw => MatchMode::Raw,
            Mode::Delta => MatchMode::Delta,
        }
    }
}

/// Strip-detector clustering and cross-subsystem event correlation.
#[derive(Parser)]
#[command(name = "stripsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build events from raw readout and write per-event cluster summaries
    Cluster {
        /// Raw readout JSON-lines file
        input: PathBuf,

        /// Output summaries (JSON lines)
        #[arg(short, long)]
        output: PathBuf,

        /// Analysis configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Pedestal/RMS table used to summarize raw samples
        #[arg(long)]
        calibration: Option<PathBuf>,
    },

    /// Flag channels with a hit rate above threshold over a whole run
    HotChannels {
        /// Raw readout JSON-lines file
        input: PathBuf,

        /// Output hot channel map (JSON)
        #[arg(short, long)]
        output: PathBuf,

        /// Analysis configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Hits per event above which a channel is hot
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Align a reference stream with cluster summaries and histogram the pairs
    Correlate {
        /// Reference records (JSON lines of {clock, value})
        #[arg(long)]
        reference: PathBuf,

        /// Cluster summaries written by `cluster`
        #[arg(long)]
        subject: PathBuf,

        /// Output histogram (CSV)
        #[arg(short, long)]
        output: PathBuf,

        /// Analysis configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Seek matching mode
        #[arg(long, value_enum)]
        mode: Option<Mode>,

        /// Width of the reference clock counter in bits
        #[arg(long)]
        clock_bits: Option<u32>,

        /// Time tolerance in clock ticks
        #[arg(long)]
        tolerance: Option<u64>,

        /// Maximum entries used from each stream
        #[arg(long)]
        max_entries: Option<usize>,

        /// Reference value bins
        #[arg(long, default_value = "100")]
        x_bins: usize,

        /// Upper edge of the reference value axis
        #[arg(long, default_value = "100.0")]
        x_max: f64,

        /// Upper edge of the cluster count axis (one bin per count)
        #[arg(long, default_value = "20")]
        y_max: usize,
    },

    /// Show the number of records and clock range of a JSON-lines file
    Info {
        /// Input file
        input: PathBuf,
    },
}

/// Any record with a clock, as stored by any of the stripsync file kinds.
#[derive(Deserialize)]
struct ClockField {
    #[serde(alias = "lvl1_bco")]
    clock: u64,
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            Ok(AnalysisConfig::from_file(path)?)
        }
        None => Ok(AnalysisConfig::default()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match cli.command {
        Commands::Cluster {
            input,
            output,
            config,
            calibration,
        } => {
            let config = load_config(config.as_deref())?;
            let start = Instant::now();

            let readout: JsonlStream<RawReadout> = JsonlStream::open(&input)?;
            info!("{}: {} readout entries", input.display(), readout.len());

            let mut builder = EventBuilder::new(readout.iter());
            if let Some(path) = calibration {
                let table = CalibrationTable::from_file(&path, config.geometry.clone())?;
                info!("Loaded calibration for {} channels", table.len());
                builder = builder.with_calibration(Box::new(table), config.geometry.clone());
            }

            let clusterer = EventClusterer::new(config.geometry.clone(), config.classifier.clone());
            let mut stats = ClusteringStatistics::default();
            let mut writer = DataFileWriter::create(&output)?;
            let mut total_clusters = 0usize;

            for event in builder.by_ref() {
                let summary = clusterer.summarize(&event?, &mut stats);
                debug!(
                    "clock {}: {} waveforms, {} clusters",
                    summary.clock, summary.n_waveforms_all, summary.n_clusters
                );
                total_clusters += summary.n_clusters;
                writer.write_jsonl_record(&summary)?;
            }
            writer.flush()?;

            let build = builder.stats();
            println!(
                "Processed {} entries in {:.2}s",
                build.entries_read,
                start.elapsed().as_secs_f64()
            );
            println!("Events: {}", build.events_built);
            println!("Dropped entries: {}", build.entries_dropped);
            println!("Clusters: {}", total_clusters);
            println!("Invalid channels: {}", stats.invalid_channels);
        }

        Commands::HotChannels {
            input,
            output,
            config,
            threshold,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(threshold) = threshold {
                config.occupancy = config.occupancy.with_hot_threshold(threshold);
                config.occupancy.validate()?;
            }

            let readout: JsonlStream<RawReadout> = JsonlStream::open(&input)?;
            let clusterer = EventClusterer::new(config.geometry.clone(), config.classifier.clone());
            let mut accumulator = OccupancyAccumulator::new(config.geometry.clone());

            for event in EventBuilder::new(readout.iter()) {
                accumulator.add_event(&clusterer.classify(&event?));
            }

            let map = accumulator.finish(accumulator.events(), config.occupancy.hot_threshold);
            DataFileWriter::create(&output)?.write_hot_channel_map(&map)?;

            println!("Events: {}", map.total_events());
            println!(
                "Hot channels: {} (threshold {})",
                map.hot_count(),
                map.threshold()
            );
            if accumulator.invalid() > 0 {
                warn!("{} hits on invalid channels ignored", accumulator.invalid());
            }
        }

        Commands::Correlate {
            reference,
            subject,
            output,
            config,
            mode,
            clock_bits,
            tolerance,
            max_entries,
            x_bins,
            x_max,
            y_max,
        } => {
            let config = load_config(config.as_deref())?;
            let mut alignment = config.alignment;
            if let Some(mode) = mode {
                alignment = alignment.with_match_mode(mode.into());
            }
            if clock_bits.is_some() {
                alignment = alignment.with_reference_clock_bits(clock_bits);
            }
            if let Some(tolerance) = tolerance {
                alignment = alignment.with_time_tolerance(tolerance);
            }
            if max_entries.is_some() {
                alignment = alignment.with_max_entries(max_entries);
            }
            alignment.validate()?;

            let start = Instant::now();
            let reference: JsonlStream<ExternalRecord> = JsonlStream::open(&reference)?;
            let subject: JsonlStream<EventSummary> = JsonlStream::open(&subject)?;

            let mut histogram = Histogram2D::new(
                Axis::new(x_bins, 0.0, x_max)?,
                Axis::new(y_max, 0.0, y_max as f64)?,
            );

            let mut aligner = align(&reference, &subject, alignment)?;
            for pair in aligner.by_ref() {
                let pair = pair?;
                histogram.fill(pair.reference.value, pair.subject.n_clusters as f64);
            }

            DataFileWriter::create(&output)?.write_histogram_csv(&histogram)?;

            let stats = aligner.stats();
            let state = aligner.state();
            println!("Aligned in {:.2}s", start.elapsed().as_secs_f64());
            if let Some(offset) = aligner.offset() {
                println!(
                    "First subject entry: {} (entry offset {})",
                    offset.first_subject_entry, offset.entry_offset
                );
            }
            println!("Pairs: {}", stats.pairs_accepted);
            println!("Rejected steps: {}", stats.steps_rejected);
            println!(
                "Skipped entries: {} reference, {} subject",
                stats.reference_advances, stats.subject_advances
            );
            println!("Rollovers: {}", state.rollover_count);
            println!("Split triggers: {}", stats.split_triggers);
            println!(
                "Histogram entries: {} ({} outside range)",
                histogram.entries(),
                histogram.outside()
            );
        }

        Commands::Info { input } => {
            let stream: JsonlStream<ClockField> = JsonlStream::open(&input)?;
            let file_size = stream.file_size();

            println!("File: {}", input.display());
            println!(
                "Size: {} bytes ({:.2} MB)",
                file_size,
                file_size as f64 / 1_000_000.0
            );
            println!("Records: {}", stream.len());

            let mut range: Option<(u64, u64)> = None;
            for record in stream.iter() {
                let clock = record?.clock;
                range = Some(range.map_or((clock, clock), |(lo, hi)| {
                    (lo.min(clock), hi.max(clock))
                }));
            }
            if let Some((lo, hi)) = range {
                println!("Clock range: {} - {}", lo, hi);
            }
        }
    }

    Ok(())
}
