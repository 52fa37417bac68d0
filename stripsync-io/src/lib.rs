//! stripsync-io: File-backed streams and output writers for stripsync.
//!
//! This crate provides memory-mapped JSON-lines record streams via memmap2,
//! event building from raw readout entries, calibration lookup, the analysis
//! configuration document, and writers for summaries, hot channel maps and
//! correlation histograms.
//!

mod builder;
mod calibration;
mod config;
mod error;
mod reader;
mod record;
pub mod scanner;
mod writer;

pub use builder::{BuildStatistics, EventBuilder};
pub use calibration::{build_waveforms, CalibrationProvider, CalibrationTable};
pub use config::AnalysisConfig;
pub use error::{Error, Result};
pub use reader::{JsonlStream, MappedFileReader};
pub use record::ExternalRecord;
pub use scanner::LineScanner;
pub use writer::{DataFileWriter, HotChannelReport};
