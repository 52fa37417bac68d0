//! stripsync-align: Alignment of independently clocked event streams.
//!
//! Two subsystems record the same triggers with their own clocks and their
//! own dropouts. This crate pairs their entries in a single forward pass.
//!
//! # Key Components
//!
//! - [`RolloverClock`] - Extends a fixed-width counter across rollovers
//! - [`find_offset`] - Seek phase, raw or delta matching over a leading window
//! - [`Aligner`] - Iterator over [`AlignedPair`]s with drift, rollover and
//!   split-trigger correction
//!
//! # Processing Pipeline
//!
//! 1. **Seek**: Match the first entries of both streams
//! 2. **Align**: Walk both streams, comparing elapsed time since the match

mod aligner;
pub mod clock;
mod config;
mod error;
mod seek;

pub use aligner::{align, AlignPhase, AlignStats, AlignedPair, Aligner, AlignmentState};
pub use clock::{clock_delta, ClockReading, ClockWidth, RolloverClock};
pub use config::{AlignerConfig, MatchMode};
pub use error::{Error, Result};
pub use seek::{clock_deltas, find_offset, match_deltas, match_raw, StreamOffset};
