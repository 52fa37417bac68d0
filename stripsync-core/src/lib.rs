//! stripsync-core: Core types for strip-detector readout processing.
//!
//! This crate provides the shared vocabulary of the workspace: channel
//! identities and detector geometry, waveform summaries, the signal
//! classifier, trigger records, and the random-access stream abstraction
//! consumed by the alignment engine.
//!

pub mod classify;
pub mod error;
pub mod event;
pub mod geometry;
pub mod stream;
pub mod waveform;

pub use classify::{classify, Classification, ClassifierConfig, SampleWindow};
pub use error::{Error, Result};
pub use event::{EventRecord, RawReadout};
pub use geometry::{Channel, ChannelIndex, DetectorGeometry, View};
pub use stream::{Clocked, EventStream, VecStream};
pub use waveform::{ClassifiedHit, Sample, Waveform};
