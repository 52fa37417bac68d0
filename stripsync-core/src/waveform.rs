//! Per-channel readout data: raw samples, waveform summaries and classified hits.

use crate::geometry::Channel;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One ADC reading of a channel within one trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sample {
    /// Channel that produced the sample.
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub channel: Channel,
    /// Time-bucket index of the reading.
    pub sample: u16,
    /// ADC value.
    pub adc: u16,
}

impl Sample {
    /// Creates a new sample.
    #[inline]
    #[must_use]
    pub fn new(channel: Channel, sample: u16, adc: u16) -> Self {
        Self {
            channel,
            sample,
            adc,
        }
    }
}

/// Per-channel, per-event waveform summary.
///
/// Pedestal and RMS come from calibration and are treated as inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Waveform {
    /// Channel of the waveform.
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub channel: Channel,
    /// Peak ADC value.
    pub adc_max: u16,
    /// Time bucket of the peak.
    pub sample_max: u16,
    /// Baseline mean.
    pub pedestal: f64,
    /// Baseline noise RMS.
    pub rms: f64,
}

impl Waveform {
    /// Creates a new waveform summary.
    #[inline]
    #[must_use]
    pub fn new(channel: Channel, adc_max: u16, sample_max: u16, pedestal: f64, rms: f64) -> Self {
        Self {
            channel,
            adc_max,
            sample_max,
            pedestal,
            rms,
        }
    }

    /// Strip number of the waveform channel.
    #[inline]
    #[must_use]
    pub fn strip(&self) -> u16 {
        self.channel.strip
    }
}

/// A waveform together with its signal/background decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifiedHit {
    /// Underlying waveform.
    pub waveform: Waveform,
    /// True when the waveform passed the signal selection.
    pub signal: bool,
}

impl ClassifiedHit {
    /// Creates a classified hit.
    #[inline]
    #[must_use]
    pub fn new(waveform: Waveform, signal: bool) -> Self {
        Self { waveform, signal }
    }

    /// Channel of the hit.
    #[inline]
    #[must_use]
    pub fn channel(&self) -> Channel {
        self.waveform.channel
    }

    /// Strip number of the hit.
    #[inline]
    #[must_use]
    pub fn strip(&self) -> u16 {
        self.waveform.channel.strip
    }
}
