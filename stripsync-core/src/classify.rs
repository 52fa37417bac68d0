//! Signal/background classification of waveforms.

use crate::waveform::{ClassifiedHit, Waveform};
use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Half-open acceptance window `[lo, hi)` over the peak time bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "(u16, u16)", into = "(u16, u16)"))]
pub struct SampleWindow {
    /// First accepted time bucket.
    pub lo: u16,
    /// First rejected time bucket past the window.
    pub hi: u16,
}

impl SampleWindow {
    /// Prompt window used for physics signal.
    pub const PROMPT: Self = Self { lo: 20, hi: 45 };

    /// Early window used to tag pre-trigger background activity.
    pub const BASELINE: Self = Self { lo: 5, hi: 15 };

    /// Creates a new window.
    #[inline]
    #[must_use]
    pub fn new(lo: u16, hi: u16) -> Self {
        Self { lo, hi }
    }

    /// Returns true if the time bucket lies inside the window.
    #[inline]
    #[must_use]
    pub fn contains(&self, sample: u16) -> bool {
        self.lo <= sample && sample < self.hi
    }

    /// Returns true if no time bucket can be accepted.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hi <= self.lo
    }
}

impl From<(u16, u16)> for SampleWindow {
    fn from((lo, hi): (u16, u16)) -> Self {
        Self { lo, hi }
    }
}

impl From<SampleWindow> for (u16, u16) {
    fn from(window: SampleWindow) -> Self {
        (window.lo, window.hi)
    }
}

/// Outcome of classifying one waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Peak above threshold inside the acceptance window.
    Signal,
    /// Anything else, including waveforms with invalid RMS.
    Background,
}

/// Classifies a waveform against a window and a sigma multiplier.
///
/// Signal iff `rms > 0`, `lo <= sample_max < hi` and `adc_max > pedestal + k * rms`.
#[inline]
#[must_use]
pub fn classify(waveform: &Waveform, window: SampleWindow, n_sigma: f64) -> Classification {
    if waveform.rms > 0.0
        && window.contains(waveform.sample_max)
        && f64::from(waveform.adc_max) > waveform.pedestal + n_sigma * waveform.rms
    {
        Classification::Signal
    } else {
        Classification::Background
    }
}

/// Classifier settings shared by every caller in a run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ClassifierConfig {
    /// Window for physics signal.
    pub signal_window: SampleWindow,
    /// Window for pre-trigger background tagging.
    pub baseline_window: SampleWindow,
    /// Number of RMS above pedestal required for a hit.
    pub n_sigma: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            signal_window: SampleWindow::PROMPT,
            baseline_window: SampleWindow::BASELINE,
            n_sigma: 5.0,
        }
    }
}

impl ClassifierConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the signal window.
    #[must_use]
    pub fn with_signal_window(mut self, window: SampleWindow) -> Self {
        self.signal_window = window;
        self
    }

    /// Sets the baseline window.
    #[must_use]
    pub fn with_baseline_window(mut self, window: SampleWindow) -> Self {
        self.baseline_window = window;
        self
    }

    /// Sets the sigma multiplier.
    #[must_use]
    pub fn with_n_sigma(mut self, n_sigma: f64) -> Self {
        self.n_sigma = n_sigma;
        self
    }

    /// Checks windows and threshold.
    ///
    /// # Errors
    /// Returns `ConfigError` for an empty window or a negative or non-finite multiplier.
    pub fn validate(&self) -> Result<()> {
        if self.signal_window.is_empty() || self.baseline_window.is_empty() {
            return Err(Error::ConfigError(format!(
                "empty sample window: signal {:?}, baseline {:?}",
                self.signal_window, self.baseline_window
            )));
        }
        if !self.n_sigma.is_finite() || self.n_sigma < 0.0 {
            return Err(Error::ConfigError(format!(
                "invalid sigma multiplier: {}",
                self.n_sigma
            )));
        }
        Ok(())
    }

    /// Classifies a waveform in the signal window.
    #[must_use]
    pub fn classify_signal(&self, waveform: &Waveform) -> ClassifiedHit {
        let signal =
            classify(waveform, self.signal_window, self.n_sigma) == Classification::Signal;
        ClassifiedHit::new(*waveform, signal)
    }

    /// Classifies a waveform in the baseline window.
    #[must_use]
    pub fn classify_baseline(&self, waveform: &Waveform) -> ClassifiedHit {
        let signal =
            classify(waveform, self.baseline_window, self.n_sigma) == Classification::Signal;
        ClassifiedHit::new(*waveform, signal)
    }
}
