//! Aligner configuration.

use crate::clock::ClockWidth;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// How the seek phase matches the two streams.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Raw clock values agree within `match_epsilon`.
    Raw,
    /// Two consecutive inter-event deltas agree exactly.
    #[default]
    Delta,
}

/// Configuration for the stream aligner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignerConfig {
    /// Seek matching mode.
    pub match_mode: MatchMode,
    /// Number of leading entries of each stream examined while seeking.
    pub seek_window: usize,
    /// Maximum raw clock difference accepted by [`MatchMode::Raw`].
    pub match_epsilon: u64,
    /// Largest elapsed-time disagreement accepted without correction.
    pub time_tolerance: u64,
    /// Width of the reference clock counter; `None` for a non-wrapping clock.
    pub reference_clock_bits: Option<u32>,
    /// Maximum distance from a whole number of periods treated as a missed rollover.
    pub rollover_residual: u64,
    /// Shift reference lookups when a split trigger is seen.
    pub split_trigger_compensation: bool,
    /// Reference clock delta that marks a split trigger.
    pub split_trigger_delta: u64,
    /// Cap on the entries used from each stream.
    pub max_entries: Option<usize>,
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            match_mode: MatchMode::Delta,
            seek_window: 100,
            match_epsilon: 1,
            time_tolerance: 1000,
            reference_clock_bits: None,
            rollover_residual: 5,
            split_trigger_compensation: true,
            split_trigger_delta: 1,
            max_entries: None,
        }
    }
}

#[derive(Deserialize)]
struct JsonConfig {
    alignment: AlignerConfig,
}

impl AlignerConfig {
    /// Delta matching against a wrapping reference clock, as used for the
    /// beam-counter subsystem.
    #[must_use]
    pub fn delta_matched(reference_clock_bits: u32) -> Self {
        Self {
            match_mode: MatchMode::Delta,
            reference_clock_bits: Some(reference_clock_bits),
            ..Self::default()
        }
    }

    /// Raw matching of a shared crossing clock, as used for the silicon tracker.
    #[must_use]
    pub fn raw_matched() -> Self {
        Self {
            match_mode: MatchMode::Raw,
            time_tolerance: 1,
            split_trigger_compensation: false,
            ..Self::default()
        }
    }

    /// Sets the match mode.
    #[must_use]
    pub fn with_match_mode(mut self, mode: MatchMode) -> Self {
        self.match_mode = mode;
        self
    }

    /// Sets the seek window.
    #[must_use]
    pub fn with_seek_window(mut self, window: usize) -> Self {
        self.seek_window = window;
        self
    }

    /// Sets the raw match tolerance.
    #[must_use]
    pub fn with_match_epsilon(mut self, epsilon: u64) -> Self {
        self.match_epsilon = epsilon;
        self
    }

    /// Sets the time tolerance.
    #[must_use]
    pub fn with_time_tolerance(mut self, tolerance: u64) -> Self {
        self.time_tolerance = tolerance;
        self
    }

    /// Sets the reference clock width.
    #[must_use]
    pub fn with_reference_clock_bits(mut self, bits: Option<u32>) -> Self {
        self.reference_clock_bits = bits;
        self
    }

    /// Sets the rollover residual.
    #[must_use]
    pub fn with_rollover_residual(mut self, residual: u64) -> Self {
        self.rollover_residual = residual;
        self
    }

    /// Enables or disables split-trigger compensation.
    #[must_use]
    pub fn with_split_trigger_compensation(mut self, enabled: bool) -> Self {
        self.split_trigger_compensation = enabled;
        self
    }

    /// Sets the entry cap.
    #[must_use]
    pub fn with_max_entries(mut self, max_entries: Option<usize>) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Reference clock width, if the reference clock wraps.
    ///
    /// # Errors
    /// Returns `ConfigError` for a width outside `1..=62`.
    pub fn reference_width(&self) -> Result<Option<ClockWidth>> {
        self.reference_clock_bits.map(ClockWidth::new).transpose()
    }

    /// Checks the configuration for values the aligner cannot work with.
    ///
    /// # Errors
    /// Returns `ConfigError` describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        self.reference_width()?;
        let minimum = match self.match_mode {
            MatchMode::Raw => 1,
            MatchMode::Delta => 2,
        };
        if self.seek_window < minimum {
            return Err(Error::ConfigError(format!(
                "seek_window must be at least {minimum} for {:?} matching",
                self.match_mode
            )));
        }
        if self.max_entries == Some(0) {
            return Err(Error::ConfigError(
                "max_entries must be positive when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Loads configuration from a JSON file with an `alignment` section.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let json_config: JsonConfig = serde_json::from_reader(reader)?;
        json_config.alignment.validate()?;
        Ok(json_config.alignment)
    }

    /// Loads configuration from a JSON string with an `alignment` section.
    ///
    /// # Errors
    /// Returns an error if the JSON cannot be parsed or validated.
    pub fn from_json(json: &str) -> Result<Self> {
        let json_config: JsonConfig = serde_json::from_str(json)?;
        json_config.alignment.validate()?;
        Ok(json_config.alignment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AlignerConfig::default();
        assert_eq!(config.match_mode, MatchMode::Delta);
        assert_eq!(config.seek_window, 100);
        assert_eq!(config.time_tolerance, 1000);
        assert_eq!(config.rollover_residual, 5);
        assert!(config.split_trigger_compensation);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets() {
        let beam = AlignerConfig::delta_matched(16);
        assert_eq!(beam.reference_clock_bits, Some(16));
        assert_eq!(beam.reference_width().unwrap().unwrap().modulus(), 65536);

        let tracker = AlignerConfig::raw_matched();
        assert_eq!(tracker.match_mode, MatchMode::Raw);
        assert_eq!(tracker.time_tolerance, 1);
        assert!(!tracker.split_trigger_compensation);
    }

    #[test]
    fn test_validation() {
        assert!(AlignerConfig::default()
            .with_reference_clock_bits(Some(64))
            .validate()
            .is_err());
        assert!(AlignerConfig::default()
            .with_seek_window(1)
            .validate()
            .is_err());
        assert!(AlignerConfig::raw_matched()
            .with_seek_window(1)
            .validate()
            .is_ok());
        assert!(AlignerConfig::default()
            .with_max_entries(Some(0))
            .validate()
            .is_err());
    }

    #[test]
    fn test_json_partial_config() {
        let json = r#"{
            "alignment": {
                "match_mode": "raw",
                "time_tolerance": 1
            }
        }"#;

        let config = AlignerConfig::from_json(json).expect("Should parse partial config");
        assert_eq!(config.match_mode, MatchMode::Raw);
        assert_eq!(config.time_tolerance, 1);
        assert_eq!(config.seek_window, 100); // Default
        assert_eq!(config.reference_clock_bits, None); // Default
    }

    #[test]
    fn test_json_invalid_width_rejected() {
        let json = r#"{ "alignment": { "reference_clock_bits": 0 } }"#;
        assert!(AlignerConfig::from_json(json).is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{ "alignment": {{ "reference_clock_bits": 16, "max_entries": 500 }} }}"#
        )
        .unwrap();

        let config = AlignerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.reference_clock_bits, Some(16));
        assert_eq!(config.max_entries, Some(500));
    }
}
