//! Analysis configuration document.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use stripsync_algorithms::OccupancyConfig;
use stripsync_align::AlignerConfig;
use stripsync_core::{ClassifierConfig, DetectorGeometry};

/// All settings of an analysis run, loaded from one JSON document.
///
/// Every section is optional and falls back to its defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Detector layout.
    pub geometry: DetectorGeometry,
    /// Signal classification windows and threshold.
    pub classifier: ClassifierConfig,
    /// Hot channel threshold.
    pub occupancy: OccupancyConfig,
    /// Stream alignment settings.
    pub alignment: AlignerConfig,
}

impl AnalysisConfig {
    /// Loads configuration from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a JSON string.
    ///
    /// # Errors
    /// Returns an error if the JSON cannot be parsed or validated.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    ///
    /// # Errors
    /// Returns the first section's configuration error.
    pub fn validate(&self) -> Result<()> {
        self.geometry.validate()?;
        self.classifier.validate()?;
        self.occupancy.validate()?;
        self.alignment.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use stripsync_align::MatchMode;
    use stripsync_core::SampleWindow;

    #[test]
    fn test_empty_document() {
        let config = AnalysisConfig::from_json("{}").expect("Should parse minimal config");
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn test_full_document() {
        let json = r#"{
            "geometry":   { "first_layer": 55, "layers": 2, "tiles_per_layer": 8, "strips_per_unit": 256 },
            "classifier": { "signal_window": [18, 40], "baseline_window": [5, 15], "n_sigma": 4.5 },
            "occupancy":  { "hot_threshold": 0.1 },
            "alignment":  { "match_mode": "raw", "seek_window": 50, "match_epsilon": 1,
                            "time_tolerance": 1, "reference_clock_bits": 16,
                            "rollover_residual": 5, "split_trigger_compensation": false,
                            "max_entries": 50000 }
        }"#;

        let config = AnalysisConfig::from_json(json).expect("Failed to parse JSON");
        assert_eq!(config.classifier.signal_window, SampleWindow::new(18, 40));
        assert_relative_eq!(config.classifier.n_sigma, 4.5);
        assert_relative_eq!(config.occupancy.hot_threshold, 0.1);
        assert_eq!(config.alignment.match_mode, MatchMode::Raw);
        assert_eq!(config.alignment.reference_clock_bits, Some(16));
        assert_eq!(config.alignment.max_entries, Some(50_000));
        assert_eq!(config.geometry.channels(), 4096);
    }

    #[test]
    fn test_invalid_sections_rejected() {
        assert!(AnalysisConfig::from_json(r#"{ "geometry": { "strips_per_unit": 0 } }"#).is_err());
        assert!(AnalysisConfig::from_json(r#"{ "occupancy": { "hot_threshold": -1.0 } }"#).is_err());
        assert!(
            AnalysisConfig::from_json(r#"{ "alignment": { "reference_clock_bits": 80 } }"#).is_err()
        );
        assert!(
            AnalysisConfig::from_json(r#"{ "classifier": { "signal_window": [30, 20] } }"#)
                .is_err()
        );
    }
}
