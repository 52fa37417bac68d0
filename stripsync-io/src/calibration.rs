//! Per-channel pedestal and noise lookup.

use crate::{Error, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use stripsync_core::{Channel, DetectorGeometry, Sample, Waveform};

/// Source of pedestal and RMS values, indexed by flat channel.
pub trait CalibrationProvider {
    /// Pedestal mean and RMS of a channel, if calibrated.
    fn pedestal_rms(&self, flat_channel: usize) -> Option<(f64, f64)>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CalibrationEntry {
    #[serde(flatten)]
    channel: Channel,
    pedestal: f64,
    rms: f64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CalibrationDocument {
    #[serde(default)]
    channels: Vec<CalibrationEntry>,
}

/// Calibration values for every channel of a detector geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationTable {
    geometry: DetectorGeometry,
    values: Vec<Option<(f64, f64)>>,
}

impl CalibrationTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new(geometry: DetectorGeometry) -> Self {
        let values = vec![None; geometry.channels()];
        Self { geometry, values }
    }

    /// Sets the calibration of one channel.
    ///
    /// # Errors
    /// Returns `InvalidChannel` if the channel is outside the geometry.
    pub fn insert(&mut self, channel: Channel, pedestal: f64, rms: f64) -> Result<()> {
        let index = self.geometry.locate(channel)?;
        self.values[index.flat] = Some((pedestal, rms));
        Ok(())
    }

    /// Number of calibrated channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.iter().flatten().count()
    }

    /// Returns true if no channel is calibrated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Loads a table from a JSON string.
    ///
    /// # Errors
    /// Returns an error if the JSON cannot be parsed or names a channel
    /// outside the geometry.
    pub fn from_json(json: &str, geometry: DetectorGeometry) -> Result<Self> {
        let document: CalibrationDocument = serde_json::from_str(json)?;
        Self::from_document(document, geometry)
    }

    /// Loads a table from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or names a
    /// channel outside the geometry.
    pub fn from_file<P: AsRef<Path>>(path: P, geometry: DetectorGeometry) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let document: CalibrationDocument = serde_json::from_reader(reader)?;
        Self::from_document(document, geometry)
    }

    fn from_document(document: CalibrationDocument, geometry: DetectorGeometry) -> Result<Self> {
        let mut table = Self::new(geometry);
        for entry in document.channels {
            if entry.rms < 0.0 {
                return Err(Error::InvalidFormat(format!(
                    "negative rms {} for {:?}",
                    entry.rms, entry.channel
                )));
            }
            table.insert(entry.channel, entry.pedestal, entry.rms)?;
        }
        Ok(table)
    }
}

impl CalibrationProvider for CalibrationTable {
    fn pedestal_rms(&self, flat_channel: usize) -> Option<(f64, f64)> {
        self.values.get(flat_channel).copied().flatten()
    }
}

/// Folds raw samples into one waveform summary per channel.
///
/// `adc_max` is the largest ADC value of the channel and `sample_max` the time
/// bucket where it first occurs. Channels without calibration get a zero RMS,
/// which the classifier never accepts as signal. Samples on channels outside
/// the geometry are dropped. Waveforms come out in flat-channel order.
#[must_use]
pub fn build_waveforms(
    samples: &[Sample],
    provider: &dyn CalibrationProvider,
    geometry: &DetectorGeometry,
) -> Vec<Waveform> {
    let mut peaks: BTreeMap<usize, (Channel, u16, u16)> = BTreeMap::new();

    for sample in samples {
        let index = match geometry.locate(sample.channel) {
            Ok(index) => index,
            Err(err) => {
                warn!("Dropping sample: {err}");
                continue;
            }
        };
        peaks
            .entry(index.flat)
            .and_modify(|(_, adc_max, sample_max)| {
                if sample.adc > *adc_max || (sample.adc == *adc_max && sample.sample < *sample_max)
                {
                    *adc_max = sample.adc;
                    *sample_max = sample.sample;
                }
            })
            .or_insert((sample.channel, sample.adc, sample.sample));
    }

    peaks
        .into_iter()
        .map(|(flat, (channel, adc_max, sample_max))| {
            let (pedestal, rms) = provider.pedestal_rms(flat).unwrap_or((0.0, 0.0));
            Waveform::new(channel, adc_max, sample_max, pedestal, rms)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn table() -> CalibrationTable {
        let json = r#"{
            "channels": [
                { "layer": 55, "tile": 0, "strip": 3, "pedestal": 50.0, "rms": 4.0 },
                { "layer": 56, "tile": 7, "strip": 255, "pedestal": 61.5, "rms": 3.5 }
            ]
        }"#;
        CalibrationTable::from_json(json, DetectorGeometry::default()).unwrap()
    }

    #[test]
    fn test_table_lookup() {
        let table = table();
        assert_eq!(table.len(), 2);
        assert_eq!(table.pedestal_rms(3), Some((50.0, 4.0)));
        assert_eq!(table.pedestal_rms(4095), Some((61.5, 3.5)));
        assert_eq!(table.pedestal_rms(4), None);
        assert_eq!(table.pedestal_rms(10_000), None);
    }

    #[test]
    fn test_table_rejects_invalid_channel() {
        let json = r#"{ "channels": [ { "layer": 0, "tile": 0, "strip": 3, "pedestal": 50.0, "rms": 4.0 } ] }"#;
        assert!(CalibrationTable::from_json(json, DetectorGeometry::default()).is_err());
    }

    #[test]
    fn test_build_waveforms() {
        let geometry = DetectorGeometry::default();
        let calibrated = Channel::new(55, 0, 3);
        let uncalibrated = Channel::new(55, 0, 9);
        let samples = vec![
            Sample::new(calibrated, 10, 60),
            Sample::new(calibrated, 31, 250),
            Sample::new(calibrated, 29, 250),
            Sample::new(calibrated, 40, 90),
            Sample::new(uncalibrated, 12, 70),
            Sample::new(Channel::new(0, 0, 1), 12, 900),
        ];

        let waveforms = build_waveforms(&samples, &table(), &geometry);
        assert_eq!(waveforms.len(), 2);

        let first = &waveforms[0];
        assert_eq!(first.channel, calibrated);
        assert_eq!(first.adc_max, 250);
        assert_eq!(first.sample_max, 29);
        assert_relative_eq!(first.pedestal, 50.0);
        assert_relative_eq!(first.rms, 4.0);

        assert_eq!(waveforms[1].channel, uncalibrated);
        assert_relative_eq!(waveforms[1].rms, 0.0);
    }
}
