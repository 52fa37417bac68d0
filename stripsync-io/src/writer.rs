//! Output writers for analysis products.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use stripsync_algorithms::{EventSummary, Histogram2D, HotChannel, HotChannelMap};

/// Stored form of a [`HotChannelMap`]: only the channels above threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotChannelReport {
    /// Rate threshold used to flag channels.
    pub threshold: f64,
    /// Number of events the rates are normalized to.
    pub total_events: u64,
    /// Hot channels in flat-channel order.
    pub hot_channels: Vec<HotChannel>,
}

impl From<&HotChannelMap> for HotChannelReport {
    fn from(map: &HotChannelMap) -> Self {
        Self {
            threshold: map.threshold(),
            total_events: map.total_events(),
            hot_channels: map.hot_channels(),
        }
    }
}

impl HotChannelReport {
    /// Reads a report written by [`DataFileWriter::write_hot_channel_map`].
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

/// Writer for analysis output files.
pub struct DataFileWriter {
    writer: BufWriter<File>,
}

impl DataFileWriter {
    /// Creates a new file writer.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        Ok(Self { writer })
    }

    /// Appends one record as a JSON line.
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails.
    pub fn write_jsonl_record<T: Serialize>(&mut self, record: &T) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Writes event summaries as JSON lines.
    ///
    /// # Errors
    /// Returns an error if serialization or a write fails.
    pub fn write_summaries_jsonl(&mut self, summaries: &[EventSummary]) -> Result<()> {
        for summary in summaries {
            self.write_jsonl_record(summary)?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// Writes the hot channels of a map as a JSON document.
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails.
    pub fn write_hot_channel_map(&mut self, map: &HotChannelMap) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.writer, &HotChannelReport::from(map))?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Writes the non-empty cells of a histogram as CSV.
    ///
    /// # Errors
    /// Returns an error if a write fails.
    pub fn write_histogram_csv(&mut self, histogram: &Histogram2D) -> Result<()> {
        writeln!(self.writer, "x_low,x_high,y_low,y_high,count")?;

        for (ix, iy, count) in histogram.filled_bins() {
            let (x_low, x_high) = histogram.x_axis().edges(ix);
            let (y_low, y_high) = histogram.y_axis().edges(iy);
            writeln!(self.writer, "{x_low},{x_high},{y_low},{y_high},{count}")?;
        }

        self.writer.flush()?;
        Ok(())
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if the flush fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stripsync_algorithms::{accumulate_occupancy, Axis};
    use stripsync_core::{Channel, ClassifiedHit, DetectorGeometry, Waveform};
    use tempfile::NamedTempFile;

    #[test]
    fn test_write_histogram_csv() {
        let file = NamedTempFile::new().unwrap();
        let mut writer = DataFileWriter::create(file.path()).unwrap();

        let mut histogram = Histogram2D::new(
            Axis::new(4, 0.0, 4.0).unwrap(),
            Axis::new(2, 0.0, 10.0).unwrap(),
        );
        histogram.fill(1.5, 2.0);
        histogram.fill(1.2, 3.0);
        histogram.fill(3.5, 7.0);
        histogram.fill(9.0, 1.0);

        writer.write_histogram_csv(&histogram).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "x_low,x_high,y_low,y_high,count");
        assert!(lines.contains(&"1,2,0,5,2"));
        assert!(lines.contains(&"3,4,5,10,1"));
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_hot_channel_report() {
        let file = NamedTempFile::new().unwrap();
        let hot = Channel::new(56, 2, 17);
        let hit = ClassifiedHit::new(Waveform::new(hot, 300, 30, 50.0, 4.0), true);
        let hits = vec![hit; 3];
        let map = accumulate_occupancy(&hits, 10, &DetectorGeometry::default(), 0.2);

        DataFileWriter::create(file.path())
            .unwrap()
            .write_hot_channel_map(&map)
            .unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert!(content.contains("\"hot_channels\""));

        let report = HotChannelReport::from_file(file.path()).unwrap();
        assert_eq!(report.total_events, 10);
        assert_eq!(report.hot_channels.len(), 1);
        assert_eq!(report.hot_channels[0].channel, hot);
        assert!((report.hot_channels[0].rate - 0.3).abs() < 1e-12);
    }
}
