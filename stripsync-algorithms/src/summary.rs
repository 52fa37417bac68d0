//! Per-event processing: classify every waveform, cluster, and summarize.

use stripsync_core::classify::ClassifierConfig;
use stripsync_core::event::EventRecord;
use stripsync_core::geometry::DetectorGeometry;
use stripsync_core::stream::Clocked;
use stripsync_core::waveform::ClassifiedHit;

use crate::clustering::{ClusterCounts, ClusteringStatistics, StripCluster, StripClusterer};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Cluster multiplicities and waveform counts of one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventSummary {
    /// Trigger clock value.
    pub clock: u64,
    /// Trusted trigger counter.
    pub counter: u32,
    /// Waveforms in the event.
    pub n_waveforms_all: usize,
    /// Waveforms classified as signal in the prompt window.
    pub n_waveforms_signal: usize,
    /// Signal clusters.
    pub n_clusters: usize,
    /// Signal clusters on phi-view units.
    pub n_phi_clusters: usize,
    /// Signal clusters on z-view units.
    pub n_z_clusters: usize,
    /// Signal clusters per detector unit.
    pub n_detector_clusters: Vec<usize>,
    /// Clusters of hits firing in the baseline window.
    #[cfg_attr(feature = "serde", serde(default))]
    pub n_background_clusters: usize,
    /// Waveforms discarded for an out-of-range channel.
    #[cfg_attr(feature = "serde", serde(default))]
    pub n_invalid: usize,
}

impl Clocked for EventSummary {
    #[inline]
    fn clock(&self) -> u64 {
        self.clock
    }
}

/// Signal and background clusters of one event.
#[derive(Debug, Clone, Default)]
pub struct EventClusters {
    /// Clusters of prompt-window signal hits.
    pub signal: Vec<StripCluster>,
    /// Clusters of baseline-window hits.
    pub background: Vec<StripCluster>,
}

/// Classifies and clusters whole events.
#[derive(Debug, Clone, Default)]
pub struct EventClusterer {
    classifier: ClassifierConfig,
    clusterer: StripClusterer,
}

impl EventClusterer {
    /// Creates an event clusterer.
    #[must_use]
    pub fn new(geometry: DetectorGeometry, classifier: ClassifierConfig) -> Self {
        Self {
            classifier,
            clusterer: StripClusterer::new(geometry),
        }
    }

    /// Classifier settings.
    #[must_use]
    pub fn classifier(&self) -> &ClassifierConfig {
        &self.classifier
    }

    /// Detector geometry.
    #[must_use]
    pub fn geometry(&self) -> &DetectorGeometry {
        self.clusterer.geometry()
    }

    /// Classifies every waveform of the event in the prompt window.
    #[must_use]
    pub fn classify(&self, event: &EventRecord) -> Vec<ClassifiedHit> {
        event
            .waveforms
            .iter()
            .map(|waveform| self.classifier.classify_signal(waveform))
            .collect()
    }

    /// Builds signal and background clusters for an event.
    pub fn clusters(&self, event: &EventRecord, stats: &mut ClusteringStatistics) -> EventClusters {
        let signal_hits = self.classify(event);
        let background_hits: Vec<ClassifiedHit> = event
            .waveforms
            .iter()
            .map(|waveform| self.classifier.classify_baseline(waveform))
            .collect();

        let signal = self.clusterer.cluster(&signal_hits, stats);
        // Invalid channels were already counted by the signal pass.
        let mut background_stats = ClusteringStatistics::default();
        let background = self.clusterer.cluster(&background_hits, &mut background_stats);

        EventClusters { signal, background }
    }

    /// Summarizes an event.
    pub fn summarize(&self, event: &EventRecord, stats: &mut ClusteringStatistics) -> EventSummary {
        let invalid_before = stats.invalid_channels;
        let clusters = self.clusters(event, stats);
        let counts = ClusterCounts::from_clusters(&clusters.signal, self.geometry());

        let n_waveforms_signal = event
            .waveforms
            .iter()
            .filter(|waveform| self.geometry().locate(waveform.channel).is_ok())
            .filter(|waveform| self.classifier.classify_signal(waveform).signal)
            .count();

        EventSummary {
            clock: event.clock,
            counter: event.counter,
            n_waveforms_all: event.len(),
            n_waveforms_signal,
            n_clusters: counts.total,
            n_phi_clusters: counts.phi,
            n_z_clusters: counts.z,
            n_detector_clusters: counts.per_unit,
            n_background_clusters: clusters.background.len(),
            n_invalid: stats.invalid_channels - invalid_before,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stripsync_core::geometry::Channel;
    use stripsync_core::waveform::Waveform;

    fn waveform(layer: u16, tile: u16, strip: u16, adc: u16, sample: u16) -> Waveform {
        Waveform::new(Channel::new(layer, tile, strip), adc, sample, 50.0, 4.0)
    }

    #[test]
    fn test_summarize_event() {
        let mut event = EventRecord::new(4242, 17);
        event.waveforms = vec![
            // Phi unit 0: strips 3, 4, 5 and 10, 11 signal
            waveform(55, 0, 3, 200, 30),
            waveform(55, 0, 4, 200, 30),
            waveform(55, 0, 5, 200, 30),
            waveform(55, 0, 10, 200, 30),
            waveform(55, 0, 11, 200, 30),
            // Z unit 12: one signal strip, one below threshold
            waveform(56, 4, 100, 200, 25),
            waveform(56, 4, 101, 60, 25),
            // Pre-trigger activity on unit 1
            waveform(55, 1, 50, 200, 8),
            // Unmapped channel
            waveform(0, 0, 0, 200, 30),
        ];

        let clusterer = EventClusterer::default();
        let mut stats = ClusteringStatistics::default();
        let summary = clusterer.summarize(&event, &mut stats);

        assert_eq!(summary.clock, 4242);
        assert_eq!(summary.counter, 17);
        assert_eq!(summary.n_waveforms_all, 9);
        assert_eq!(summary.n_waveforms_signal, 6);
        assert_eq!(summary.n_clusters, 3);
        assert_eq!(summary.n_phi_clusters, 2);
        assert_eq!(summary.n_z_clusters, 1);
        assert_eq!(summary.n_detector_clusters[0], 2);
        assert_eq!(summary.n_detector_clusters[12], 1);
        assert_eq!(summary.n_background_clusters, 1);
        assert_eq!(summary.n_invalid, 1);
        assert_eq!(summary.clock(), 4242);
    }

    #[test]
    fn test_empty_event() {
        let event = EventRecord::new(1, 1);
        let mut stats = ClusteringStatistics::default();
        let summary = EventClusterer::default().summarize(&event, &mut stats);
        assert_eq!(summary.n_clusters, 0);
        assert_eq!(summary.n_detector_clusters, vec![0; 16]);
    }
}
