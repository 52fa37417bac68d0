//! Strip clustering: contiguous runs of signal strips within one detector unit.
//!
//! Hits are deduplicated by strip (the last hit seen for a strip wins) and
//! sorted, then a single left-to-right scan starts a new cluster whenever the
//! strip number jumps by more than one.

use std::collections::BTreeMap;

use log::warn;
use stripsync_core::geometry::{DetectorGeometry, View};
use stripsync_core::waveform::ClassifiedHit;

/// A group of adjacent signal strips on one detector unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StripCluster {
    /// Detector unit the cluster belongs to.
    pub unit: usize,
    /// Hits ordered by ascending strip number.
    pub hits: Vec<ClassifiedHit>,
}

impl StripCluster {
    /// Creates an empty cluster on a detector unit.
    #[must_use]
    pub fn new(unit: usize) -> Self {
        Self {
            unit,
            hits: Vec::new(),
        }
    }

    /// Adds a hit to the end of the cluster.
    pub fn push(&mut self, hit: ClassifiedHit) {
        self.hits.push(hit);
    }

    /// Number of strips in the cluster.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Returns true if the cluster has no strip.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Lowest strip of the cluster.
    #[must_use]
    pub fn first_strip(&self) -> Option<u16> {
        self.hits.first().map(ClassifiedHit::strip)
    }

    /// Highest strip of the cluster.
    #[must_use]
    pub fn last_strip(&self) -> Option<u16> {
        self.hits.last().map(ClassifiedHit::strip)
    }

    /// Strip numbers of the cluster, in order.
    pub fn strips(&self) -> impl Iterator<Item = u16> + '_ {
        self.hits.iter().map(ClassifiedHit::strip)
    }

    /// Sum of peak ADC values over the cluster.
    #[must_use]
    pub fn adc_sum(&self) -> u32 {
        self.hits
            .iter()
            .map(|hit| u32::from(hit.waveform.adc_max))
            .sum()
    }
}

/// Clusters the signal hits of one detector unit.
///
/// Hits outside the geometry or on another unit are discarded with a warning.
/// Background hits are ignored, duplicate strips collapse to the last hit
/// given, and the output is ordered by ascending lowest strip.
#[must_use]
pub fn cluster_strips<'a, I>(
    geometry: &DetectorGeometry,
    unit: usize,
    hits: I,
) -> Vec<StripCluster>
where
    I: IntoIterator<Item = &'a ClassifiedHit>,
{
    let unit_hits = hits
        .into_iter()
        .filter(|hit| match geometry.locate(hit.channel()) {
            Ok(index) if index.unit == unit => true,
            Ok(index) => {
                warn!(
                    "discarding hit on unit {} while clustering unit {unit}",
                    index.unit
                );
                false
            }
            Err(err) => {
                warn!("discarding hit: {err}");
                false
            }
        });
    build_clusters(unit, unit_hits)
}

/// Clusters hits already known to belong to `unit`.
fn build_clusters<'a, I>(unit: usize, hits: I) -> Vec<StripCluster>
where
    I: IntoIterator<Item = &'a ClassifiedHit>,
{
    let by_strip: BTreeMap<u16, ClassifiedHit> = hits
        .into_iter()
        .filter(|hit| hit.signal)
        .map(|hit| (hit.strip(), *hit))
        .collect();

    let mut clusters = Vec::new();
    let mut current = StripCluster::new(unit);
    let mut previous_strip: Option<u16> = None;

    for (strip, hit) in by_strip {
        let gap = previous_strip.is_some_and(|previous| strip > previous.saturating_add(1));
        if gap && !current.is_empty() {
            clusters.push(std::mem::replace(&mut current, StripCluster::new(unit)));
        }
        previous_strip = Some(strip);
        current.push(hit);
    }

    if !current.is_empty() {
        clusters.push(current);
    }

    clusters
}

/// Cluster multiplicities of one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterCounts {
    /// Total number of clusters.
    pub total: usize,
    /// Clusters on phi-view units.
    pub phi: usize,
    /// Clusters on z-view units.
    pub z: usize,
    /// Clusters per detector unit, zero-initialized for every unit.
    pub per_unit: Vec<usize>,
}

impl ClusterCounts {
    /// Tallies clusters by view and detector unit.
    #[must_use]
    pub fn from_clusters(clusters: &[StripCluster], geometry: &DetectorGeometry) -> Self {
        let mut counts = Self {
            per_unit: vec![0; geometry.units()],
            ..Self::default()
        };
        for cluster in clusters {
            counts.total += 1;
            match geometry.view(cluster.unit) {
                View::Phi => counts.phi += 1,
                View::Z => counts.z += 1,
            }
            if let Some(slot) = counts.per_unit.get_mut(cluster.unit) {
                *slot += 1;
            }
        }
        counts
    }
}

/// Running counters of a clusterer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusteringStatistics {
    /// Hits offered to the clusterer.
    pub hits_processed: usize,
    /// Hits discarded because their channel is outside the geometry.
    pub invalid_channels: usize,
    /// Clusters produced.
    pub clusters_found: usize,
}

/// Clusterer for whole events: splits hits by detector unit and clusters each unit.
#[derive(Debug, Clone, Default)]
pub struct StripClusterer {
    geometry: DetectorGeometry,
}

impl StripClusterer {
    /// Creates a clusterer for the given geometry.
    #[must_use]
    pub fn new(geometry: DetectorGeometry) -> Self {
        Self { geometry }
    }

    /// Geometry used to validate and group channels.
    #[must_use]
    pub fn geometry(&self) -> &DetectorGeometry {
        &self.geometry
    }

    /// Clusters all signal hits of an event.
    ///
    /// Hits on channels outside the geometry are discarded and counted in
    /// `stats.invalid_channels`. Clusters are ordered by detector unit, then
    /// by lowest strip.
    pub fn cluster(
        &self,
        hits: &[ClassifiedHit],
        stats: &mut ClusteringStatistics,
    ) -> Vec<StripCluster> {
        let mut per_unit: Vec<Vec<&ClassifiedHit>> = vec![Vec::new(); self.geometry.units()];

        for hit in hits {
            stats.hits_processed += 1;
            match self.geometry.locate(hit.channel()) {
                Ok(index) => per_unit[index.unit].push(hit),
                Err(err) => {
                    warn!("discarding hit: {err}");
                    stats.invalid_channels += 1;
                }
            }
        }

        let clusters: Vec<StripCluster> = per_unit
            .into_iter()
            .enumerate()
            .flat_map(|(unit, unit_hits)| build_clusters(unit, unit_hits))
            .collect();

        stats.clusters_found += clusters.len();
        clusters
    }
}
