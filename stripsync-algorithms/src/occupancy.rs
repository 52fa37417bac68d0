//! Per-channel occupancy across a run and hot-channel flagging.
//!
//! The accumulator only counts; rates and hot flags exist once the whole run
//! has been seen and [`OccupancyAccumulator::finish`] is called.

use log::warn;
use rayon::prelude::*;
use stripsync_core::geometry::{Channel, DetectorGeometry};
use stripsync_core::waveform::ClassifiedHit;
use stripsync_core::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Occupancy settings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OccupancyConfig {
    /// Hit rate (hits per event) above which a channel is hot.
    pub hot_threshold: f64,
}

impl Default for OccupancyConfig {
    fn default() -> Self {
        Self { hot_threshold: 0.2 }
    }
}

impl OccupancyConfig {
    /// Sets the hot-channel threshold.
    #[must_use]
    pub fn with_hot_threshold(mut self, threshold: f64) -> Self {
        self.hot_threshold = threshold;
        self
    }

    /// Checks the threshold.
    ///
    /// # Errors
    /// Returns `ConfigError` for a negative or non-finite threshold.
    pub fn validate(&self) -> Result<()> {
        if !self.hot_threshold.is_finite() || self.hot_threshold < 0.0 {
            return Err(Error::ConfigError(format!(
                "invalid hot channel threshold: {}",
                self.hot_threshold
            )));
        }
        Ok(())
    }
}

/// Per-channel signal hit counter for a run.
#[derive(Debug, Clone)]
pub struct OccupancyAccumulator {
    geometry: DetectorGeometry,
    hits: Vec<u64>,
    events: u64,
    invalid: u64,
}

impl Default for OccupancyAccumulator {
    fn default() -> Self {
        Self::new(DetectorGeometry::default())
    }
}

impl OccupancyAccumulator {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new(geometry: DetectorGeometry) -> Self {
        let channels = geometry.channels();
        Self {
            geometry,
            hits: vec![0; channels],
            events: 0,
            invalid: 0,
        }
    }

    /// Counts one signal hit. Background hits are ignored.
    ///
    /// # Errors
    /// Returns `InvalidChannel` for a channel outside the geometry; the hit is not counted.
    pub fn add_hit(&mut self, hit: &ClassifiedHit) -> Result<()> {
        if !hit.signal {
            return Ok(());
        }
        match self.geometry.locate(hit.channel()) {
            Ok(index) => {
                self.hits[index.flat] += 1;
                Ok(())
            }
            Err(err) => {
                self.invalid += 1;
                Err(err)
            }
        }
    }

    /// Counts the signal hits of one event and the event itself.
    pub fn add_event(&mut self, hits: &[ClassifiedHit]) {
        self.events += 1;
        for hit in hits {
            if let Err(err) = self.add_hit(hit) {
                warn!("occupancy: discarding hit: {err}");
            }
        }
    }

    /// Adds events that were processed without contributing hits.
    pub fn record_events(&mut self, events: u64) {
        self.events += events;
    }

    /// Adds the counts of another accumulator over the same geometry.
    pub fn merge(&mut self, other: &Self) {
        for (total, count) in self.hits.iter_mut().zip(&other.hits) {
            *total += count;
        }
        self.events += other.events;
        self.invalid += other.invalid;
    }

    /// Signal hits counted for a flat channel.
    #[must_use]
    pub fn hits(&self, flat: usize) -> u64 {
        self.hits.get(flat).copied().unwrap_or(0)
    }

    /// Events recorded so far.
    #[must_use]
    pub fn events(&self) -> u64 {
        self.events
    }

    /// Hits discarded for an invalid channel.
    #[must_use]
    pub fn invalid(&self) -> u64 {
        self.invalid
    }

    /// Converts the counts into rates over `total_events` and flags hot channels.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn finish(&self, total_events: u64, threshold: f64) -> HotChannelMap {
        let rates = if total_events == 0 {
            vec![0.0; self.hits.len()]
        } else {
            self.hits
                .iter()
                .map(|&count| count as f64 / total_events as f64)
                .collect()
        };

        HotChannelMap {
            geometry: self.geometry.clone(),
            threshold,
            total_events,
            rates,
        }
    }
}

/// Accumulates the signal hits of a whole run and flags hot channels.
///
/// `total_events` is the number of processed events, including events without hits.
pub fn accumulate_occupancy<'a, I>(
    hits: I,
    total_events: u64,
    geometry: &DetectorGeometry,
    threshold: f64,
) -> HotChannelMap
where
    I: IntoIterator<Item = &'a ClassifiedHit>,
{
    let mut accumulator = OccupancyAccumulator::new(geometry.clone());
    for hit in hits {
        if let Err(err) = accumulator.add_hit(hit) {
            warn!("occupancy: discarding hit: {err}");
        }
    }
    accumulator.finish(total_events, threshold)
}

/// Accumulates independent batches of hits in parallel and merges the counts.
///
/// The result is identical to a single pass over the concatenated batches.
pub fn accumulate_occupancy_batched(
    batches: &[Vec<ClassifiedHit>],
    total_events: u64,
    geometry: &DetectorGeometry,
    threshold: f64,
) -> HotChannelMap {
    let accumulator = batches
        .par_iter()
        .map(|batch| {
            let mut partial = OccupancyAccumulator::new(geometry.clone());
            for hit in batch {
                if let Err(err) = partial.add_hit(hit) {
                    warn!("occupancy: discarding hit: {err}");
                }
            }
            partial
        })
        .reduce(
            || OccupancyAccumulator::new(geometry.clone()),
            |mut left, right| {
                left.merge(&right);
                left
            },
        );
    accumulator.finish(total_events, threshold)
}

/// A channel flagged as hot, with its rate.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HotChannel {
    /// Channel identity.
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub channel: Channel,
    /// Observed hits per event.
    pub rate: f64,
}

/// Per-channel hit rates of a complete run with a hot threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct HotChannelMap {
    geometry: DetectorGeometry,
    threshold: f64,
    total_events: u64,
    rates: Vec<f64>,
}

impl HotChannelMap {
    /// Threshold used to flag channels.
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Number of events the rates are normalized to.
    #[must_use]
    pub fn total_events(&self) -> u64 {
        self.total_events
    }

    /// Hit rate of a channel; channels never observed or outside the geometry have rate 0.
    #[must_use]
    pub fn rate(&self, channel: Channel) -> f64 {
        self.geometry
            .locate(channel)
            .ok()
            .and_then(|index| self.rates.get(index.flat).copied())
            .unwrap_or(0.0)
    }

    /// Returns true if the channel rate exceeds the threshold.
    #[must_use]
    pub fn is_hot(&self, channel: Channel) -> bool {
        self.rate(channel) > self.threshold
    }

    /// Hot channels in flat-channel order.
    #[must_use]
    pub fn hot_channels(&self) -> Vec<HotChannel> {
        self.rates
            .iter()
            .enumerate()
            .filter(|(_, &rate)| rate > self.threshold)
            .filter_map(|(flat, &rate)| {
                self.geometry
                    .channel(flat)
                    .map(|channel| HotChannel { channel, rate })
            })
            .collect()
    }

    /// Number of hot channels.
    #[must_use]
    pub fn hot_count(&self) -> usize {
        self.rates
            .iter()
            .filter(|&&rate| rate > self.threshold)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use stripsync_core::waveform::Waveform;

    fn signal_hit(channel: Channel) -> ClassifiedHit {
        ClassifiedHit::new(Waveform::new(channel, 200, 30, 50.0, 4.0), true)
    }

    #[test]
    fn test_hot_channel_flagged() {
        let hot = Channel::new(55, 3, 17);
        let quiet = Channel::new(56, 0, 200);

        let mut accumulator = OccupancyAccumulator::default();
        for event in 0..1000 {
            let mut hits = Vec::new();
            if event % 4 == 0 {
                hits.push(signal_hit(hot));
            }
            if event % 10 == 0 {
                hits.push(signal_hit(quiet));
            }
            accumulator.add_event(&hits);
        }
        assert_eq!(accumulator.events(), 1000);

        let map = accumulator.finish(accumulator.events(), 0.2);
        assert_relative_eq!(map.rate(hot), 0.25);
        assert_relative_eq!(map.rate(quiet), 0.1);
        assert!(map.is_hot(hot));
        assert!(!map.is_hot(quiet));
        assert_eq!(map.hot_count(), 1);

        let hot_channels = map.hot_channels();
        assert_eq!(hot_channels.len(), 1);
        assert_eq!(hot_channels[0].channel, hot);
    }

    #[test]
    fn test_unobserved_channel_is_cold() {
        let map = OccupancyAccumulator::default().finish(100, 0.2);
        assert_relative_eq!(map.rate(Channel::new(55, 0, 0)), 0.0);
        assert!(!map.is_hot(Channel::new(55, 0, 0)));
        assert!(map.hot_channels().is_empty());
    }

    #[test]
    fn test_zero_events() {
        let hits = vec![signal_hit(Channel::new(55, 0, 0))];
        let map = accumulate_occupancy(&hits, 0, &DetectorGeometry::default(), 0.2);
        assert_relative_eq!(map.rate(Channel::new(55, 0, 0)), 0.0);
    }

    #[test]
    fn test_background_and_invalid_hits_not_counted() {
        let mut accumulator = OccupancyAccumulator::default();
        let mut background = signal_hit(Channel::new(55, 0, 1));
        background.signal = false;
        assert!(accumulator.add_hit(&background).is_ok());
        assert!(accumulator
            .add_hit(&signal_hit(Channel::new(0, 0, 0)))
            .is_err());
        assert_eq!(accumulator.hits(1), 0);
        assert_eq!(accumulator.invalid(), 1);
    }

    #[test]
    fn test_exact_threshold_is_not_hot() {
        let channel = Channel::new(55, 0, 5);
        let hits = vec![signal_hit(channel); 20];
        let map = accumulate_occupancy(&hits, 100, &DetectorGeometry::default(), 0.2);
        assert!(!map.is_hot(channel));
    }

    #[test]
    fn test_merge() {
        let channel = Channel::new(56, 7, 255);
        let mut left = OccupancyAccumulator::default();
        let mut right = OccupancyAccumulator::default();
        left.add_event(&[signal_hit(channel)]);
        right.add_event(&[signal_hit(channel), signal_hit(channel)]);
        right.record_events(2);
        left.merge(&right);
        assert_eq!(left.hits(4095), 3);
        assert_eq!(left.events(), 4);
    }

    #[test]
    fn test_batched_invalid_hits_not_counted() {
        let channel = Channel::new(55, 0, 5);
        let batches = vec![
            vec![signal_hit(channel), signal_hit(Channel::new(0, 0, 0))],
            vec![signal_hit(Channel::new(55, 0, 999)), signal_hit(channel)],
        ];
        let map = accumulate_occupancy_batched(&batches, 10, &DetectorGeometry::default(), 0.5);
        assert_relative_eq!(map.rate(channel), 0.2);
        assert_eq!(map.hot_count(), 0);
    }
}
