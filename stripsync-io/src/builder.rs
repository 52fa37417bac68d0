//! Event building from raw readout entries.
//!
//! The front end writes one entry per readout packet; entries sharing a
//! level-1 clock belong to the same trigger. Entries whose redundant trigger
//! counters disagree are dropped together with whatever was already collected
//! for the current clock.

use crate::calibration::{build_waveforms, CalibrationProvider};
use crate::Result;
use log::warn;
use stripsync_core::{DetectorGeometry, EventRecord, RawReadout, Waveform};

/// Event building counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStatistics {
    /// Readout entries consumed.
    pub entries_read: usize,
    /// Events emitted.
    pub events_built: usize,
    /// Entries dropped for inconsistent trigger counters.
    pub entries_dropped: usize,
}

/// Groups consecutive readout entries into [`EventRecord`]s.
///
/// Read errors from the input are passed through as items.
pub struct EventBuilder<I> {
    entries: I,
    calibration: Option<(Box<dyn CalibrationProvider>, DetectorGeometry)>,
    current: Option<(u64, u32)>,
    waveforms: Vec<Waveform>,
    stats: BuildStatistics,
}

impl<I> EventBuilder<I>
where
    I: Iterator<Item = Result<RawReadout>>,
{
    /// Creates a builder over readout entries.
    pub fn new<T>(entries: T) -> Self
    where
        T: IntoIterator<IntoIter = I>,
    {
        Self {
            entries: entries.into_iter(),
            calibration: None,
            current: None,
            waveforms: Vec::new(),
            stats: BuildStatistics::default(),
        }
    }

    /// Also turns raw samples into waveforms using the given calibration.
    #[must_use]
    pub fn with_calibration(
        mut self,
        provider: Box<dyn CalibrationProvider>,
        geometry: DetectorGeometry,
    ) -> Self {
        self.calibration = Some((provider, geometry));
        self
    }

    /// Counters accumulated so far.
    #[must_use]
    pub fn stats(&self) -> BuildStatistics {
        self.stats
    }

    fn collect_waveforms(&mut self, entry: RawReadout) {
        self.waveforms.extend(entry.waveforms);
        if let Some((provider, geometry)) = &self.calibration {
            if !entry.samples.is_empty() {
                self.waveforms
                    .extend(build_waveforms(&entry.samples, provider.as_ref(), geometry));
            }
        }
    }

    fn flush(&mut self) -> Option<EventRecord> {
        if self.waveforms.is_empty() {
            return None;
        }
        let (clock, counter) = self.current?;
        self.stats.events_built += 1;
        Some(EventRecord {
            clock,
            counter,
            waveforms: std::mem::take(&mut self.waveforms),
        })
    }
}

impl<I> Iterator for EventBuilder<I>
where
    I: Iterator<Item = Result<RawReadout>>,
{
    type Item = Result<EventRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.entries.next() {
                None => return self.flush().map(Ok),
                Some(Err(err)) => return Some(Err(err)),
                Some(Ok(entry)) => entry,
            };
            self.stats.entries_read += 1;

            let counter = match entry.trusted_counter() {
                Ok(counter) => counter,
                Err(err) => {
                    warn!("Dropping readout entry {}: {err}", self.stats.entries_read - 1);
                    self.stats.entries_dropped += 1;
                    self.waveforms.clear();
                    continue;
                }
            };

            let mut built = None;
            if self.current.map(|(clock, _)| clock) != Some(entry.lvl1_bco) {
                built = self.flush();
                self.current = Some((entry.lvl1_bco, counter));
            }
            self.collect_waveforms(entry);

            if let Some(event) = built {
                return Some(Ok(event));
            }
        }
    }
}
