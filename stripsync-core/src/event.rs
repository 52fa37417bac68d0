//! Trigger-level records: raw readout entries and built events.

use crate::stream::Clocked;
use crate::waveform::{Sample, Waveform};
use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One DAQ readout entry as written by the front end.
///
/// Several entries may share the same level-1 clock; they are merged into one
/// [`EventRecord`] by the event builder.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawReadout {
    /// Level-1 clock counter of the trigger.
    pub lvl1_bco: u64,
    /// Redundant level-1 trigger counters, one per readout packet.
    #[cfg_attr(feature = "serde", serde(default))]
    pub lvl1_counters: Vec<u32>,
    /// Waveform summaries carried by this entry.
    #[cfg_attr(feature = "serde", serde(default))]
    pub waveforms: Vec<Waveform>,
    /// Raw samples carried by this entry.
    #[cfg_attr(feature = "serde", serde(default))]
    pub samples: Vec<Sample>,
}

impl RawReadout {
    /// Returns the trigger counter if both redundant counters agree.
    ///
    /// # Errors
    /// Returns `IntegrityMismatch` unless there are exactly two equal counters.
    pub fn trusted_counter(&self) -> Result<u32> {
        match self.lvl1_counters.as_slice() {
            [first, second] if first == second => Ok(*first),
            _ => Err(Error::IntegrityMismatch {
                clock: self.lvl1_bco,
                counters: self.lvl1_counters.clone(),
            }),
        }
    }
}

/// One trigger's worth of data from a single subsystem.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventRecord {
    /// Clock counter value of the trigger.
    pub clock: u64,
    /// Trusted level-1 trigger counter.
    pub counter: u32,
    /// All waveforms recorded for the trigger.
    pub waveforms: Vec<Waveform>,
}

impl EventRecord {
    /// Creates an empty event for the given clock and counter.
    #[must_use]
    pub fn new(clock: u64, counter: u32) -> Self {
        Self {
            clock,
            counter,
            waveforms: Vec::new(),
        }
    }

    /// Number of waveforms in the event.
    #[must_use]
    pub fn len(&self) -> usize {
        self.waveforms.len()
    }

    /// Returns true if the event carries no waveform.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waveforms.is_empty()
    }
}

impl Clocked for EventRecord {
    #[inline]
    fn clock(&self) -> u64 {
        self.clock
    }
}
