//! Records of external reference subsystems.

use serde::{Deserialize, Serialize};
use stripsync_core::Clocked;

/// A per-trigger quantity measured by another subsystem.
///
/// Stored one per line as `{"clock": 1234, "value": 17.5}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExternalRecord {
    /// Trigger clock of the reference subsystem.
    pub clock: u64,
    /// Measured quantity (charge sum, hit multiplicity, ...).
    #[serde(default)]
    pub value: f64,
}

impl ExternalRecord {
    /// Creates a record.
    #[must_use]
    pub fn new(clock: u64, value: f64) -> Self {
        Self { clock, value }
    }
}

impl Clocked for ExternalRecord {
    fn clock(&self) -> u64 {
        self.clock
    }
}
