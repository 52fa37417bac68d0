//! Greedy online stream alignment.
//!
//! After the seek phase the aligner walks both streams in lockstep and
//! compares the elapsed time since each stream's first aligned entry. A
//! disagreement beyond the tolerance is repaired by stepping whichever stream
//! fell behind; such a step is rejected and yields no pair. A reference gap
//! that lines up with a whole number of clock periods is taken to be missed
//! rollovers and absorbed into the rollover count instead.

use crate::clock::RolloverClock;
use crate::config::AlignerConfig;
use crate::seek::{find_offset, StreamOffset};
use log::{debug, info, warn};
use stripsync_core::{Clocked, Error, EventStream, Result};

/// Lifecycle of an [`Aligner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignPhase {
    /// Offset not yet determined.
    Seeking,
    /// Emitting aligned pairs.
    Aligned,
    /// One of the streams ran out.
    Exhausted,
    /// No offset was found in the seek window.
    Unresolvable,
}

/// Cursor and correction state of the aligner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlignmentState {
    /// Next reference entry to examine.
    pub reference_cursor: usize,
    /// Next subject entry to examine.
    pub subject_cursor: usize,
    /// Reference clock rollovers counted so far.
    pub rollover_count: u64,
    /// Persistent shift applied to reference lookups.
    pub entry_offset_correction: i64,
}

/// Alignment counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlignStats {
    /// Pairs emitted.
    pub pairs_accepted: usize,
    /// Steps that emitted no pair.
    pub steps_rejected: usize,
    /// Extra reference entries skipped to catch up.
    pub reference_advances: usize,
    /// Extra subject entries skipped to catch up.
    pub subject_advances: usize,
    /// Missed rollovers absorbed.
    pub rollovers_absorbed: u64,
    /// Split triggers seen on the reference clock.
    pub split_triggers: usize,
    /// Compensated reference lookups that fell outside the stream.
    pub lookups_out_of_range: usize,
}

/// One matched pair of records.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedPair<R, S> {
    /// Index of the reference record, after lookup compensation.
    pub reference_index: usize,
    /// Index of the subject record.
    pub subject_index: usize,
    /// Reference record.
    pub reference: R,
    /// Subject record.
    pub subject: S,
}

enum Step<R, S> {
    Accepted(AlignedPair<R, S>),
    Rejected,
    Exhausted,
}

/// Iterator over aligned record pairs of two streams.
///
/// Each item is a matched pair or a stream read error. Iteration stops once a
/// stream is exhausted or a read fails.
pub struct Aligner<R: EventStream, S: EventStream> {
    reference: R,
    subject: S,
    config: AlignerConfig,
    phase: AlignPhase,
    offset: Option<StreamOffset>,
    clock: RolloverClock,
    reference_cursor: usize,
    subject_cursor: usize,
    entry_offset_correction: i64,
    first_reference: Option<u64>,
    first_subject: Option<u64>,
    stats: AlignStats,
}

impl<R, S> Aligner<R, S>
where
    R: EventStream,
    R::Record: Clocked,
    S: EventStream,
    S::Record: Clocked,
{
    /// Creates an aligner in the [`AlignPhase::Seeking`] phase.
    ///
    /// # Errors
    /// Returns `ConfigError` for an invalid configuration.
    pub fn new(reference: R, subject: S, config: AlignerConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::ConfigError(e.to_string()))?;
        let width = config
            .reference_width()
            .map_err(|e| Error::ConfigError(e.to_string()))?;
        Ok(Self {
            reference,
            subject,
            config,
            phase: AlignPhase::Seeking,
            offset: None,
            clock: RolloverClock::new(width),
            reference_cursor: 0,
            subject_cursor: 0,
            entry_offset_correction: 0,
            first_reference: None,
            first_subject: None,
            stats: AlignStats::default(),
        })
    }

    /// Runs the seek phase and positions both cursors at the matched pair.
    ///
    /// Calling it again after a successful seek returns the stored offset.
    ///
    /// # Errors
    /// Returns `AlignmentNotFound` (leaving the aligner
    /// [`AlignPhase::Unresolvable`]) or a stream read error.
    pub fn seek(&mut self) -> Result<StreamOffset> {
        if let Some(offset) = self.offset {
            return Ok(offset);
        }
        match find_offset(&self.reference, &self.subject, &self.config) {
            Ok(offset) => {
                self.offset = Some(offset);
                self.subject_cursor = offset.first_subject_entry;
                self.reference_cursor = offset.first_reference_entry();
                self.phase = AlignPhase::Aligned;
                Ok(offset)
            }
            Err(err) => {
                if matches!(err, Error::AlignmentNotFound { .. }) {
                    warn!("Stream alignment unresolvable: {err}");
                    self.phase = AlignPhase::Unresolvable;
                }
                Err(err)
            }
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> AlignPhase {
        self.phase
    }

    /// Offset found by the seek phase.
    #[must_use]
    pub fn offset(&self) -> Option<StreamOffset> {
        self.offset
    }

    /// Current cursors and corrections.
    #[must_use]
    pub fn state(&self) -> AlignmentState {
        AlignmentState {
            reference_cursor: self.reference_cursor,
            subject_cursor: self.subject_cursor,
            rollover_count: self.clock.rollovers(),
            entry_offset_correction: self.entry_offset_correction,
        }
    }

    /// Counters accumulated so far.
    #[must_use]
    pub fn stats(&self) -> AlignStats {
        self.stats
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &AlignerConfig {
        &self.config
    }

    fn reference_limit(&self) -> usize {
        self.config
            .max_entries
            .map_or(self.reference.len(), |cap| cap.min(self.reference.len()))
    }

    fn subject_limit(&self) -> usize {
        self.config
            .max_entries
            .map_or(self.subject.len(), |cap| cap.min(self.subject.len()))
    }

    /// Whole periods spanned by `gap`, if it sits within the rollover residual
    /// of a multiple of the reference clock period.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn missed_rollovers(&self, gap: i64) -> Option<u64> {
        let width = self.clock.width()?;
        let modulus = i128::from(width.modulus());
        let rounds = (gap as f64 / modulus as f64).round() as i128;
        let residual = i128::from(gap) - rounds * modulus;
        if residual.unsigned_abs() < u128::from(self.config.rollover_residual) {
            u64::try_from(rounds.max(0)).ok()
        } else {
            None
        }
    }

    fn step(&mut self) -> Result<Step<R::Record, S::Record>> {
        let reference_limit = self.reference_limit();
        let subject_limit = self.subject_limit();
        if self.reference_cursor >= reference_limit || self.subject_cursor >= subject_limit {
            return Ok(Step::Exhausted);
        }

        let mut subject = self.subject.read(self.subject_cursor)?;
        let mut reference = self.reference.read(self.reference_cursor)?;
        let reading = self.clock.advance(reference.clock());
        let first_reference = *self.first_reference.get_or_insert(reading.clock);
        let first_subject = *self.first_subject.get_or_insert(subject.clock());

        if self.config.split_trigger_compensation
            && reading.delta == Some(self.config.split_trigger_delta)
        {
            self.entry_offset_correction -= 1;
            self.stats.split_triggers += 1;
            debug!(
                "Split trigger at reference entry {}; lookup correction now {}",
                self.reference_cursor, self.entry_offset_correction
            );
        }

        let tolerance = i64::try_from(self.config.time_tolerance).unwrap_or(i64::MAX);
        let mut reference_time = elapsed(reading.clock, first_reference);
        let mut subject_time = elapsed(subject.clock(), first_subject);
        let mut corrected = false;

        // Reference entries missing: subject ahead.
        while subject_time > reference_time.saturating_add(tolerance) {
            if let Some(rounds) = self.missed_rollovers(subject_time - reference_time) {
                self.clock.absorb(rounds);
                self.stats.rollovers_absorbed += rounds;
                debug!(
                    "Absorbed {rounds} missed rollover(s) at reference entry {}",
                    self.reference_cursor
                );
                break;
            }
            corrected = true;
            self.reference_cursor += 1;
            self.stats.reference_advances += 1;
            if self.reference_cursor >= reference_limit {
                return Ok(Step::Exhausted);
            }
            reference = self.reference.read(self.reference_cursor)?;
            reference_time = elapsed(self.clock.advance(reference.clock()).clock, first_reference);
            debug!(
                "Advanced reference to entry {} (reference {reference_time}, subject {subject_time})",
                self.reference_cursor
            );
        }

        // Subject entries missing: reference ahead.
        while reference_time > subject_time.saturating_add(tolerance) {
            corrected = true;
            self.subject_cursor += 1;
            self.stats.subject_advances += 1;
            if self.subject_cursor >= subject_limit {
                return Ok(Step::Exhausted);
            }
            subject = self.subject.read(self.subject_cursor)?;
            subject_time = elapsed(subject.clock(), first_subject);
            debug!(
                "Advanced subject to entry {} (reference {reference_time}, subject {subject_time})",
                self.subject_cursor
            );
        }

        let outcome = if corrected {
            self.stats.steps_rejected += 1;
            Step::Rejected
        } else {
            self.lookup(reference, subject)?
        };

        self.reference_cursor += 1;
        self.subject_cursor += 1;
        Ok(outcome)
    }

    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    fn lookup(
        &mut self,
        reference: R::Record,
        subject: S::Record,
    ) -> Result<Step<R::Record, S::Record>> {
        let index = self.reference_cursor as i64 + self.entry_offset_correction;
        let reference = if self.entry_offset_correction == 0 {
            reference
        } else if (0..self.reference.len() as i64).contains(&index) {
            self.reference.read(index as usize)?
        } else {
            warn!(
                "Compensated reference entry {index} out of range; skipping subject entry {}",
                self.subject_cursor
            );
            self.stats.lookups_out_of_range += 1;
            self.stats.steps_rejected += 1;
            return Ok(Step::Rejected);
        };

        self.stats.pairs_accepted += 1;
        Ok(Step::Accepted(AlignedPair {
            reference_index: index as usize,
            subject_index: self.subject_cursor,
            reference,
            subject,
        }))
    }
}

#[allow(clippy::cast_possible_wrap)]
fn elapsed(clock: u64, first: u64) -> i64 {
    clock.wrapping_sub(first) as i64
}

impl<R, S> Iterator for Aligner<R, S>
where
    R: EventStream,
    R::Record: Clocked,
    S: EventStream,
    S::Record: Clocked,
{
    type Item = Result<AlignedPair<R::Record, S::Record>>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.phase == AlignPhase::Aligned {
            match self.step() {
                Ok(Step::Accepted(pair)) => return Some(Ok(pair)),
                Ok(Step::Rejected) => {}
                Ok(Step::Exhausted) => {
                    self.phase = AlignPhase::Exhausted;
                    info!(
                        "Alignment finished: {} pairs, {} rejected steps, {} rollovers",
                        self.stats.pairs_accepted,
                        self.stats.steps_rejected,
                        self.clock.rollovers()
                    );
                }
                Err(err) => {
                    self.phase = AlignPhase::Exhausted;
                    return Some(Err(err));
                }
            }
        }
        None
    }
}

/// Seeks the stream offset and returns an iterator over aligned pairs.
///
/// # Errors
/// Returns `ConfigError` for an invalid configuration, `AlignmentNotFound` if
/// the seek window holds no match, or a stream read error.
pub fn align<R, S>(reference: R, subject: S, config: AlignerConfig) -> Result<Aligner<R, S>>
where
    R: EventStream,
    R::Record: Clocked,
    S: EventStream,
    S::Record: Clocked,
{
    let mut aligner = Aligner::new(reference, subject, config)?;
    aligner.seek()?;
    Ok(aligner)
}
