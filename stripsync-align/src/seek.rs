//! Initial offset discovery between two streams.
//!
//! The seek phase scans the leading window of both streams for the first
//! position where they describe the same trigger. Reference entries are the
//! outer loop, so the earliest matching reference entry wins.

use crate::clock::{clock_delta, ClockWidth};
use crate::config::{AlignerConfig, MatchMode};
use log::info;
use stripsync_core::{Clocked, Error, EventStream, Result};

/// Matched starting point of the two streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOffset {
    /// First subject entry taking part in alignment.
    pub first_subject_entry: usize,
    /// `reference_index - subject_index` at the matched pair.
    pub entry_offset: i64,
}

impl StreamOffset {
    /// Reference entry matched with `first_subject_entry`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn first_reference_entry(&self) -> usize {
        // i - j + j == i, never negative
        (self.first_subject_entry as i64 + self.entry_offset) as usize
    }
}

/// Finds the first pair with `|subject - reference| <= epsilon`.
#[must_use]
pub fn match_raw(reference: &[u64], subject: &[u64], epsilon: u64) -> Option<StreamOffset> {
    for (i, &reference_clock) in reference.iter().enumerate() {
        for (j, &subject_clock) in subject.iter().enumerate() {
            if subject_clock.abs_diff(reference_clock) <= epsilon {
                return Some(offset(i, j));
            }
        }
    }
    None
}

/// Finds the first pair whose delta and following delta agree exactly.
#[must_use]
pub fn match_deltas(reference: &[u64], subject: &[u64]) -> Option<StreamOffset> {
    for i in 0..reference.len().saturating_sub(1) {
        for j in 0..subject.len().saturating_sub(1) {
            if reference[i] == subject[j] && reference[i + 1] == subject[j + 1] {
                return Some(offset(i, j));
            }
        }
    }
    None
}

/// Inter-event deltas; the first entry is measured from zero.
#[must_use]
pub fn clock_deltas(clocks: &[u64], width: Option<ClockWidth>) -> Vec<u64> {
    let mut previous = 0;
    clocks
        .iter()
        .map(|&clock| {
            let delta = clock_delta(previous, clock, width);
            previous = clock;
            delta
        })
        .collect()
}

#[allow(clippy::cast_possible_wrap)]
fn offset(reference_index: usize, subject_index: usize) -> StreamOffset {
    StreamOffset {
        first_subject_entry: subject_index,
        entry_offset: reference_index as i64 - subject_index as i64,
    }
}

fn leading_clocks<S>(stream: &S, window: usize) -> Result<Vec<u64>>
where
    S: EventStream,
    S::Record: Clocked,
{
    (0..window.min(stream.len()))
        .map(|index| stream.read(index).map(|record| record.clock()))
        .collect()
}

/// Determines the starting offset of two streams.
///
/// Reads at most `seek_window` entries of each stream (further capped by
/// `max_entries`).
///
/// # Errors
/// Returns `AlignmentNotFound` when no pair in the window matches, `ConfigError`
/// for an invalid reference clock width, or any stream read error.
pub fn find_offset<R, S>(reference: &R, subject: &S, config: &AlignerConfig) -> Result<StreamOffset>
where
    R: EventStream,
    R::Record: Clocked,
    S: EventStream,
    S::Record: Clocked,
{
    let window = config
        .max_entries
        .map_or(config.seek_window, |cap| cap.min(config.seek_window));
    let reference_clocks = leading_clocks(reference, window)?;
    let subject_clocks = leading_clocks(subject, window)?;

    let found = match config.match_mode {
        MatchMode::Raw => match_raw(&reference_clocks, &subject_clocks, config.match_epsilon),
        MatchMode::Delta => {
            let width = config
                .reference_width()
                .map_err(|e| Error::ConfigError(e.to_string()))?;
            match_deltas(
                &clock_deltas(&reference_clocks, width),
                &clock_deltas(&subject_clocks, None),
            )
        }
    };

    let offset = found.ok_or(Error::AlignmentNotFound {
        window: config.seek_window,
    })?;
    info!(
        "Streams matched: reference entry {} <-> subject entry {} (entry offset {})",
        offset.first_reference_entry(),
        offset.first_subject_entry,
        offset.entry_offset
    );
    Ok(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stripsync_core::VecStream;

    #[test]
    fn test_match_raw_first_reference_wins() {
        let reference = [10, 20, 30];
        let subject = [5, 30, 20];
        // Reference entry 1 (20) matches before reference entry 2 (30)
        let offset = match_raw(&reference, &subject, 0).unwrap();
        assert_eq!(offset.first_subject_entry, 2);
        assert_eq!(offset.entry_offset, -1);
        assert_eq!(offset.first_reference_entry(), 1);
    }

    #[test]
    fn test_match_raw_epsilon() {
        let offset = match_raw(&[100], &[98, 101], 1).unwrap();
        assert_eq!(offset.first_subject_entry, 1);
        assert!(match_raw(&[100], &[98, 102], 1).is_none());
    }

    #[test]
    fn test_match_deltas_requires_two() {
        // A single equal delta is not enough
        assert!(match_deltas(&[5, 7], &[5, 8]).is_none());
        let offset = match_deltas(&[9, 5, 7, 3], &[1, 2, 5, 7]).unwrap();
        assert_eq!(offset.first_subject_entry, 2);
        assert_eq!(offset.entry_offset, -1);
    }

    #[test]
    fn test_clock_deltas_wrapping() {
        let width = ClockWidth::new(16).ok();
        assert_eq!(
            clock_deltas(&[100, 65_500, 64], width),
            vec![100, 65_400, 100]
        );
        assert_eq!(clock_deltas(&[100, 350], None), vec![100, 250]);
    }

    #[test]
    fn test_find_offset_not_found() {
        let reference = VecStream::new(vec![1u64, 2, 3]);
        let subject = VecStream::new(vec![100u64, 300, 600]);
        let config = AlignerConfig::default().with_seek_window(10);
        assert_eq!(
            find_offset(&reference, &subject, &config),
            Err(Error::AlignmentNotFound { window: 10 })
        );
    }

    #[test]
    fn test_find_offset_respects_window() {
        let reference = VecStream::new(vec![0u64, 1, 2, 3, 500]);
        let subject = VecStream::new(vec![500u64]);
        let config = AlignerConfig::raw_matched().with_match_epsilon(0);
        assert!(find_offset(&reference, &subject, &config.clone().with_seek_window(4)).is_err());
        assert_eq!(
            find_offset(&reference, &subject, &config.with_seek_window(5))
                .unwrap()
                .entry_offset,
            4
        );
    }
}
