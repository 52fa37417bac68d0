//! Fixed-width clock counters and rollover tracking.

use crate::{Error, Result};

/// Width of a wrapping hardware clock counter, in bits.
///
/// Widths are limited to 62 bits so that a full period and the signed distance
/// between two readings both fit in an `i64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockWidth {
    bits: u32,
}

impl ClockWidth {
    /// Widest supported counter.
    pub const MAX_BITS: u32 = 62;

    /// Creates a clock width.
    ///
    /// # Errors
    /// Returns `ConfigError` unless `1 <= bits <= ClockWidth::MAX_BITS`.
    pub fn new(bits: u32) -> Result<Self> {
        if !(1..=Self::MAX_BITS).contains(&bits) {
            return Err(Error::ConfigError(format!(
                "clock width must be between 1 and {} bits, got {bits}",
                Self::MAX_BITS
            )));
        }
        Ok(Self { bits })
    }

    /// Number of bits.
    #[inline]
    #[must_use]
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Counter modulus, `2^bits`.
    #[inline]
    #[must_use]
    pub fn modulus(&self) -> u64 {
        1u64 << self.bits
    }

    /// Keeps the low `bits` of a raw value.
    #[inline]
    #[must_use]
    pub fn mask(&self, raw: u64) -> u64 {
        raw & (self.modulus() - 1)
    }
}

/// Forward distance from `previous` to `current`.
///
/// On a wrapping clock the distance is taken modulo `2^W`, so a counter that
/// rolled over still yields the elapsed ticks.
#[inline]
#[must_use]
pub fn clock_delta(previous: u64, current: u64, width: Option<ClockWidth>) -> u64 {
    match width {
        Some(width) => width.mask(current.wrapping_sub(previous)),
        None => current.wrapping_sub(previous),
    }
}

/// Clock value extended with the rollover count, plus the delta to the previous reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockReading {
    /// Raw value plus `rollovers * 2^W`.
    pub clock: u64,
    /// Extended-clock distance to the previous reading, if any.
    pub delta: Option<u64>,
}

/// Extends a wrapping clock counter into a monotonic one.
///
/// A reading behind the previous extended value counts one rollover. The
/// extended value itself wraps at `2^64`; distances between readings stay
/// exact as long as they are below `2^63`. Missed
/// rollovers (gaps longer than a full period) can be added with
/// [`RolloverClock::absorb`].
#[derive(Debug, Clone, Default)]
pub struct RolloverClock {
    width: Option<ClockWidth>,
    rollovers: u64,
    previous: Option<u64>,
}

impl RolloverClock {
    /// Creates a tracker; `None` means the clock never wraps.
    #[must_use]
    pub fn new(width: Option<ClockWidth>) -> Self {
        Self {
            width,
            rollovers: 0,
            previous: None,
        }
    }

    /// Clock width, if the clock wraps.
    #[must_use]
    pub fn width(&self) -> Option<ClockWidth> {
        self.width
    }

    /// Rollovers counted so far.
    #[must_use]
    pub fn rollovers(&self) -> u64 {
        self.rollovers
    }

    /// Extends a raw reading and records it as the previous value.
    pub fn advance(&mut self, raw: u64) -> ClockReading {
        let Some(width) = self.width else {
            let delta = self.previous.map(|previous| raw.wrapping_sub(previous));
            self.previous = Some(raw);
            return ClockReading { clock: raw, delta };
        };

        let mut clock = width
            .mask(raw)
            .wrapping_add(self.rollovers.wrapping_mul(width.modulus()));
        if self.previous.is_some_and(|previous| is_behind(clock, previous)) {
            clock = clock.wrapping_add(width.modulus());
            self.rollovers += 1;
        }

        let delta = self.previous.map(|previous| clock.wrapping_sub(previous));
        self.previous = Some(clock);
        ClockReading { clock, delta }
    }

    /// Adds rollovers that the counter missed.
    pub fn absorb(&mut self, rollovers: u64) {
        self.rollovers += rollovers;
    }
}

#[inline]
#[allow(clippy::cast_possible_wrap)]
fn is_behind(clock: u64, previous: u64) -> bool {
    (clock.wrapping_sub(previous) as i64) < 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_width() {
        let width = ClockWidth::new(16).unwrap();
        assert_eq!(width.modulus(), 0x10000);
        assert_eq!(width.mask(0x1_2345), 0x2345);
        assert!(ClockWidth::new(0).is_err());
        assert!(ClockWidth::new(63).is_err());
        assert!(ClockWidth::new(64).is_err());
        assert_eq!(
            ClockWidth::new(ClockWidth::MAX_BITS).unwrap().modulus(),
            1 << 62
        );
    }

    #[test]
    fn test_clock_delta() {
        let width = ClockWidth::new(16).ok();
        assert_eq!(clock_delta(100, 250, width), 150);
        // Wrapped counter
        assert_eq!(clock_delta(0xFFF0, 0x0010, width), 0x20);
        // First delta is taken from zero
        assert_eq!(clock_delta(0, 0x1234, width), 0x1234);
        assert_eq!(clock_delta(1000, 1500, None), 500);
    }

    #[test]
    fn test_rollover_detection() {
        let mut clock = RolloverClock::new(ClockWidth::new(16).ok());
        assert_eq!(
            clock.advance(0xFF00),
            ClockReading {
                clock: 0xFF00,
                delta: None
            }
        );
        let reading = clock.advance(0x0100);
        assert_eq!(reading.clock, 0x1_0100);
        assert_eq!(reading.delta, Some(0x200));
        assert_eq!(clock.rollovers(), 1);

        // Monotonic afterwards
        assert_eq!(clock.advance(0x0200).clock, 0x1_0200);
        assert_eq!(clock.rollovers(), 1);
    }

    #[test]
    fn test_absorb_missed_rollover() {
        let mut clock = RolloverClock::new(ClockWidth::new(16).ok());
        clock.advance(1000);
        clock.absorb(1);
        assert_eq!(clock.advance(1100).clock, 0x1_0000 + 1100);
    }

    #[test]
    fn test_widest_clock_keeps_counting_past_u64() {
        let width = ClockWidth::new(ClockWidth::MAX_BITS).unwrap();
        let top = width.modulus() - 10;
        let mut clock = RolloverClock::new(Some(width));
        clock.advance(top);
        for turn in 1..=5 {
            // 10 ticks to the wrap, 20 past it
            assert_eq!(clock.advance(20).delta, Some(30));
            assert_eq!(clock.advance(top).delta, Some(width.modulus() - 30));
            assert_eq!(clock.rollovers(), turn);
        }
    }

    #[test]
    fn test_unbounded_clock() {
        let mut clock = RolloverClock::new(None);
        clock.advance(5_000_000_000);
        let reading = clock.advance(5_000_000_100);
        assert_eq!(reading.clock, 5_000_000_100);
        assert_eq!(reading.delta, Some(100));
        assert_eq!(clock.rollovers(), 0);
    }
}
