//! Fixed-binning 2D histogram used to accumulate correlated per-event quantities.

use stripsync_core::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Uniform binning over `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Axis {
    /// Number of bins.
    pub bins: usize,
    /// Lower edge of the first bin.
    pub min: f64,
    /// Upper edge of the last bin.
    pub max: f64,
}

/// Position of a value relative to an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisBin {
    /// Below the first bin (or NaN).
    Underflow,
    /// Inside bin `i`.
    Bin(usize),
    /// At or above the upper edge.
    Overflow,
}

impl Axis {
    /// Creates an axis.
    ///
    /// # Errors
    /// Returns `ConfigError` for zero bins or an empty range.
    pub fn new(bins: usize, min: f64, max: f64) -> Result<Self> {
        if bins == 0 || !min.is_finite() || !max.is_finite() || max <= min {
            return Err(Error::ConfigError(format!(
                "invalid axis: {bins} bins over [{min}, {max})"
            )));
        }
        Ok(Self { bins, min, max })
    }

    /// Width of one bin.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.bins as f64
    }

    /// Locates a value on the axis.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn find(&self, value: f64) -> AxisBin {
        if value.is_nan() || value < self.min {
            return AxisBin::Underflow;
        }
        if value >= self.max {
            return AxisBin::Overflow;
        }
        let bin = ((value - self.min) / self.bin_width()) as usize;
        AxisBin::Bin(bin.min(self.bins - 1))
    }

    /// Lower and upper edges of bin `i`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn edges(&self, bin: usize) -> (f64, f64) {
        let width = self.bin_width();
        (
            self.min + width * bin as f64,
            self.min + width * (bin + 1) as f64,
        )
    }
}

/// Joint distribution of two per-event quantities.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram2D {
    x: Axis,
    y: Axis,
    counts: Vec<u64>,
    entries: u64,
    outside: u64,
}

impl Histogram2D {
    /// Creates an empty histogram.
    #[must_use]
    pub fn new(x: Axis, y: Axis) -> Self {
        Self {
            x,
            y,
            counts: vec![0; x.bins * y.bins],
            entries: 0,
            outside: 0,
        }
    }

    /// X axis.
    #[must_use]
    pub fn x_axis(&self) -> &Axis {
        &self.x
    }

    /// Y axis.
    #[must_use]
    pub fn y_axis(&self) -> &Axis {
        &self.y
    }

    /// Adds one (x, y) entry. Entries outside either axis count as under/overflow.
    pub fn fill(&mut self, x: f64, y: f64) {
        self.entries += 1;
        match (self.x.find(x), self.y.find(y)) {
            (AxisBin::Bin(ix), AxisBin::Bin(iy)) => {
                self.counts[iy * self.x.bins + ix] += 1;
            }
            _ => self.outside += 1,
        }
    }

    /// Content of bin (ix, iy); zero outside the axes.
    #[must_use]
    pub fn count(&self, ix: usize, iy: usize) -> u64 {
        if ix >= self.x.bins || iy >= self.y.bins {
            return 0;
        }
        self.counts[iy * self.x.bins + ix]
    }

    /// Total number of fills.
    #[must_use]
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Fills that landed outside the axes.
    #[must_use]
    pub fn outside(&self) -> u64 {
        self.outside
    }

    /// Non-empty bins as `(ix, iy, count)`, x fastest.
    pub fn filled_bins(&self) -> impl Iterator<Item = (usize, usize, u64)> + '_ {
        let width = self.x.bins;
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, &count)| count > 0)
            .map(move |(index, &count)| (index % width, index / width, count))
    }
}
