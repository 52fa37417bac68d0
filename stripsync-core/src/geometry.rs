//! Detector geometry: channel identities, detector units and views.

use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of detector units in the default geometry.
pub const DEFAULT_UNITS: usize = 16;

/// Number of readout channels in the default geometry.
pub const DEFAULT_CHANNELS: usize = 4096;

/// Readout channel identity as reported by the DAQ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Channel {
    /// Detector layer number (0 marks an unmapped channel).
    pub layer: u16,
    /// Tile within the layer.
    pub tile: u16,
    /// Strip within the tile.
    pub strip: u16,
}

impl Channel {
    /// Creates a new channel identity.
    #[inline]
    #[must_use]
    pub fn new(layer: u16, tile: u16, strip: u16) -> Self {
        Self { layer, tile, strip }
    }
}

/// Dense indices of a channel validated against a geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelIndex {
    /// Detector unit index (tile + tiles-per-layer * layer offset).
    pub unit: usize,
    /// Flat channel index (strip + strips-per-unit * unit).
    pub flat: usize,
}

/// Geometric projection measured by a detector unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum View {
    /// Strips measuring the azimuthal coordinate.
    Phi,
    /// Strips measuring the beam-axis coordinate.
    Z,
}

/// Detector layout used to map channel identities to dense indices.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DetectorGeometry {
    /// Layer number of the first (phi) layer.
    pub first_layer: u16,
    /// Number of layers.
    pub layers: u16,
    /// Tiles in each layer.
    pub tiles_per_layer: u16,
    /// Strips read out per detector unit.
    pub strips_per_unit: u16,
}

impl Default for DetectorGeometry {
    fn default() -> Self {
        Self {
            first_layer: 55,
            layers: 2,
            tiles_per_layer: 8,
            strips_per_unit: 256,
        }
    }
}

impl DetectorGeometry {
    /// Total number of detector units.
    #[must_use]
    pub fn units(&self) -> usize {
        usize::from(self.layers) * usize::from(self.tiles_per_layer)
    }

    /// Total number of flat channels.
    #[must_use]
    pub fn channels(&self) -> usize {
        self.units() * usize::from(self.strips_per_unit)
    }

    /// Checks that the geometry describes at least one channel.
    ///
    /// # Errors
    /// Returns `ConfigError` if any dimension is zero.
    pub fn validate(&self) -> Result<()> {
        if self.layers == 0 || self.tiles_per_layer == 0 || self.strips_per_unit == 0 {
            return Err(Error::ConfigError(format!(
                "geometry must have non-zero dimensions, got {} layers x {} tiles x {} strips",
                self.layers, self.tiles_per_layer, self.strips_per_unit
            )));
        }
        Ok(())
    }

    /// Maps a channel to its detector unit and flat index.
    ///
    /// # Errors
    /// Returns `InvalidChannel` when the channel lies outside the geometry.
    pub fn locate(&self, channel: Channel) -> Result<ChannelIndex> {
        let invalid = Error::InvalidChannel {
            layer: channel.layer,
            tile: channel.tile,
            strip: channel.strip,
        };

        if channel.layer == 0
            || channel.layer < self.first_layer
            || channel.layer - self.first_layer >= self.layers
            || channel.tile >= self.tiles_per_layer
            || channel.strip >= self.strips_per_unit
        {
            return Err(invalid);
        }

        let unit = usize::from(channel.tile)
            + usize::from(self.tiles_per_layer) * usize::from(channel.layer - self.first_layer);
        let flat = usize::from(channel.strip) + usize::from(self.strips_per_unit) * unit;
        Ok(ChannelIndex { unit, flat })
    }

    /// Inverse of [`DetectorGeometry::locate`] for a flat channel index.
    #[must_use]
    pub fn channel(&self, flat: usize) -> Option<Channel> {
        if flat >= self.channels() {
            return None;
        }
        let strips = usize::from(self.strips_per_unit);
        let tiles = usize::from(self.tiles_per_layer);
        let unit = flat / strips;
        let strip = u16::try_from(flat % strips).ok()?;
        let tile = u16::try_from(unit % tiles).ok()?;
        let layer = self.first_layer + u16::try_from(unit / tiles).ok()?;
        Some(Channel::new(layer, tile, strip))
    }

    /// View of a detector unit: the first layer measures phi, the others z.
    #[must_use]
    pub fn view(&self, unit: usize) -> View {
        if unit < usize::from(self.tiles_per_layer) {
            View::Phi
        } else {
            View::Z
        }
    }
}
