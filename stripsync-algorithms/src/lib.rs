//! stripsync-algorithms: Event and run level algorithms for strip detectors.
//!
//! This crate provides:
//! - **Strip clustering** - contiguous signal strips per detector unit
//! - **Event summaries** - cluster multiplicities per view and per unit
//! - **Occupancy** - per-channel hit rates and hot-channel flagging
//! - **Correlation** - 2D histograms of aligned per-event quantities
//!
#![warn(missing_docs)]

pub mod clustering;
mod correlation;
mod occupancy;
mod summary;

pub use clustering::{
    cluster_strips, ClusterCounts, ClusteringStatistics, StripCluster, StripClusterer,
};
pub use correlation::{Axis, AxisBin, Histogram2D};
pub use occupancy::{
    accumulate_occupancy, accumulate_occupancy_batched, HotChannel, HotChannelMap,
    OccupancyAccumulator, OccupancyConfig,
};
pub use summary::{EventClusterer, EventClusters, EventSummary};
