//! `crossway-map` – HD-map lookups the stop-sign scenario depends on.
//!
//! The scenario never walks map topology itself; it asks a [`MapService`]
//! for a lane by id and interpolates a point on that lane at an arc length.
//!
//! # Modules
//!
//! - [`lane`] – [`LaneInfo`][lane::LaneInfo]: a lane centerline polyline
//!   with cumulative arc length and [`interpolate`][lane::LaneInfo::interpolate].
//! - [`overlap`] – [`OverlapInfo`][overlap::OverlapInfo]: where a map object
//!   such as a stop sign crosses one or more lanes.
//! - [`hdmap`] – the [`MapService`][hdmap::MapService] contract and the
//!   in-memory [`HdMap`][hdmap::HdMap] implementation.

pub mod hdmap;
pub mod lane;
pub mod overlap;

pub use hdmap::{HdMap, MapService};
pub use lane::LaneInfo;
pub use overlap::{LaneOverlapInfo, OverlapInfo};
