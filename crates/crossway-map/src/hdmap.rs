//! [`MapService`] contract and the in-memory [`HdMap`].
//!
//! Lookups are synchronous reads against a snapshot; a miss is `None`, never
//! an error, because the map is not guaranteed to be complete every tick.

use std::collections::HashMap;

use crossway_types::{LaneId, OverlapId, PlanningError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::lane::LaneInfo;
use crate::overlap::OverlapInfo;

/// Read-only access to lanes and overlaps by id.
pub trait MapService {
    fn lane(&self, lane_id: &str) -> Option<&LaneInfo>;

    fn overlap(&self, overlap_id: &str) -> Option<&OverlapInfo>;
}

/// Serialized map: flat lists of lanes and overlaps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapRecord {
    #[serde(default)]
    pub lanes: Vec<LaneInfo>,
    #[serde(default)]
    pub overlaps: Vec<OverlapInfo>,
}

/// An in-memory map indexed by id.
///
/// # Example
///
/// ```
/// use crossway_map::{HdMap, LaneInfo, MapService};
/// use crossway_types::Point3;
///
/// let mut map = HdMap::new();
/// map.insert_lane(
///     LaneInfo::new("lane_A", vec![Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 30.0, 0.0)])
///         .unwrap(),
/// )
/// .unwrap();
///
/// assert!(map.lane("lane_A").is_some());
/// assert!(map.lane("lane_Z").is_none());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "MapRecord", into = "MapRecord")]
pub struct HdMap {
    lanes: HashMap<LaneId, LaneInfo>,
    overlaps: HashMap<OverlapId, OverlapInfo>,
}

impl HdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a lane. Duplicate ids are rejected.
    pub fn insert_lane(&mut self, lane: LaneInfo) -> Result<(), PlanningError> {
        if self.lanes.contains_key(lane.id()) {
            return Err(PlanningError::Map(format!("duplicate lane id {}", lane.id())));
        }
        debug!(lane_id = %lane.id(), length = lane.length(), "lane added to map");
        self.lanes.insert(lane.id().to_string(), lane);
        Ok(())
    }

    /// Add an overlap. Duplicate ids are rejected.
    pub fn insert_overlap(&mut self, overlap: OverlapInfo) -> Result<(), PlanningError> {
        if self.overlaps.contains_key(&overlap.id) {
            return Err(PlanningError::Map(format!("duplicate overlap id {}", overlap.id)));
        }
        self.overlaps.insert(overlap.id.clone(), overlap);
        Ok(())
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }
}

impl MapService for HdMap {
    fn lane(&self, lane_id: &str) -> Option<&LaneInfo> {
        self.lanes.get(lane_id)
    }

    fn overlap(&self, overlap_id: &str) -> Option<&OverlapInfo> {
        self.overlaps.get(overlap_id)
    }
}

impl TryFrom<MapRecord> for HdMap {
    type Error = PlanningError;

    fn try_from(record: MapRecord) -> Result<Self, Self::Error> {
        let mut map = HdMap::new();
        for lane in record.lanes {
            map.insert_lane(lane)?;
        }
        for overlap in record.overlaps {
            map.insert_overlap(overlap)?;
        }
        Ok(map)
    }
}

impl From<HdMap> for MapRecord {
    fn from(map: HdMap) -> Self {
        let mut lanes: Vec<LaneInfo> = map.lanes.into_values().collect();
        lanes.sort_by(|a, b| a.id().cmp(b.id()));
        let mut overlaps: Vec<OverlapInfo> = map.overlaps.into_values().collect();
        overlaps.sort_by(|a, b| a.id.cmp(&b.id));
        MapRecord { lanes, overlaps }
    }
}
