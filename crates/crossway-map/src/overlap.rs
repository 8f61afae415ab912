//! Overlap metadata: where a map object (a stop sign) crosses lanes.

use crossway_types::{LaneId, OverlapId};
use serde::{Deserialize, Serialize};

/// The arc-length span a single lane shares with an overlap object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneOverlapInfo {
    pub lane_id: LaneId,
    pub start_s: f64,
    pub end_s: f64,
}

/// An overlap object and the lanes it touches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlapInfo {
    pub id: OverlapId,
    #[serde(default)]
    pub lanes: Vec<LaneOverlapInfo>,
}

impl OverlapInfo {
    pub fn new(id: impl Into<OverlapId>, lanes: Vec<LaneOverlapInfo>) -> Self {
        Self {
            id: id.into(),
            lanes,
        }
    }

    /// The span this overlap covers on `lane_id`, if any.
    pub fn lane_overlap(&self, lane_id: &str) -> Option<&LaneOverlapInfo> {
        self.lanes.iter().find(|l| l.lane_id == lane_id)
    }

    /// Arc length on `lane_id` where the stop line ends.
    pub fn stop_line_end_s(&self, lane_id: &str) -> Option<f64> {
        self.lane_overlap(lane_id).map(|l| l.end_s)
    }
}
