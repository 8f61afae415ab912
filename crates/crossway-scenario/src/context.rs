//! [`StopSignContext`] – per-scenario state of one stop-sign crossing.
//!
//! Owned exclusively by the scenario instance and threaded explicitly into
//! every stage tick. Created on scenario entry, dropped on exit.

use std::collections::HashMap;

use crossway_map::{MapService, OverlapInfo};
use crossway_types::{LaneId, ObstacleId, OverlapId, PlanningError};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::watch_registry::WatchVehicleRegistry;

/// A lane crossing the stop-sign intersection and the overlap that places its
/// stop line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociatedLane {
    pub lane_id: LaneId,
    pub overlap: OverlapInfo,
}

/// Associated lanes in their original order, indexed by lane id.
#[derive(Debug, Clone, Default)]
pub struct AssociatedLanes {
    lanes: Vec<AssociatedLane>,
    by_id: HashMap<LaneId, usize>,
}

impl AssociatedLanes {
    /// Build the index. When a lane id repeats, the first entry wins.
    pub fn new(lanes: Vec<AssociatedLane>) -> Self {
        let mut by_id = HashMap::with_capacity(lanes.len());
        for (i, lane) in lanes.iter().enumerate() {
            if by_id.contains_key(&lane.lane_id) {
                warn!(lane_id = %lane.lane_id, "duplicate associated lane ignored");
                continue;
            }
            by_id.insert(lane.lane_id.clone(), i);
        }
        Self { lanes, by_id }
    }

    pub fn get(&self, lane_id: &str) -> Option<&AssociatedLane> {
        self.by_id.get(lane_id).map(|&i| &self.lanes[i])
    }

    pub fn contains(&self, lane_id: &str) -> bool {
        self.by_id.contains_key(lane_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssociatedLane> {
        self.lanes.iter()
    }

    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }
}

/// Mutable scenario state shared by the stop-sign stages.
#[derive(Debug, Clone)]
pub struct StopSignContext {
    stop_sign_id: OverlapId,
    stop_start_time: Option<f64>,
    associated_lanes: AssociatedLanes,
    watch_vehicles: WatchVehicleRegistry,
    stop_done_overlap_id: Option<OverlapId>,
}

impl StopSignContext {
    pub fn new(stop_sign_id: impl Into<OverlapId>, associated_lanes: Vec<AssociatedLane>) -> Self {
        Self {
            stop_sign_id: stop_sign_id.into(),
            stop_start_time: None,
            associated_lanes: AssociatedLanes::new(associated_lanes),
            watch_vehicles: WatchVehicleRegistry::new(),
            stop_done_overlap_id: None,
        }
    }

    /// Build a context by resolving `(lane_id, overlap_id)` pairs in `map`.
    ///
    /// Unlike per-tick lookups, a miss here is an error: the scenario cannot
    /// start without knowing where each associated stop line is.
    pub fn from_map<'a>(
        stop_sign_id: impl Into<OverlapId>,
        lanes: impl IntoIterator<Item = (&'a str, &'a str)>,
        map: &dyn MapService,
    ) -> Result<Self, PlanningError> {
        let mut associated = Vec::new();
        for (lane_id, overlap_id) in lanes {
            let overlap = map.overlap(overlap_id).ok_or_else(|| {
                PlanningError::Map(format!("overlap {overlap_id} for lane {lane_id} not found"))
            })?;
            associated.push(AssociatedLane {
                lane_id: lane_id.to_string(),
                overlap: overlap.clone(),
            });
        }
        Ok(Self::new(stop_sign_id, associated))
    }

    pub fn stop_sign_id(&self) -> &str {
        &self.stop_sign_id
    }

    pub fn associated_lanes(&self) -> &AssociatedLanes {
        &self.associated_lanes
    }

    /// Start watching `obstacle_id` on an associated lane.
    pub fn watch(
        &mut self,
        lane_id: &str,
        obstacle_id: impl Into<ObstacleId>,
    ) -> Result<(), PlanningError> {
        if !self.associated_lanes.contains(lane_id) {
            return Err(PlanningError::InvalidContext(format!(
                "lane {lane_id} is not associated with stop sign {}",
                self.stop_sign_id
            )));
        }
        self.watch_vehicles.insert(lane_id, obstacle_id);
        Ok(())
    }

    pub fn watch_vehicles(&self) -> &WatchVehicleRegistry {
        &self.watch_vehicles
    }

    /// Split borrow used by clearance: the lane index read-only, the registry
    /// mutable.
    pub fn lanes_and_watch_vehicles_mut(&mut self) -> (&AssociatedLanes, &mut WatchVehicleRegistry) {
        (&self.associated_lanes, &mut self.watch_vehicles)
    }

    pub fn stop_start_time(&self) -> Option<f64> {
        self.stop_start_time
    }

    /// Record when the wait at the stop line began. Only the first call of a
    /// scenario has an effect.
    pub fn mark_stop_start(&mut self, now: f64) -> bool {
        if self.stop_start_time.is_some() {
            return false;
        }
        self.stop_start_time = Some(now);
        true
    }

    pub fn stop_done_overlap_id(&self) -> Option<&str> {
        self.stop_done_overlap_id.as_deref()
    }

    /// Publish that this stop sign has been handled.
    pub fn record_stop_done(&mut self) {
        self.stop_done_overlap_id = Some(self.stop_sign_id.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossway_map::{HdMap, LaneOverlapInfo};

    fn overlap(lane_id: &str, end_s: f64) -> OverlapInfo {
        OverlapInfo::new(
            "stop_sign_1",
            vec![LaneOverlapInfo {
                lane_id: lane_id.to_string(),
                start_s: end_s - 1.0,
                end_s,
            }],
        )
    }

    fn associated(lane_id: &str, end_s: f64) -> AssociatedLane {
        AssociatedLane {
            lane_id: lane_id.to_string(),
            overlap: overlap(lane_id, end_s),
        }
    }

    #[test]
    fn index_resolves_by_lane_id() {
        let lanes = AssociatedLanes::new(vec![associated("lane_A", 10.0), associated("lane_B", 20.0)]);
        assert_eq!(lanes.len(), 2);
        let b = lanes.get("lane_B").unwrap();
        assert_eq!(b.overlap.stop_line_end_s("lane_B"), Some(20.0));
        assert!(lanes.get("lane_C").is_none());
    }

    #[test]
    fn duplicate_lane_keeps_first_entry() {
        let lanes = AssociatedLanes::new(vec![associated("lane_A", 10.0), associated("lane_A", 99.0)]);
        let a = lanes.get("lane_A").unwrap();
        assert_eq!(a.overlap.stop_line_end_s("lane_A"), Some(10.0));
    }

    #[test]
    fn watch_rejects_unassociated_lane() {
        let mut ctx = StopSignContext::new("stop_sign_1", vec![associated("lane_A", 10.0)]);
        assert!(ctx.watch("lane_A", "v1").is_ok());
        assert!(matches!(
            ctx.watch("lane_Z", "v2"),
            Err(PlanningError::InvalidContext(_))
        ));
        assert_eq!(ctx.watch_vehicles().watched_ids(), vec!["v1".to_string()]);
    }

    #[test]
    fn stop_start_time_is_set_once() {
        let mut ctx = StopSignContext::new("stop_sign_1", vec![]);
        assert!(ctx.stop_start_time().is_none());
        assert!(ctx.mark_stop_start(4.0));
        assert!(!ctx.mark_stop_start(9.0));
        assert_eq!(ctx.stop_start_time(), Some(4.0));
    }

    #[test]
    fn record_stop_done_publishes_stop_sign_id() {
        let mut ctx = StopSignContext::new("stop_sign_1", vec![]);
        assert!(ctx.stop_done_overlap_id().is_none());
        ctx.record_stop_done();
        assert_eq!(ctx.stop_done_overlap_id(), Some("stop_sign_1"));
    }

    #[test]
    fn from_map_resolves_overlaps() {
        let mut map = HdMap::new();
        map.insert_overlap(overlap("lane_A", 10.0)).unwrap();

        let ctx = StopSignContext::from_map("stop_sign_1", [("lane_A", "stop_sign_1")], &map).unwrap();
        assert!(ctx.associated_lanes().contains("lane_A"));

        let missing = StopSignContext::from_map("stop_sign_1", [("lane_A", "nope")], &map);
        assert!(matches!(missing, Err(PlanningError::Map(_))));
    }
}
