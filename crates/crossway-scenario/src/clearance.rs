//! [`ObstacleClearanceEvaluator`] – prunes watched obstacles that have left
//! the stop line.
//!
//! For an obstacle that is both a right-of-way class and already watched, the
//! evaluator walks the lanes watching it. On each lane it interpolates the
//! stop-line point (the overlap's end `s` on that lane) and measures the
//! planar distance to the obstacle. The first lane on which the obstacle is
//! farther than the clearance threshold clears it from every lane list.
//!
//! Lanes that cannot be resolved (not associated, no overlap span, missing
//! from the map) are skipped; they never make the obstacle clear.

use crossway_map::MapService;
use crossway_types::{LaneId, ObstacleId, ObstacleView};
use tracing::{debug, warn};

use crate::context::AssociatedLanes;
use crate::watch_registry::WatchVehicleRegistry;

/// What a single evaluation decided.
#[derive(Debug, Clone, PartialEq)]
pub enum ClearanceOutcome {
    /// The obstacle's class never holds a watch slot.
    IgnoredType,
    /// The obstacle was not in the watched id snapshot.
    NotWatched,
    /// Still within the threshold of every resolvable stop line.
    Retained,
    /// Removed from every lane list.
    Cleared {
        lane_id: LaneId,
        distance: f64,
        removed: usize,
    },
}

/// Decides, per obstacle and tick, whether a watched obstacle is clear.
#[derive(Debug, Clone, Copy)]
pub struct ObstacleClearanceEvaluator {
    clearance_threshold: f64,
}

impl ObstacleClearanceEvaluator {
    pub fn new(clearance_threshold: f64) -> Self {
        Self {
            clearance_threshold,
        }
    }

    pub fn clearance_threshold(&self) -> f64 {
        self.clearance_threshold
    }

    /// Evaluate `obstacle` and prune it from `watch_vehicles` when clear.
    ///
    /// `watch_vehicle_ids` is the flattened snapshot taken before this tick's
    /// pruning started.
    pub fn evaluate(
        &self,
        obstacle: &ObstacleView,
        watch_vehicle_ids: &[ObstacleId],
        associated_lanes: &AssociatedLanes,
        map: &dyn MapService,
        watch_vehicles: &mut WatchVehicleRegistry,
    ) -> ClearanceOutcome {
        let obstacle_id = obstacle.id.as_str();

        if !obstacle.obstacle_type.contends_for_right_of_way() {
            debug!(obstacle_id, obstacle_type = %obstacle.obstacle_type, "skip: type never watched");
            return ClearanceOutcome::IgnoredType;
        }

        if !watch_vehicle_ids.iter().any(|id| id == obstacle_id) {
            debug!(obstacle_id, obstacle_type = %obstacle.obstacle_type, "skip: not being watched");
            return ClearanceOutcome::NotWatched;
        }

        for lane_id in watch_vehicles.lanes_watching(obstacle_id) {
            let Some(associated) = associated_lanes.get(&lane_id) else {
                debug!(obstacle_id, lane_id = %lane_id, "skip lane: not associated");
                continue;
            };
            let Some(stop_line_end_s) = associated.overlap.stop_line_end_s(&lane_id) else {
                warn!(
                    obstacle_id,
                    lane_id = %lane_id,
                    overlap_id = %associated.overlap.id,
                    "skip lane: no stop-line overlap info"
                );
                continue;
            };
            let Some(lane) = map.lane(&lane_id) else {
                debug!(obstacle_id, lane_id = %lane_id, "skip lane: not in map");
                continue;
            };

            let stop_line_point = lane.interpolate(stop_line_end_s);
            let distance = stop_line_point.distance_xy(&obstacle.position);
            debug!(obstacle_id, lane_id = %lane_id, distance, "distance to stop line");

            if distance > self.clearance_threshold {
                let removed = watch_vehicles.clear_obstacle_across_lanes(obstacle_id);
                debug!(obstacle_id, lane_id = %lane_id, distance, removed, "obstacle cleared");
                return ClearanceOutcome::Cleared {
                    lane_id,
                    distance,
                    removed,
                };
            }
        }

        ClearanceOutcome::Retained
    }
}

impl Default for ObstacleClearanceEvaluator {
    fn default() -> Self {
        Self::new(10.0)
    }
}
