//! [`WatchVehicleRegistry`] – obstacles contending for right of way, per lane.
//!
//! Keys are associated lane ids; values are the obstacle ids believed to be
//! approaching or occupying that lane near the stop sign. Lanes are kept in
//! id order so flattened listings are deterministic.
//!
//! # Example
//!
//! ```rust
//! use crossway_scenario::WatchVehicleRegistry;
//!
//! let mut registry = WatchVehicleRegistry::new();
//! registry.insert("lane_A", "v1");
//! registry.insert("lane_A", "v2");
//! registry.insert("lane_B", "v1");
//!
//! assert_eq!(registry.watched_ids(), vec!["v1", "v2", "v1"]);
//! assert_eq!(registry.clear_obstacle_across_lanes("v1"), 2);
//! assert_eq!(registry.watched_ids(), vec!["v2"]);
//! ```

use std::collections::BTreeMap;

use crossway_types::{LaneId, ObstacleId};
use serde::{Deserialize, Serialize};

/// Mapping from associated lane id to the obstacle ids watched on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatchVehicleRegistry {
    lanes: BTreeMap<LaneId, Vec<ObstacleId>>,
}

impl WatchVehicleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Watch `obstacle_id` on `lane_id`. Watching the same pair twice is a
    /// no-op. Returns `true` when the entry was added.
    pub fn insert(&mut self, lane_id: impl Into<LaneId>, obstacle_id: impl Into<ObstacleId>) -> bool {
        let obstacle_id = obstacle_id.into();
        let vehicles = self.lanes.entry(lane_id.into()).or_default();
        if vehicles.contains(&obstacle_id) {
            return false;
        }
        vehicles.push(obstacle_id);
        true
    }

    /// `true` when no lane is tracked at all.
    ///
    /// A lane whose list was emptied by clearance stays tracked; use
    /// [`watched_ids`][Self::watched_ids] to ask whether anyone is left.
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    /// Number of tracked lanes.
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Vehicles watched on `lane_id`.
    pub fn lane(&self, lane_id: &str) -> Option<&[ObstacleId]> {
        self.lanes.get(lane_id).map(Vec::as_slice)
    }

    /// All watched ids across lanes, lane by lane. An obstacle watched on two
    /// lanes appears twice.
    pub fn watched_ids(&self) -> Vec<ObstacleId> {
        self.lanes.values().flatten().cloned().collect()
    }

    /// Lanes whose list contains `obstacle_id`, in lane order.
    pub fn lanes_watching(&self, obstacle_id: &str) -> Vec<LaneId> {
        self.lanes
            .iter()
            .filter(|(_, vehicles)| vehicles.iter().any(|v| v == obstacle_id))
            .map(|(lane_id, _)| lane_id.clone())
            .collect()
    }

    /// Remove `obstacle_id` from every lane list (all occurrences).
    ///
    /// Lanes themselves stay tracked even when their list becomes empty.
    /// Returns the number of entries removed.
    pub fn clear_obstacle_across_lanes(&mut self, obstacle_id: &str) -> usize {
        let mut removed = 0;
        for vehicles in self.lanes.values_mut() {
            let before = vehicles.len();
            vehicles.retain(|v| v != obstacle_id);
            removed += before - vehicles.len();
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LaneId, &[ObstacleId])> {
        self.lanes.iter().map(|(lane, vehicles)| (lane, vehicles.as_slice()))
    }
}
