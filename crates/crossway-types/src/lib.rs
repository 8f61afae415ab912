//! `crossway-types` – shared vocabulary for the stop-sign scenario.
//!
//! Every other crate in the workspace speaks in these types: perceived
//! obstacles, planning frames, the scenario stage enum and the global
//! [`PlanningError`].

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a perceived obstacle (perception track id, stringified).
pub type ObstacleId = String;

/// Identifier of a map lane.
pub type LaneId = String;

/// Identifier of a map overlap (e.g. a stop sign).
pub type OverlapId = String;

// ────────────────────────────────────────────────────────────────────────────
// Geometry
// ────────────────────────────────────────────────────────────────────────────

/// A point in the map (ENU) frame, metres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Planar (XY) Euclidean distance; `z` is ignored.
    pub fn distance_xy(&self, other: &Point3) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Perception
// ────────────────────────────────────────────────────────────────────────────

/// Classified type of a perceived obstacle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObstacleType {
    Unknown,
    UnknownMovable,
    UnknownUnmovable,
    Pedestrian,
    Bicycle,
    Vehicle,
}

impl ObstacleType {
    /// Whether obstacles of this class can hold a watch slot at a stop sign.
    ///
    /// Pedestrians and static objects never contend for right of way here.
    pub fn contends_for_right_of_way(self) -> bool {
        matches!(
            self,
            ObstacleType::Unknown
                | ObstacleType::UnknownMovable
                | ObstacleType::Bicycle
                | ObstacleType::Vehicle
        )
    }
}

impl fmt::Display for ObstacleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObstacleType::Unknown => "UNKNOWN",
            ObstacleType::UnknownMovable => "UNKNOWN_MOVABLE",
            ObstacleType::UnknownUnmovable => "UNKNOWN_UNMOVABLE",
            ObstacleType::Pedestrian => "PEDESTRIAN",
            ObstacleType::Bicycle => "BICYCLE",
            ObstacleType::Vehicle => "VEHICLE",
        };
        f.write_str(name)
    }
}

/// One perceived obstacle as seen during a single planning tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObstacleView {
    pub id: ObstacleId,
    #[serde(rename = "type")]
    pub obstacle_type: ObstacleType,
    pub position: Point3,
}

impl ObstacleView {
    pub fn new(id: impl Into<ObstacleId>, obstacle_type: ObstacleType, position: Point3) -> Self {
        Self {
            id: id.into(),
            obstacle_type,
            position,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Planning frame
// ────────────────────────────────────────────────────────────────────────────

/// A point on the ego trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub x: f64,
    pub y: f64,
    /// Heading (radians, counter-clockwise from +X).
    #[serde(default)]
    pub theta: f64,
    /// Speed (m/s).
    #[serde(default)]
    pub v: f64,
    /// Acceleration (m/s²).
    #[serde(default)]
    pub a: f64,
    /// Time relative to the planning start (seconds).
    #[serde(default)]
    pub relative_time: f64,
}

/// Tick-scoped planning snapshot.
///
/// Obstacles are read-only input from perception; `trajectory` is filled by
/// whatever planning tasks the active stage runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Frame {
    pub sequence_num: u64,
    #[serde(default)]
    pub obstacles: Vec<ObstacleView>,
    #[serde(default)]
    pub trajectory: Vec<TrajectoryPoint>,
}

impl Frame {
    pub fn new(sequence_num: u64, obstacles: Vec<ObstacleView>) -> Self {
        Self {
            sequence_num,
            obstacles,
            trajectory: Vec::new(),
        }
    }

    /// Reject frames that no stage can reason about.
    pub fn validate(&self) -> Result<(), PlanningError> {
        if let Some(bad) = self.obstacles.iter().find(|o| !o.position.is_finite()) {
            return Err(PlanningError::InvalidFrame(format!(
                "frame {} obstacle {} has a non-finite position",
                self.sequence_num, bad.id
            )));
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scenario vocabulary
// ────────────────────────────────────────────────────────────────────────────

/// Stages of the unprotected stop-sign scenario, in driving order.
///
/// The derived ordering follows declaration order, so `a < b` means `a`
/// comes earlier in the scenario.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStage {
    CruiseAndMonitor,
    Stop,
    Creep,
    IntersectionCruise,
}

impl ScenarioStage {
    pub const ALL: [ScenarioStage; 4] = [
        ScenarioStage::CruiseAndMonitor,
        ScenarioStage::Stop,
        ScenarioStage::Creep,
        ScenarioStage::IntersectionCruise,
    ];

    /// The stage that normally follows this one, or `None` for the last.
    pub fn next(self) -> Option<ScenarioStage> {
        match self {
            ScenarioStage::CruiseAndMonitor => Some(ScenarioStage::Stop),
            ScenarioStage::Stop => Some(ScenarioStage::Creep),
            ScenarioStage::Creep => Some(ScenarioStage::IntersectionCruise),
            ScenarioStage::IntersectionCruise => None,
        }
    }
}

impl fmt::Display for ScenarioStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScenarioStage::CruiseAndMonitor => "CRUISE_AND_MONITOR",
            ScenarioStage::Stop => "STOP",
            ScenarioStage::Creep => "CREEP",
            ScenarioStage::IntersectionCruise => "INTERSECTION_CRUISE",
        };
        f.write_str(name)
    }
}

/// Result of a single stage tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageStatus {
    /// Stay in the current stage.
    Running,
    /// The stage is done. `next` names the stage to advance to; `None` ends
    /// the scenario.
    Finished { next: Option<ScenarioStage> },
}

/// Lifecycle of a scenario instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScenarioStatus {
    #[default]
    Unknown,
    Inited,
    Processing,
    Done,
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Workspace-wide error type.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlanningError {
    #[error("Task {task} failed: {reason}")]
    TaskFailed { task: String, reason: String },

    #[error("Invalid scenario context: {0}")]
    InvalidContext(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("No constructor registered for task {0}")]
    UnregisteredTask(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Map error: {0}")]
    Map(String),
}
