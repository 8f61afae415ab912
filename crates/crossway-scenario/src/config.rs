//! Scenario configuration – reads `stop_sign.toml`-style files.
//!
//! ```toml
//! stop_duration = 1.0
//! wait_timeout = 8.0
//! clearance_threshold = 10.0
//! initial_stage = "cruise_and_monitor"
//!
//! [stages.creep]
//! tasks = ["decider_creep", "dp_poly_path_optimizer"]
//! ```
//!
//! Missing fields fall back to their defaults; `CROSSWAY_*` environment
//! variables override the numeric fields after parsing.

use std::fs;
use std::path::Path;

use crossway_types::{PlanningError, ScenarioStage};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::task::TaskKind;

/// Tunables of the unprotected stop-sign scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScenarioConfig {
    /// Minimum time (seconds) the vehicle dwells at the stop line before it
    /// may creep with an empty watch list.
    #[serde(default = "default_stop_duration")]
    pub stop_duration: f64,

    /// Seconds after which a wait-timeout policy may release the stop.
    /// Inert unless a policy is installed on the stop stage.
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout: f64,

    /// Distance (metres) from a lane's stop line beyond which a watched
    /// obstacle no longer contends for right of way.
    #[serde(default = "default_clearance_threshold")]
    pub clearance_threshold: f64,

    /// Stage the scenario starts in.
    #[serde(default = "default_initial_stage")]
    pub initial_stage: ScenarioStage,

    /// Ordered task lists per stage.
    #[serde(default)]
    pub stages: StageTaskConfig,
}

/// Task list of one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StageTasks {
    #[serde(default)]
    pub tasks: Vec<TaskKind>,
}

/// Task lists keyed by stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StageTaskConfig {
    #[serde(default = "default_lane_follow_tasks")]
    pub cruise_and_monitor: StageTasks,
    #[serde(default = "default_lane_follow_tasks")]
    pub stop: StageTasks,
    #[serde(default = "default_creep_tasks")]
    pub creep: StageTasks,
    #[serde(default = "default_lane_follow_tasks")]
    pub intersection_cruise: StageTasks,
}

impl StageTaskConfig {
    pub fn tasks_for(&self, stage: ScenarioStage) -> &[TaskKind] {
        let entry = match stage {
            ScenarioStage::CruiseAndMonitor => &self.cruise_and_monitor,
            ScenarioStage::Stop => &self.stop,
            ScenarioStage::Creep => &self.creep,
            ScenarioStage::IntersectionCruise => &self.intersection_cruise,
        };
        &entry.tasks
    }
}

impl Default for StageTaskConfig {
    fn default() -> Self {
        Self {
            cruise_and_monitor: default_lane_follow_tasks(),
            stop: default_lane_follow_tasks(),
            creep: default_creep_tasks(),
            intersection_cruise: default_lane_follow_tasks(),
        }
    }
}

fn default_stop_duration() -> f64 {
    1.0
}
fn default_wait_timeout() -> f64 {
    8.0
}
fn default_clearance_threshold() -> f64 {
    10.0
}
fn default_initial_stage() -> ScenarioStage {
    ScenarioStage::CruiseAndMonitor
}
fn default_lane_follow_tasks() -> StageTasks {
    StageTasks {
        tasks: vec![
            TaskKind::DpPolyPathOptimizer,
            TaskKind::PathDecider,
            TaskKind::DpStSpeedOptimizer,
            TaskKind::SpeedDecider,
            TaskKind::QpSplineStSpeedOptimizer,
        ],
    }
}
fn default_creep_tasks() -> StageTasks {
    let mut tasks = vec![TaskKind::DeciderCreep];
    tasks.extend(default_lane_follow_tasks().tasks);
    StageTasks { tasks }
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            stop_duration: default_stop_duration(),
            wait_timeout: default_wait_timeout(),
            clearance_threshold: default_clearance_threshold(),
            initial_stage: default_initial_stage(),
            stages: StageTaskConfig::default(),
        }
    }
}

impl ScenarioConfig {
    /// Reject values no stage can work with.
    pub fn validate(&self) -> Result<(), PlanningError> {
        if !self.stop_duration.is_finite() || self.stop_duration < 0.0 {
            return Err(PlanningError::Config(format!(
                "stop_duration must be a finite value >= 0, got {}",
                self.stop_duration
            )));
        }
        if !self.wait_timeout.is_finite() || self.wait_timeout < 0.0 {
            return Err(PlanningError::Config(format!(
                "wait_timeout must be a finite value >= 0, got {}",
                self.wait_timeout
            )));
        }
        if !self.clearance_threshold.is_finite() || self.clearance_threshold <= 0.0 {
            return Err(PlanningError::Config(format!(
                "clearance_threshold must be a finite value > 0, got {}",
                self.clearance_threshold
            )));
        }
        Ok(())
    }
}

/// Parse a config from TOML text, apply env overrides and validate.
pub fn from_toml_str(raw: &str) -> Result<ScenarioConfig, PlanningError> {
    from_toml_str_with(raw, |key| std::env::var(key).ok())
}

pub(crate) fn from_toml_str_with(
    raw: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ScenarioConfig, PlanningError> {
    let mut cfg: ScenarioConfig =
        toml::from_str(raw).map_err(|e| PlanningError::Config(format!("Failed to parse config: {e}")))?;
    apply_overrides_from(&mut cfg, lookup);
    cfg.validate()?;
    Ok(cfg)
}

/// Load the config from `path`. Returns `None` if the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<ScenarioConfig>, PlanningError> {
    load_from_with(path, |key| std::env::var(key).ok())
}

pub(crate) fn load_from_with(
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<ScenarioConfig>, PlanningError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        PlanningError::Config(format!("Failed to read config at {}: {}", path.display(), e))
    })?;
    from_toml_str_with(&raw, lookup).map(Some)
}

/// Apply `CROSSWAY_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `CROSSWAY_STOP_DURATION` | `stop_duration` |
/// | `CROSSWAY_WAIT_TIMEOUT` | `wait_timeout` |
/// | `CROSSWAY_CLEARANCE_THRESHOLD` | `clearance_threshold` |
///
/// Values that do not parse as numbers are ignored.
pub fn apply_env_overrides(cfg: &mut ScenarioConfig) {
    apply_overrides_from(cfg, |key| std::env::var(key).ok());
}

pub(crate) fn apply_overrides_from(
    cfg: &mut ScenarioConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let number = |key: &str| lookup(key).and_then(|v| v.trim().parse::<f64>().ok());
    if let Some(v) = number("CROSSWAY_STOP_DURATION") {
        cfg.stop_duration = v;
    }
    if let Some(v) = number("CROSSWAY_WAIT_TIMEOUT") {
        cfg.wait_timeout = v;
    }
    if let Some(v) = number("CROSSWAY_CLEARANCE_THRESHOLD") {
        cfg.clearance_threshold = v;
    }
}

/// JSON Schema of [`ScenarioConfig`], pretty-printed.
pub fn json_schema() -> Result<String, PlanningError> {
    let schema = schemars::schema_for!(ScenarioConfig);
    serde_json::to_string_pretty(&schema)
        .map_err(|e| PlanningError::Config(format!("Failed to render schema: {e}")))
}
