//! [`ReplayRunner`] – feeds a recorded [`ReplayLog`] through the scenario.
//!
//! Each frame of the log is one planning tick. A [`ManualClock`] is advanced
//! by `tick_period` between ticks, so a replay is deterministic and runs as
//! fast as the machine allows unless `realtime` pacing is requested.
//!
//! CRUISE_AND_MONITOR, CREEP and INTERSECTION_CRUISE are decided by other
//! subsystems that a replay does not have; the runner installs
//! [`DelegatedStage::pass_through`] for each of them.
//!
//! # Log format
//!
//! ```json
//! {
//!   "tick_period": 0.1,
//!   "map": { "lanes": [...], "overlaps": [...] },
//!   "context": {
//!     "stop_sign_id": "ss_1",
//!     "associated_lanes": [{ "lane_id": "lane_A", "overlap_id": "ss_1" }],
//!     "watch_vehicles": { "lane_A": ["v1"] }
//!   },
//!   "frames": [{ "sequence_num": 0, "obstacles": [...] }]
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossway_map::HdMap;
use crossway_scenario::{
    Clock, DelegatedStage, ManualClock, ScenarioConfig, ScenarioStageMachine, StopSignContext,
    TaskFactory,
};
use crossway_types::{
    Frame, LaneId, ObstacleId, OverlapId, PlanningError, ScenarioStage, ScenarioStatus,
    TrajectoryPoint,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::stall_guard::StallGuard;

/// Consecutive unchanged STOP ticks reported as a stall by default.
pub const DEFAULT_STALL_THRESHOLD: usize = 50;

fn default_tick_period() -> f64 {
    0.1
}

// ────────────────────────────────────────────────────────────────────────────
// Log
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociatedLaneRecord {
    pub lane_id: LaneId,
    pub overlap_id: OverlapId,
}

/// Initial scenario state as recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextRecord {
    pub stop_sign_id: OverlapId,
    pub associated_lanes: Vec<AssociatedLaneRecord>,
    #[serde(default)]
    pub watch_vehicles: BTreeMap<LaneId, Vec<ObstacleId>>,
    /// Set when the recording starts mid-wait.
    #[serde(default)]
    pub stop_start_time: Option<f64>,
}

/// A recorded stop-sign approach.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayLog {
    #[serde(default = "default_tick_period")]
    pub tick_period: f64,
    /// Clock reading at the first frame.
    #[serde(default)]
    pub start_time: f64,
    pub map: HdMap,
    pub context: ContextRecord,
    #[serde(default)]
    pub planning_init_point: TrajectoryPoint,
    pub frames: Vec<Frame>,
}

impl ReplayLog {
    pub fn from_json_str(raw: &str) -> Result<Self, PlanningError> {
        let log: ReplayLog = serde_json::from_str(raw)
            .map_err(|e| PlanningError::Config(format!("Failed to parse replay log: {e}")))?;
        log.validate()?;
        Ok(log)
    }

    pub fn load(path: &Path) -> Result<Self, PlanningError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            PlanningError::Config(format!("Failed to read replay log at {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&raw)
    }

    fn validate(&self) -> Result<(), PlanningError> {
        if !self.tick_period.is_finite() || self.tick_period <= 0.0 {
            return Err(PlanningError::Config(format!(
                "tick_period must be a positive number, got {}",
                self.tick_period
            )));
        }
        if !self.start_time.is_finite() {
            return Err(PlanningError::Config("start_time must be finite".to_string()));
        }
        Ok(())
    }

    /// Resolve the recorded lanes against the map and seed the watch list.
    pub fn build_context(&self) -> Result<StopSignContext, PlanningError> {
        let lanes = self
            .context
            .associated_lanes
            .iter()
            .map(|l| (l.lane_id.as_str(), l.overlap_id.as_str()));
        let mut context =
            StopSignContext::from_map(self.context.stop_sign_id.clone(), lanes, &self.map)?;
        for (lane_id, ids) in &self.context.watch_vehicles {
            for id in ids {
                context.watch(lane_id, id.clone())?;
            }
        }
        if let Some(t) = self.context.stop_start_time {
            context.mark_stop_start(t);
        }
        Ok(context)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Summary
// ────────────────────────────────────────────────────────────────────────────

/// Outcome of one tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickRecord {
    pub sequence_num: u64,
    pub time: f64,
    pub stage_before: ScenarioStage,
    pub stage_after: ScenarioStage,
    pub status: Option<ScenarioStatus>,
    pub error: Option<PlanningError>,
    /// Flattened watch list after the tick.
    pub watched: Vec<ObstacleId>,
}

/// A STOP sojourn that stopped making progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StallReport {
    pub sequence_num: u64,
    pub time: f64,
    pub watched: Vec<ObstacleId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaySummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub tick_period: f64,
    pub ticks: Vec<TickRecord>,
    pub final_stage: ScenarioStage,
    pub final_status: ScenarioStatus,
    pub stop_done_overlap_id: Option<OverlapId>,
    pub stalls: Vec<StallReport>,
    /// True when the run was stopped before the log ran out.
    pub interrupted: bool,
}

impl ReplaySummary {
    pub fn error_count(&self) -> usize {
        self.ticks.iter().filter(|t| t.error.is_some()).count()
    }

    /// The first tick that ended in `stage`, if any.
    pub fn first_tick_in(&self, stage: ScenarioStage) -> Option<&TickRecord> {
        self.ticks.iter().find(|t| t.stage_after == stage)
    }

    pub fn to_json_pretty(&self) -> Result<String, PlanningError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PlanningError::Config(format!("Failed to render summary: {e}")))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Runner
// ────────────────────────────────────────────────────────────────────────────

pub struct ReplayRunner {
    config: ScenarioConfig,
    factory: TaskFactory,
    stall_threshold: usize,
}

impl ReplayRunner {
    pub fn new(config: ScenarioConfig, factory: TaskFactory) -> Self {
        Self {
            config,
            factory,
            stall_threshold: DEFAULT_STALL_THRESHOLD,
        }
    }

    pub fn with_stall_threshold(mut self, threshold: usize) -> Self {
        self.stall_threshold = threshold;
        self
    }

    /// Replay `log` as fast as possible.
    pub fn run(self, log: ReplayLog) -> Result<ReplaySummary, PlanningError> {
        self.run_with(log, &AtomicBool::new(false), false)
    }

    /// Replay `log`, checking `shutdown` before every tick.
    ///
    /// With `realtime` set the runner sleeps `tick_period` between ticks.
    /// Errors building the scenario are returned; per-tick errors are
    /// recorded in the summary and the replay continues.
    pub fn run_with(
        self,
        log: ReplayLog,
        shutdown: &AtomicBool,
        realtime: bool,
    ) -> Result<ReplaySummary, PlanningError> {
        let context = log.build_context()?;
        let ReplayLog {
            tick_period,
            start_time,
            map,
            planning_init_point,
            frames,
            ..
        } = log;

        let clock = ManualClock::new(start_time);
        let mut machine = ScenarioStageMachine::new(
            self.config,
            self.factory,
            context,
            Arc::new(map),
            Box::new(clock.clone()),
        )
        .with_stage(Box::new(DelegatedStage::pass_through(ScenarioStage::CruiseAndMonitor)))
        .with_stage(Box::new(DelegatedStage::pass_through(ScenarioStage::Creep)))
        .with_stage(Box::new(DelegatedStage::pass_through(ScenarioStage::IntersectionCruise)));
        machine.init()?;

        let started_at = Utc::now();
        info!(run_id = %machine.run_id(), frames = frames.len(), tick_period, "replay started");

        let mut guard = StallGuard::new(self.stall_threshold);
        let mut was_stalled = false;
        let mut ticks = Vec::with_capacity(frames.len());
        let mut stalls = Vec::new();
        let mut interrupted = false;

        for (i, mut frame) in frames.into_iter().enumerate() {
            if shutdown.load(Ordering::SeqCst) {
                warn!(sequence_num = frame.sequence_num, "replay interrupted");
                interrupted = true;
                break;
            }
            if i > 0 {
                clock.advance(tick_period);
                if realtime {
                    std::thread::sleep(Duration::from_secs_f64(tick_period));
                }
            }

            let time = clock.now();
            let stage_before = machine.current_stage();
            let result = machine.process(&planning_init_point, &mut frame);
            let stage_after = machine.current_stage();
            let watched = machine.context().watch_vehicles().watched_ids();

            if stage_before == ScenarioStage::Stop && stage_after == ScenarioStage::Stop {
                let stalled = guard.record(&watched);
                if stalled && !was_stalled {
                    warn!(sequence_num = frame.sequence_num, time, watched = ?watched, "stop wait stalled");
                    stalls.push(StallReport {
                        sequence_num: frame.sequence_num,
                        time,
                        watched: watched.clone(),
                    });
                }
                was_stalled = stalled;
            } else {
                guard.reset();
                was_stalled = false;
            }

            let (status, error) = match result {
                Ok(status) => (Some(status), None),
                Err(e) => (None, Some(e)),
            };
            debug!(
                sequence_num = frame.sequence_num,
                time,
                from = %stage_before,
                to = %stage_after,
                "replay tick"
            );
            ticks.push(TickRecord {
                sequence_num: frame.sequence_num,
                time,
                stage_before,
                stage_after,
                status,
                error,
                watched,
            });

            if machine.status() == ScenarioStatus::Done {
                break;
            }
        }

        let summary = ReplaySummary {
            run_id: machine.run_id(),
            started_at,
            tick_period,
            ticks,
            final_stage: machine.current_stage(),
            final_status: machine.status(),
            stop_done_overlap_id: machine.context().stop_done_overlap_id().map(str::to_string),
            stalls,
            interrupted,
        };
        info!(
            run_id = %summary.run_id,
            ticks = summary.ticks.len(),
            final_stage = %summary.final_stage,
            errors = summary.error_count(),
            "replay finished"
        );
        Ok(summary)
    }
}
