//! [`StopStage`] – wait at the stop line until nobody else holds right of way.
//!
//! Each tick the stage:
//!
//! 1. plans along the reference line (a failure is logged, not fatal);
//! 2. measures the wait since `stop_start_time`;
//! 3. finishes into CREEP when the dwell time has passed and no lane is
//!    watched;
//! 4. finishes into CREEP when the flattened watch list is empty, whatever
//!    the dwell time;
//! 5. otherwise runs the [`ObstacleClearanceEvaluator`] over every perceived
//!    obstacle and stays RUNNING.
//!
//! Finishing publishes the stop sign id as `stop_done_overlap_id`.
//!
//! # Example
//!
//! ```rust
//! use crossway_map::HdMap;
//! use crossway_scenario::{
//!     ManualClock, ScenarioConfig, Stage, StageContext, StopSignContext, StopStage, TaskPipeline,
//! };
//! use crossway_types::{Frame, ScenarioStage, StageStatus, TrajectoryPoint};
//!
//! let config = ScenarioConfig::default();
//! let map = HdMap::new();
//! let clock = ManualClock::new(0.0);
//! let mut tasks = TaskPipeline::default();
//! let mut scenario = StopSignContext::new("stop_sign_1", vec![]);
//! scenario.mark_stop_start(0.0);
//!
//! let mut ctx = StageContext {
//!     scenario: &mut scenario,
//!     config: &config,
//!     map: &map,
//!     clock: &clock,
//!     tasks: &mut tasks,
//! };
//! let mut stage = StopStage::new();
//! let status = stage
//!     .process(&TrajectoryPoint::default(), &mut Frame::new(1, vec![]), &mut ctx)
//!     .unwrap();
//!
//! // Nobody to watch: the stage is done immediately.
//! assert_eq!(status, StageStatus::Finished { next: Some(ScenarioStage::Creep) });
//! assert_eq!(scenario.stop_done_overlap_id(), Some("stop_sign_1"));
//! ```

use crossway_types::{
    Frame, ObstacleId, PlanningError, ScenarioStage, StageStatus, TrajectoryPoint,
};
use tracing::{debug, error, info};

use crate::clearance::{ClearanceOutcome, ObstacleClearanceEvaluator};
use crate::stage::{Stage, StageContext};

/// Hook for releasing the stop after a long wait while obstacles remain
/// watched.
///
/// No policy is installed by default and none ships with this crate: how
/// many remaining obstacles a timeout may override, and with what
/// confidence, is left to the integrator.
pub trait WaitTimeoutPolicy: Send {
    fn name(&self) -> &str;

    /// Return `true` to finish the stop despite `watch_vehicle_ids` being
    /// non-empty.
    fn should_release(
        &self,
        wait_time: f64,
        wait_timeout: f64,
        watch_vehicle_ids: &[ObstacleId],
    ) -> bool;
}

/// The STOP stage.
#[derive(Default)]
pub struct StopStage {
    timeout_policy: Option<Box<dyn WaitTimeoutPolicy>>,
    /// Largest wait observed in the current sojourn.
    last_wait_time: f64,
}

impl StopStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a wait-timeout policy, consulted after the empty-watch-list
    /// check.
    pub fn with_timeout_policy(mut self, policy: Box<dyn WaitTimeoutPolicy>) -> Self {
        self.timeout_policy = Some(policy);
        self
    }

    /// Elapsed wait, never negative and never smaller than an earlier tick's.
    fn wait_time(&mut self, now: f64, stop_start_time: f64) -> f64 {
        let wait_time = (now - stop_start_time).max(self.last_wait_time);
        self.last_wait_time = wait_time;
        wait_time
    }

    fn finish(&self, ctx: &mut StageContext<'_>, wait_time: f64, reason: &str) -> StageStatus {
        ctx.scenario.record_stop_done();
        info!(
            stop_sign_id = %ctx.scenario.stop_sign_id(),
            wait_time,
            reason,
            "stop complete, advancing to CREEP"
        );
        StageStatus::Finished {
            next: Some(ScenarioStage::Creep),
        }
    }
}

impl Stage for StopStage {
    fn stage(&self) -> ScenarioStage {
        ScenarioStage::Stop
    }

    fn enter(&mut self, ctx: &mut StageContext<'_>) {
        self.last_wait_time = 0.0;
        if ctx.scenario.mark_stop_start(ctx.clock.now()) {
            debug!(stop_start_time = ?ctx.scenario.stop_start_time(), "stop wait started");
        }
    }

    fn process(
        &mut self,
        planning_init_point: &TrajectoryPoint,
        frame: &mut Frame,
        ctx: &mut StageContext<'_>,
    ) -> Result<StageStatus, PlanningError> {
        let stop_start_time = ctx.scenario.stop_start_time().ok_or_else(|| {
            PlanningError::InvalidContext(format!(
                "STOP processed without stop_start_time for stop sign {}",
                ctx.scenario.stop_sign_id()
            ))
        })?;
        frame.validate()?;

        if let Err(e) = ctx.plan_on_reference_line(planning_init_point, frame) {
            error!(error = %e, seq = frame.sequence_num, "stop stage planning error");
        }

        let wait_time = self.wait_time(ctx.clock.now(), stop_start_time);
        debug!(stop_start_time, wait_time, "stop wait");

        if wait_time >= ctx.config.stop_duration && ctx.scenario.watch_vehicles().is_empty() {
            return Ok(self.finish(ctx, wait_time, "stop duration elapsed"));
        }

        for (lane_id, vehicles) in ctx.scenario.watch_vehicles().iter() {
            debug!(lane_id = %lane_id, vehicles = %vehicles.join(","), "watch_vehicles");
        }
        let watch_vehicle_ids = ctx.scenario.watch_vehicles().watched_ids();

        if watch_vehicle_ids.is_empty() {
            return Ok(self.finish(ctx, wait_time, "no vehicles left to watch"));
        }

        if let Some(policy) = &self.timeout_policy
            && policy.should_release(wait_time, ctx.config.wait_timeout, &watch_vehicle_ids)
        {
            let reason = format!("wait timeout policy {}", policy.name());
            return Ok(self.finish(ctx, wait_time, &reason));
        }

        let evaluator = ObstacleClearanceEvaluator::new(ctx.config.clearance_threshold);
        let map = ctx.map;
        let (lanes, watch_vehicles) = ctx.scenario.lanes_and_watch_vehicles_mut();
        for obstacle in &frame.obstacles {
            if let ClearanceOutcome::Cleared { lane_id, distance, .. } =
                evaluator.evaluate(obstacle, &watch_vehicle_ids, lanes, map, watch_vehicles)
            {
                info!(obstacle_id = %obstacle.id, lane_id = %lane_id, distance, "watch vehicle cleared");
            }
        }

        Ok(StageStatus::Running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::ScenarioConfig;
    use crate::context::{AssociatedLane, StopSignContext};
    use crate::task::test_tasks::*;
    use crate::task::{TaskFactory, TaskKind, TaskPipeline};
    use crossway_map::{HdMap, LaneInfo, LaneOverlapInfo, OverlapInfo};
    use crossway_types::{ObstacleType, ObstacleView, Point3};

    // ------------------------------------------------------------------ harness

    /// lane_A runs north along x = 0 with its stop line at (0, 50).
    struct Harness {
        config: ScenarioConfig,
        map: HdMap,
        clock: ManualClock,
        tasks: TaskPipeline,
        scenario: StopSignContext,
        stage: StopStage,
    }

    impl Harness {
        fn new(watch: &[(&str, &str)]) -> Self {
            let mut map = HdMap::new();
            map.insert_lane(
                LaneInfo::new(
                    "lane_A",
                    vec![Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 100.0, 0.0)],
                )
                .unwrap(),
            )
            .unwrap();
            let mut scenario = StopSignContext::new(
                "stop_sign_1",
                vec![AssociatedLane {
                    lane_id: "lane_A".to_string(),
                    overlap: OverlapInfo::new(
                        "stop_sign_1",
                        vec![LaneOverlapInfo {
                            lane_id: "lane_A".to_string(),
                            start_s: 49.0,
                            end_s: 50.0,
                        }],
                    ),
                }],
            );
            for (lane, v) in watch {
                scenario.watch(lane, *v).unwrap();
            }
            let mut config = ScenarioConfig::default();
            config.stop_duration = 3.0;

            let mut harness = Self {
                config,
                map,
                clock: ManualClock::new(100.0),
                tasks: TaskPipeline::default(),
                scenario,
                stage: StopStage::new(),
            };
            harness.enter();
            harness
        }

        fn enter(&mut self) {
            let mut ctx = StageContext {
                scenario: &mut self.scenario,
                config: &self.config,
                map: &self.map,
                clock: &self.clock,
                tasks: &mut self.tasks,
            };
            self.stage.enter(&mut ctx);
        }

        fn tick(&mut self, obstacles: Vec<ObstacleView>) -> Result<StageStatus, PlanningError> {
            let mut ctx = StageContext {
                scenario: &mut self.scenario,
                config: &self.config,
                map: &self.map,
                clock: &self.clock,
                tasks: &mut self.tasks,
            };
            let mut frame = Frame::new(1, obstacles);
            self.stage
                .process(&TrajectoryPoint::default(), &mut frame, &mut ctx)
        }
    }

    fn vehicle(id: &str, y: f64) -> ObstacleView {
        ObstacleView::new(id, ObstacleType::Vehicle, Point3::new(0.0, y, 0.0))
    }

    const CREEP: StageStatus = StageStatus::Finished {
        next: Some(ScenarioStage::Creep),
    };

    struct ReleaseAfterTimeout;

    impl WaitTimeoutPolicy for ReleaseAfterTimeout {
        fn name(&self) -> &str {
            "release_after_timeout"
        }

        fn should_release(&self, wait_time: f64, wait_timeout: f64, ids: &[ObstacleId]) -> bool {
            wait_time > wait_timeout && ids.len() <= 1
        }
    }

    // ------------------------------------------------------------------ entry

    #[test]
    fn enter_records_stop_start_time() {
        let h = Harness::new(&[]);
        assert_eq!(h.scenario.stop_start_time(), Some(100.0));
    }

    #[test]
    fn missing_stop_start_time_refuses_to_proceed() {
        let mut h = Harness::new(&[]);
        h.scenario = StopSignContext::new("stop_sign_1", vec![]);
        assert!(matches!(h.tick(vec![]), Err(PlanningError::InvalidContext(_))));
        assert!(h.scenario.stop_done_overlap_id().is_none());
    }

    #[test]
    fn invalid_frame_is_rejected() {
        let mut h = Harness::new(&[("lane_A", "v1")]);
        let bad = ObstacleView::new("v1", ObstacleType::Vehicle, Point3::new(f64::NAN, 0.0, 0.0));
        assert!(matches!(h.tick(vec![bad]), Err(PlanningError::InvalidFrame(_))));
    }

    // ------------------------------------------------------------------ exit conditions

    #[test]
    fn empty_watch_list_finishes_before_stop_duration() {
        let mut h = Harness::new(&[]);
        h.clock.advance(0.1);
        assert_eq!(h.tick(vec![]).unwrap(), CREEP);
        assert_eq!(h.scenario.stop_done_overlap_id(), Some("stop_sign_1"));
    }

    #[test]
    fn empty_watch_list_finishes_after_stop_duration() {
        let mut h = Harness::new(&[]);
        h.clock.advance(5.0);
        assert_eq!(h.tick(vec![]).unwrap(), CREEP);
    }

    #[test]
    fn emptied_lanes_count_as_nobody_left() {
        let mut h = Harness::new(&[("lane_A", "v1")]);
        h.scenario
            .lanes_and_watch_vehicles_mut()
            .1
            .clear_obstacle_across_lanes("v1");
        assert_eq!(h.tick(vec![]).unwrap(), CREEP);
    }

    #[test]
    fn watched_vehicle_keeps_stage_running_after_stop_duration() {
        let mut h = Harness::new(&[("lane_A", "v1")]);
        h.clock.advance(60.0);
        assert_eq!(h.tick(vec![vehicle("v1", 52.0)]).unwrap(), StageStatus::Running);
        assert!(h.scenario.stop_done_overlap_id().is_none());
    }

    #[test]
    fn wait_timeout_is_inert_without_policy() {
        let mut h = Harness::new(&[("lane_A", "v1")]);
        h.clock.advance(h.config.wait_timeout + 1.0);
        assert_eq!(h.tick(vec![vehicle("v1", 52.0)]).unwrap(), StageStatus::Running);
    }

    #[test]
    fn installed_timeout_policy_can_release() {
        let mut h = Harness::new(&[("lane_A", "v1")]);
        h.stage = StopStage::new().with_timeout_policy(Box::new(ReleaseAfterTimeout));
        h.clock.advance(1.0);
        assert_eq!(h.tick(vec![vehicle("v1", 52.0)]).unwrap(), StageStatus::Running);
        h.clock.advance(h.config.wait_timeout);
        assert_eq!(h.tick(vec![vehicle("v1", 52.0)]).unwrap(), CREEP);
    }

    // ------------------------------------------------------------------ pruning

    #[test]
    fn far_vehicle_is_pruned_then_stage_finishes_next_tick() {
        let mut h = Harness::new(&[("lane_A", "v1"), ("lane_A", "v2")]);
        let status = h.tick(vec![vehicle("v1", 65.0), vehicle("v2", 52.0)]).unwrap();
        assert_eq!(status, StageStatus::Running);
        assert_eq!(h.scenario.watch_vehicles().watched_ids(), vec!["v2".to_string()]);

        assert_eq!(h.tick(vec![vehicle("v2", 80.0)]).unwrap(), StageStatus::Running);
        assert!(h.scenario.watch_vehicles().watched_ids().is_empty());

        assert_eq!(h.tick(vec![]).unwrap(), CREEP);
    }

    #[test]
    fn near_vehicle_is_kept() {
        let mut h = Harness::new(&[("lane_A", "v1"), ("lane_A", "v2")]);
        let before = h.scenario.watch_vehicles().clone();
        assert_eq!(h.tick(vec![vehicle("v1", 55.0)]).unwrap(), StageStatus::Running);
        assert_eq!(h.scenario.watch_vehicles(), &before);
    }

    #[test]
    fn non_contending_obstacles_do_not_block_empty_watch_list() {
        let mut h = Harness::new(&[]);
        h.clock.advance(0.1);
        let walker = ObstacleView::new("p1", ObstacleType::Pedestrian, Point3::new(0.0, 50.5, 0.0));
        let cone = ObstacleView::new("c1", ObstacleType::UnknownUnmovable, Point3::new(0.5, 50.0, 0.0));
        assert_eq!(h.tick(vec![walker, cone]).unwrap(), CREEP);
        assert_eq!(h.scenario.stop_done_overlap_id(), Some("stop_sign_1"));
    }

    #[test]
    fn pedestrian_with_watched_id_is_not_cleared() {
        let mut h = Harness::new(&[("lane_A", "v1")]);
        let walker = ObstacleView::new("v1", ObstacleType::Pedestrian, Point3::new(0.0, 500.0, 0.0));
        assert_eq!(h.tick(vec![walker]).unwrap(), StageStatus::Running);
        assert_eq!(h.scenario.watch_vehicles().watched_ids(), vec!["v1".to_string()]);
    }

    #[test]
    fn vehicle_absent_from_perception_is_kept() {
        let mut h = Harness::new(&[("lane_A", "v1")]);
        assert_eq!(h.tick(vec![]).unwrap(), StageStatus::Running);
        assert_eq!(h.scenario.watch_vehicles().watched_ids(), vec!["v1".to_string()]);
    }

    // ------------------------------------------------------------------ planning & time

    #[test]
    fn planning_failure_does_not_abort_evaluation() {
        let mut h = Harness::new(&[("lane_A", "v1")]);
        let mut factory = TaskFactory::new();
        factory.register(TaskKind::DpPolyPathOptimizer, failing_path);
        h.tasks = TaskPipeline::build(&[TaskKind::DpPolyPathOptimizer], &factory).unwrap();

        assert_eq!(h.tick(vec![vehicle("v1", 90.0)]).unwrap(), StageStatus::Running);
        assert!(h.scenario.watch_vehicles().watched_ids().is_empty());
        assert_eq!(h.tick(vec![]).unwrap(), CREEP);
    }

    #[test]
    fn wait_time_never_decreases() {
        let mut stage = StopStage::new();
        assert_eq!(stage.wait_time(105.0, 100.0), 5.0);
        // Clock stepped backwards: keep the previous wait.
        assert_eq!(stage.wait_time(103.0, 100.0), 5.0);
        assert_eq!(stage.wait_time(107.0, 100.0), 7.0);
    }

    #[test]
    fn negative_elapsed_time_is_clamped() {
        let mut stage = StopStage::new();
        assert_eq!(stage.wait_time(99.0, 100.0), 0.0);
    }
}
