//! Stub planning tasks for replays and CI.
//!
//! The path and speed optimizers are not part of this workspace. To run the
//! scenario offline, [`sim_task_factory`] registers every [`TaskKind`] with a
//! stub that appends the planning start point to the frame trajectory, so the
//! frame always leaves a tick with a (stationary) plan.

use crossway_scenario::{Task, TaskFactory, TaskKind};
use crossway_types::{Frame, PlanningError, TrajectoryPoint};

struct HoldStartPoint {
    kind: TaskKind,
}

impl Task for HoldStartPoint {
    fn kind(&self) -> TaskKind {
        self.kind
    }

    fn execute(
        &mut self,
        planning_init_point: &TrajectoryPoint,
        frame: &mut Frame,
    ) -> Result<(), PlanningError> {
        frame.trajectory.push(TrajectoryPoint {
            v: 0.0,
            a: 0.0,
            ..*planning_init_point
        });
        Ok(())
    }
}

macro_rules! hold_constructor {
    ($name:ident, $kind:expr) => {
        fn $name() -> Box<dyn Task> {
            Box::new(HoldStartPoint { kind: $kind })
        }
    };
}

hold_constructor!(decider_creep, TaskKind::DeciderCreep);
hold_constructor!(dp_poly_path, TaskKind::DpPolyPathOptimizer);
hold_constructor!(path_decider, TaskKind::PathDecider);
hold_constructor!(dp_st_speed, TaskKind::DpStSpeedOptimizer);
hold_constructor!(speed_decider, TaskKind::SpeedDecider);
hold_constructor!(qp_spline_st_speed, TaskKind::QpSplineStSpeedOptimizer);

/// A factory with a stub registered for every [`TaskKind`].
pub fn sim_task_factory() -> TaskFactory {
    let mut factory = TaskFactory::new();
    factory.register(TaskKind::DeciderCreep, decider_creep);
    factory.register(TaskKind::DpPolyPathOptimizer, dp_poly_path);
    factory.register(TaskKind::PathDecider, path_decider);
    factory.register(TaskKind::DpStSpeedOptimizer, dp_st_speed);
    factory.register(TaskKind::SpeedDecider, speed_decider);
    factory.register(TaskKind::QpSplineStSpeedOptimizer, qp_spline_st_speed);
    factory
}
