//! Planning tasks and the static [`TaskFactory`].
//!
//! Path and speed optimizers live outside this crate. A scenario only knows
//! them by [`TaskKind`]; the embedding planner registers one constructor per
//! kind, and every stage's configured task list is resolved against the
//! factory when the scenario is initialised.

use std::collections::HashMap;
use std::fmt;

use crossway_types::{Frame, PlanningError, TrajectoryPoint};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Every task a stop-sign stage may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    DeciderCreep,
    DpPolyPathOptimizer,
    PathDecider,
    DpStSpeedOptimizer,
    SpeedDecider,
    QpSplineStSpeedOptimizer,
}

impl TaskKind {
    pub fn name(self) -> &'static str {
        match self {
            TaskKind::DeciderCreep => "decider_creep",
            TaskKind::DpPolyPathOptimizer => "dp_poly_path_optimizer",
            TaskKind::PathDecider => "path_decider",
            TaskKind::DpStSpeedOptimizer => "dp_st_speed_optimizer",
            TaskKind::SpeedDecider => "speed_decider",
            TaskKind::QpSplineStSpeedOptimizer => "qp_spline_st_speed_optimizer",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One step of candidate plan generation.
pub trait Task: Send {
    fn kind(&self) -> TaskKind;

    /// Refine the plan stored in `frame`. An `Err` aborts the remaining tasks
    /// for this tick.
    fn execute(
        &mut self,
        planning_init_point: &TrajectoryPoint,
        frame: &mut Frame,
    ) -> Result<(), PlanningError>;
}

/// Constructor stored in the factory.
pub type TaskConstructor = fn() -> Box<dyn Task>;

/// Mapping from [`TaskKind`] to its constructor.
#[derive(Default, Clone)]
pub struct TaskFactory {
    constructors: HashMap<TaskKind, TaskConstructor>,
}

impl TaskFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the constructor for `kind`.
    pub fn register(&mut self, kind: TaskKind, constructor: TaskConstructor) {
        self.constructors.insert(kind, constructor);
    }

    pub fn contains(&self, kind: TaskKind) -> bool {
        self.constructors.contains_key(&kind)
    }

    pub fn create(&self, kind: TaskKind) -> Result<Box<dyn Task>, PlanningError> {
        self.constructors
            .get(&kind)
            .map(|construct| construct())
            .ok_or_else(|| PlanningError::UnregisteredTask(kind.to_string()))
    }
}

impl fmt::Debug for TaskFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&str> = self.constructors.keys().map(|k| k.name()).collect();
        kinds.sort_unstable();
        f.debug_struct("TaskFactory").field("kinds", &kinds).finish()
    }
}

/// The instantiated, ordered task list of the active stage.
#[derive(Default)]
pub struct TaskPipeline {
    tasks: Vec<Box<dyn Task>>,
}

impl TaskPipeline {
    /// Instantiate `kinds` in order. Fails on the first unregistered kind.
    pub fn build(kinds: &[TaskKind], factory: &TaskFactory) -> Result<Self, PlanningError> {
        let tasks = kinds
            .iter()
            .map(|&kind| factory.create(kind))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { tasks })
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Run every task in order, stopping at the first failure.
    pub fn run(
        &mut self,
        planning_init_point: &TrajectoryPoint,
        frame: &mut Frame,
    ) -> Result<(), PlanningError> {
        for task in &mut self.tasks {
            debug!(task = %task.kind(), seq = frame.sequence_num, "running task");
            task.execute(planning_init_point, frame)?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_tasks {
    use super::*;

    /// Appends the planning init point to the frame trajectory.
    pub struct EchoTask(pub TaskKind);

    impl Task for EchoTask {
        fn kind(&self) -> TaskKind {
            self.0
        }

        fn execute(
            &mut self,
            planning_init_point: &TrajectoryPoint,
            frame: &mut Frame,
        ) -> Result<(), PlanningError> {
            frame.trajectory.push(*planning_init_point);
            Ok(())
        }
    }

    pub struct FailingTask(pub TaskKind);

    impl Task for FailingTask {
        fn kind(&self) -> TaskKind {
            self.0
        }

        fn execute(&mut self, _: &TrajectoryPoint, _: &mut Frame) -> Result<(), PlanningError> {
            Err(PlanningError::TaskFailed {
                task: self.0.to_string(),
                reason: "no feasible path".to_string(),
            })
        }
    }

    pub fn echo_path() -> Box<dyn Task> {
        Box::new(EchoTask(TaskKind::DpPolyPathOptimizer))
    }

    pub fn echo_speed() -> Box<dyn Task> {
        Box::new(EchoTask(TaskKind::SpeedDecider))
    }

    pub fn failing_path() -> Box<dyn Task> {
        Box::new(FailingTask(TaskKind::DpPolyPathOptimizer))
    }

    /// A factory where every kind echoes, so any default config resolves.
    pub fn echo_factory() -> TaskFactory {
        fn echo_creep() -> Box<dyn Task> {
            Box::new(EchoTask(TaskKind::DeciderCreep))
        }
        fn echo_path_decider() -> Box<dyn Task> {
            Box::new(EchoTask(TaskKind::PathDecider))
        }
        fn echo_dp_st() -> Box<dyn Task> {
            Box::new(EchoTask(TaskKind::DpStSpeedOptimizer))
        }
        fn echo_qp_st() -> Box<dyn Task> {
            Box::new(EchoTask(TaskKind::QpSplineStSpeedOptimizer))
        }

        let mut factory = TaskFactory::new();
        factory.register(TaskKind::DeciderCreep, echo_creep);
        factory.register(TaskKind::DpPolyPathOptimizer, echo_path);
        factory.register(TaskKind::PathDecider, echo_path_decider);
        factory.register(TaskKind::DpStSpeedOptimizer, echo_dp_st);
        factory.register(TaskKind::SpeedDecider, echo_speed);
        factory.register(TaskKind::QpSplineStSpeedOptimizer, echo_qp_st);
        factory
    }
}
