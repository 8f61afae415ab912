//! The [`Stage`] trait and the context threaded into each stage tick.
//!
//! CRUISE_AND_MONITOR, CREEP and INTERSECTION_CRUISE are decided by other
//! subsystems; [`DelegatedStage`] is the boundary for them. It runs the
//! stage's planning tasks and defers the "am I done?" decision to a
//! caller-supplied predicate.

use crossway_map::MapService;
use crossway_types::{Frame, PlanningError, ScenarioStage, StageStatus, TrajectoryPoint};
use tracing::{debug, error};

use crate::clock::Clock;
use crate::config::ScenarioConfig;
use crate::context::StopSignContext;
use crate::task::TaskPipeline;

/// Everything a stage may read or mutate during one tick.
pub struct StageContext<'a> {
    pub scenario: &'a mut StopSignContext,
    pub config: &'a ScenarioConfig,
    pub map: &'a dyn MapService,
    pub clock: &'a dyn Clock,
    pub tasks: &'a mut TaskPipeline,
}

impl StageContext<'_> {
    /// Generate the candidate plan for this tick with the stage's tasks.
    pub fn plan_on_reference_line(
        &mut self,
        planning_init_point: &TrajectoryPoint,
        frame: &mut Frame,
    ) -> Result<(), PlanningError> {
        self.tasks.run(planning_init_point, frame)
    }
}

/// Tick-level logic of one scenario stage.
pub trait Stage: Send {
    fn stage(&self) -> ScenarioStage;

    /// Called once when the scenario enters this stage, before its first tick.
    fn enter(&mut self, _ctx: &mut StageContext<'_>) {}

    /// Run one tick. A requested transition travels in the returned
    /// [`StageStatus::Finished`] rather than through the context.
    fn process(
        &mut self,
        planning_init_point: &TrajectoryPoint,
        frame: &mut Frame,
        ctx: &mut StageContext<'_>,
    ) -> Result<StageStatus, PlanningError>;
}

/// Completion predicate consulted by [`DelegatedStage`] after planning.
pub type CompletionCheck = Box<dyn FnMut(&Frame, &StopSignContext) -> bool + Send>;

/// A stage whose exit decision belongs to another subsystem.
pub struct DelegatedStage {
    stage: ScenarioStage,
    next: Option<ScenarioStage>,
    is_complete: CompletionCheck,
}

impl DelegatedStage {
    /// Finish into the stage's natural successor once `is_complete` says so.
    pub fn new(
        stage: ScenarioStage,
        is_complete: impl FnMut(&Frame, &StopSignContext) -> bool + Send + 'static,
    ) -> Self {
        Self {
            stage,
            next: stage.next(),
            is_complete: Box::new(is_complete),
        }
    }

    /// A stage that finishes on its first successful tick.
    pub fn pass_through(stage: ScenarioStage) -> Self {
        Self::new(stage, |_, _| true)
    }
}

impl Stage for DelegatedStage {
    fn stage(&self) -> ScenarioStage {
        self.stage
    }

    fn process(
        &mut self,
        planning_init_point: &TrajectoryPoint,
        frame: &mut Frame,
        ctx: &mut StageContext<'_>,
    ) -> Result<StageStatus, PlanningError> {
        if let Err(e) = ctx.plan_on_reference_line(planning_init_point, frame) {
            error!(error = %e, stage = %self.stage, seq = frame.sequence_num, "delegated stage planning error");
        }

        if (self.is_complete)(&*frame, &*ctx.scenario) {
            debug!(stage = %self.stage, next = ?self.next, "delegated stage complete");
            return Ok(StageStatus::Finished { next: self.next });
        }
        Ok(StageStatus::Running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::task::test_tasks::*;
    use crate::task::{TaskFactory, TaskKind};
    use crossway_map::HdMap;

    fn run_tick(
        stage: &mut dyn Stage,
        tasks: &mut TaskPipeline,
        scenario: &mut StopSignContext,
    ) -> Result<StageStatus, PlanningError> {
        let config = ScenarioConfig::default();
        let map = HdMap::new();
        let clock = ManualClock::new(0.0);
        let mut ctx = StageContext {
            scenario,
            config: &config,
            map: &map,
            clock: &clock,
            tasks,
        };
        let mut frame = Frame::new(1, vec![]);
        stage.process(&TrajectoryPoint::default(), &mut frame, &mut ctx)
    }

    #[test]
    fn pass_through_finishes_into_successor() {
        let mut stage = DelegatedStage::pass_through(ScenarioStage::Creep);
        let mut tasks = TaskPipeline::default();
        let mut scenario = StopSignContext::new("ss", vec![]);
        assert_eq!(
            run_tick(&mut stage, &mut tasks, &mut scenario).unwrap(),
            StageStatus::Finished {
                next: Some(ScenarioStage::IntersectionCruise)
            }
        );
    }

    #[test]
    fn last_stage_finishes_the_scenario() {
        let mut stage = DelegatedStage::pass_through(ScenarioStage::IntersectionCruise);
        let mut tasks = TaskPipeline::default();
        let mut scenario = StopSignContext::new("ss", vec![]);
        assert_eq!(
            run_tick(&mut stage, &mut tasks, &mut scenario).unwrap(),
            StageStatus::Finished { next: None }
        );
    }

    #[test]
    fn predicate_keeps_stage_running() {
        let mut ticks = 0;
        let mut stage = DelegatedStage::new(ScenarioStage::CruiseAndMonitor, move |_, _| {
            ticks += 1;
            ticks >= 2
        });
        let mut tasks = TaskPipeline::default();
        let mut scenario = StopSignContext::new("ss", vec![]);
        assert_eq!(
            run_tick(&mut stage, &mut tasks, &mut scenario).unwrap(),
            StageStatus::Running
        );
        assert!(matches!(
            run_tick(&mut stage, &mut tasks, &mut scenario).unwrap(),
            StageStatus::Finished { next: Some(ScenarioStage::Stop) }
        ));
    }

    #[test]
    fn task_failure_does_not_block_transition() {
        let mut factory = TaskFactory::new();
        factory.register(TaskKind::DpPolyPathOptimizer, failing_path);
        let mut tasks = TaskPipeline::build(&[TaskKind::DpPolyPathOptimizer], &factory).unwrap();
        let mut stage = DelegatedStage::pass_through(ScenarioStage::Creep);
        let mut scenario = StopSignContext::new("ss", vec![]);
        assert_eq!(
            run_tick(&mut stage, &mut tasks, &mut scenario).unwrap(),
            StageStatus::Finished {
                next: Some(ScenarioStage::IntersectionCruise)
            }
        );
    }

    #[test]
    fn task_failure_still_consults_predicate() {
        let mut factory = TaskFactory::new();
        factory.register(TaskKind::DpPolyPathOptimizer, failing_path);
        let mut tasks = TaskPipeline::build(&[TaskKind::DpPolyPathOptimizer], &factory).unwrap();
        let mut stage = DelegatedStage::new(ScenarioStage::CruiseAndMonitor, |_, _| false);
        let mut scenario = StopSignContext::new("ss", vec![]);
        assert_eq!(
            run_tick(&mut stage, &mut tasks, &mut scenario).unwrap(),
            StageStatus::Running
        );
    }
}
