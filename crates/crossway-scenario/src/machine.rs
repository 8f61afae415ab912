//! [`ScenarioStageMachine`] – routes each planning tick to the active stage.
//!
//! The machine owns the [`StopSignContext`] and threads it, together with the
//! config, map, clock and the active stage's task pipeline, into the stage
//! handler. Transitions only move forward through
//! CRUISE_AND_MONITOR → STOP → CREEP → INTERSECTION_CRUISE; finishing the last
//! stage marks the scenario DONE.
//!
//! A handler error is returned to the caller, but the machine stays in the
//! same stage so the next tick re-evaluates from current state.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crossway_map::MapService;
use crossway_types::{
    Frame, PlanningError, ScenarioStage, ScenarioStatus, StageStatus, TrajectoryPoint,
};
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::ScenarioConfig;
use crate::context::StopSignContext;
use crate::stage::{Stage, StageContext};
use crate::stop_stage::StopStage;
use crate::task::{TaskFactory, TaskPipeline};

/// The unprotected stop-sign scenario.
pub struct ScenarioStageMachine {
    run_id: Uuid,
    config: ScenarioConfig,
    factory: TaskFactory,
    context: StopSignContext,
    map: Arc<dyn MapService>,
    clock: Box<dyn Clock>,
    stages: HashMap<ScenarioStage, Box<dyn Stage>>,
    current: ScenarioStage,
    /// Whether `enter` has run for `current`.
    entered: bool,
    tasks: TaskPipeline,
    status: ScenarioStatus,
}

impl ScenarioStageMachine {
    /// Create a scenario starting in `config.initial_stage`.
    ///
    /// The STOP handler is built in; the other stages must be supplied with
    /// [`with_stage`][Self::with_stage] before the scenario reaches them.
    pub fn new(
        config: ScenarioConfig,
        factory: TaskFactory,
        context: StopSignContext,
        map: Arc<dyn MapService>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let mut stages: HashMap<ScenarioStage, Box<dyn Stage>> = HashMap::new();
        stages.insert(ScenarioStage::Stop, Box::new(StopStage::new()));
        let current = config.initial_stage;
        Self {
            run_id: Uuid::new_v4(),
            config,
            factory,
            context,
            map,
            clock,
            stages,
            current,
            entered: false,
            tasks: TaskPipeline::default(),
            status: ScenarioStatus::Unknown,
        }
    }

    /// Install (or replace) the handler for `stage.stage()`.
    pub fn with_stage(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.insert(stage.stage(), stage);
        self
    }

    /// Validate config and check every configured task can be constructed.
    ///
    /// Idempotent: once initialised, later calls return immediately.
    pub fn init(&mut self) -> Result<(), PlanningError> {
        if self.status != ScenarioStatus::Unknown {
            return Ok(());
        }
        self.config.validate()?;
        for stage in ScenarioStage::ALL {
            for &kind in self.config.stages.tasks_for(stage) {
                if !self.factory.contains(kind) {
                    return Err(PlanningError::UnregisteredTask(format!("{kind} (stage {stage})")));
                }
            }
        }
        self.status = ScenarioStatus::Inited;
        info!(run_id = %self.run_id, initial_stage = %self.current, "stop-sign scenario initialised");
        Ok(())
    }

    /// Run one planning tick.
    pub fn process(
        &mut self,
        planning_init_point: &TrajectoryPoint,
        frame: &mut Frame,
    ) -> Result<ScenarioStatus, PlanningError> {
        if self.status == ScenarioStatus::Done {
            return Ok(ScenarioStatus::Done);
        }
        self.init()?;
        self.status = ScenarioStatus::Processing;

        let span = info_span!(
            "scenario_tick",
            run_id = %self.run_id,
            stage = %self.current,
            seq = frame.sequence_num
        );
        let _enter = span.enter();

        if !self.entered {
            self.enter_current()?;
        }

        let stage = self.stages.get_mut(&self.current).ok_or_else(|| {
            PlanningError::InvalidContext(format!("no handler for stage {}", self.current))
        })?;
        let mut ctx = StageContext {
            scenario: &mut self.context,
            config: &self.config,
            map: self.map.as_ref(),
            clock: self.clock.as_ref(),
            tasks: &mut self.tasks,
        };

        match stage.process(planning_init_point, frame, &mut ctx) {
            Err(e) => {
                error!(error = %e, stage = %self.current, "stage tick failed");
                Err(e)
            }
            Ok(StageStatus::Running) => Ok(self.status),
            Ok(StageStatus::Finished { next: None }) => {
                info!(stage = %self.current, "scenario done");
                self.status = ScenarioStatus::Done;
                Ok(self.status)
            }
            Ok(StageStatus::Finished { next: Some(next) }) => {
                self.advance(next)?;
                Ok(self.status)
            }
        }
    }

    /// Move to `next` if it lies after the current stage.
    fn advance(&mut self, next: ScenarioStage) -> Result<(), PlanningError> {
        if next <= self.current {
            warn!(from = %self.current, to = %next, "backward stage transition ignored");
            return Ok(());
        }
        info!(from = %self.current, to = %next, "stage transition");
        self.current = next;
        self.entered = false;
        self.enter_current()
    }

    /// Instantiate the current stage's tasks and run its entry hook.
    fn enter_current(&mut self) -> Result<(), PlanningError> {
        let stage = self.stages.get_mut(&self.current).ok_or_else(|| {
            PlanningError::InvalidContext(format!("no handler for stage {}", self.current))
        })?;
        self.tasks = TaskPipeline::build(self.config.stages.tasks_for(self.current), &self.factory)?;

        let mut ctx = StageContext {
            scenario: &mut self.context,
            config: &self.config,
            map: self.map.as_ref(),
            clock: self.clock.as_ref(),
            tasks: &mut self.tasks,
        };
        stage.enter(&mut ctx);
        self.entered = true;
        info!(stage = %self.current, tasks = self.tasks.len(), "entered stage");
        Ok(())
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn current_stage(&self) -> ScenarioStage {
        self.current
    }

    pub fn status(&self) -> ScenarioStatus {
        self.status
    }

    pub fn context(&self) -> &StopSignContext {
        &self.context
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }
}

impl fmt::Debug for ScenarioStageMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScenarioStageMachine")
            .field("run_id", &self.run_id)
            .field("current", &self.current)
            .field("status", &self.status)
            .field("context", &self.context)
            .finish()
    }
}
