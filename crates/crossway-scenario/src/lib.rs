//! `crossway-scenario` – the unprotected stop-sign scenario.
//!
//! Decides when it is safe to stop watching cross traffic at a stop sign and
//! advance to the next driving phase.
//!
//! # Modules
//!
//! - [`machine`] – [`ScenarioStageMachine`][machine::ScenarioStageMachine]:
//!   dispatches each planning tick to the active stage and advances
//!   CRUISE_AND_MONITOR → STOP → CREEP → INTERSECTION_CRUISE, forward only.
//! - [`stop_stage`] – [`StopStage`][stop_stage::StopStage]: waits at the stop
//!   line, prunes the watch list and finishes into CREEP once nobody is left.
//! - [`clearance`] – [`ObstacleClearanceEvaluator`][clearance::ObstacleClearanceEvaluator]:
//!   per-obstacle decision to drop a watched vehicle that has left the stop
//!   line.
//! - [`watch_registry`] – [`WatchVehicleRegistry`][watch_registry::WatchVehicleRegistry]:
//!   obstacle ids watched per associated lane.
//! - [`context`] – [`StopSignContext`][context::StopSignContext]: the
//!   scenario-owned state threaded into every tick.
//! - [`stage`] – the [`Stage`][stage::Stage] trait, the per-tick
//!   [`StageContext`][stage::StageContext] and
//!   [`DelegatedStage`][stage::DelegatedStage] for stages decided elsewhere.
//! - [`task`] – [`TaskKind`][task::TaskKind] and the static
//!   [`TaskFactory`][task::TaskFactory] resolving kinds to constructors.
//! - [`config`] – [`ScenarioConfig`][config::ScenarioConfig] loading,
//!   overrides, validation and JSON Schema.
//! - [`clock`] – [`SystemClock`][clock::SystemClock] and
//!   [`ManualClock`][clock::ManualClock].

pub mod clearance;
pub mod clock;
pub mod config;
pub mod context;
pub mod machine;
pub mod stage;
pub mod stop_stage;
pub mod task;
pub mod watch_registry;

pub use clearance::{ClearanceOutcome, ObstacleClearanceEvaluator};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ScenarioConfig, StageTaskConfig, StageTasks};
pub use context::{AssociatedLane, AssociatedLanes, StopSignContext};
pub use machine::ScenarioStageMachine;
pub use stage::{CompletionCheck, DelegatedStage, Stage, StageContext};
pub use stop_stage::{StopStage, WaitTimeoutPolicy};
pub use task::{Task, TaskConstructor, TaskFactory, TaskKind, TaskPipeline};
pub use watch_registry::WatchVehicleRegistry;
