//! `crossway-runtime` – drives the stop-sign scenario tick by tick.
//!
//! # Modules
//!
//! - [`replay`] – [`ReplayRunner`][replay::ReplayRunner]: feeds a recorded
//!   [`ReplayLog`][replay::ReplayLog] through a
//!   [`ScenarioStageMachine`][crossway_scenario::ScenarioStageMachine] with a
//!   manual clock and returns a [`ReplaySummary`][replay::ReplaySummary].
//! - [`sim_tasks`] – [`sim_task_factory`][sim_tasks::sim_task_factory]: a
//!   task factory whose every kind is a stub that holds the planning start
//!   point, so replays run without the real optimizers.
//! - [`stall_guard`] – [`StallGuard`][stall_guard::StallGuard]: flags a STOP
//!   sojourn whose watch list has stopped shrinking.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: initialises
//!   the global `tracing` subscriber with an optional OTLP span exporter.

pub mod replay;
pub mod sim_tasks;
pub mod stall_guard;
pub mod telemetry;

pub use replay::{
    AssociatedLaneRecord, ContextRecord, ReplayLog, ReplayRunner, ReplaySummary, StallReport,
    TickRecord,
};
pub use sim_tasks::sim_task_factory;
pub use stall_guard::StallGuard;
pub use telemetry::{TracerProviderGuard, init_tracing, init_tracing_for_stop_sign};
