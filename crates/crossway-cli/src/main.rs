//! `crossway` – command-line driver for the stop-sign scenario.
//!
//! Replays a recorded approach through the scenario and prints how the stop
//! was handled, or prints the scenario config JSON Schema.
//!
//! Ctrl-C during a replay stops it between ticks; the partial summary is
//! still printed.

mod args;
mod report;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;
use crossway_runtime::{ReplayLog, ReplayRunner, init_tracing_for_stop_sign, sim_task_factory};
use crossway_scenario::{ScenarioConfig, config};
use crossway_types::PlanningError;
use tracing::warn;

use crate::args::{Command, ReplayArgs};

fn main() -> ExitCode {
    let command = match args::parse(std::env::args().skip(1)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            print_help();
            return ExitCode::from(2);
        }
    };

    match command {
        Command::Help => {
            print_help();
            ExitCode::SUCCESS
        }
        Command::Schema => match config::json_schema() {
            Ok(schema) => {
                println!("{schema}");
                ExitCode::SUCCESS
            }
            Err(e) => fail(&e),
        },
        Command::Replay(replay) => match run_replay(&replay) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => fail(&e),
        },
    }
}

fn run_replay(args: &ReplayArgs) -> Result<(), PlanningError> {
    let cfg = resolve_config(args.config.as_deref())?;
    let log = ReplayLog::load(&args.log)?;
    let _guard = init_tracing_for_stop_sign("crossway", &log.context.stop_sign_id);

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("{}", "Ctrl-C received, stopping after this tick".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the replay cannot be interrupted");
    }

    let summary = ReplayRunner::new(cfg, sim_task_factory()).run_with(log, &shutdown, args.realtime)?;

    if args.json {
        println!("{}", summary.to_json_pretty()?);
    } else {
        report::print_summary(&summary);
    }
    Ok(())
}

/// An explicit `--config` must exist; otherwise defaults plus env overrides.
fn resolve_config(path: Option<&Path>) -> Result<ScenarioConfig, PlanningError> {
    match path {
        Some(p) => config::load_from(p)?
            .ok_or_else(|| PlanningError::Config(format!("config file {} not found", p.display()))),
        None => {
            let mut cfg = ScenarioConfig::default();
            config::apply_env_overrides(&mut cfg);
            cfg.validate()?;
            Ok(cfg)
        }
    }
}

fn fail(e: &PlanningError) -> ExitCode {
    eprintln!("{}: {}", "error".red().bold(), e);
    ExitCode::FAILURE
}

fn print_help() {
    println!("{}", "crossway – unprotected stop-sign scenario".bold().cyan());
    println!();
    println!("  {}", "USAGE".bold());
    println!("    crossway replay <log.json> [--config <scenario.toml>] [--realtime] [--json]");
    println!("    crossway schema");
    println!("    crossway help");
    println!();
    println!("  {}", "ENVIRONMENT".bold());
    println!("    RUST_LOG                       log filter (default: info)");
    println!("    CROSSWAY_LOG_FORMAT=json       JSON logs");
    println!("    OTEL_EXPORTER_OTLP_ENDPOINT    export tick spans over OTLP/HTTP");
    println!("    CROSSWAY_STOP_DURATION         override stop_duration (s)");
    println!("    CROSSWAY_WAIT_TIMEOUT          override wait_timeout (s)");
    println!("    CROSSWAY_CLEARANCE_THRESHOLD   override clearance_threshold (m)");
}
