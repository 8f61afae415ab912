use std::path::PathBuf;

use crossway_runtime::{ReplayLog, ReplayRunner, sim_task_factory};
use crossway_scenario::ScenarioConfig;
use crossway_types::{ScenarioStage, ScenarioStatus};

fn demo_log() -> ReplayLog {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../demos/four_way_stop.json");
    ReplayLog::load(&path).unwrap()
}

#[test]
fn four_way_stop_runs_to_intersection_cruise() {
    let summary = ReplayRunner::new(ScenarioConfig::default(), sim_task_factory())
        .run(demo_log())
        .unwrap();

    assert_eq!(summary.error_count(), 0);
    assert_eq!(summary.final_status, ScenarioStatus::Done);
    assert_eq!(summary.final_stage, ScenarioStage::IntersectionCruise);
    assert_eq!(summary.stop_done_overlap_id.as_deref(), Some("stop_sign_7"));
    assert!(!summary.interrupted);

    // car_12 leaves on frame 4, car_15 on frame 6.
    let watched: Vec<usize> = summary.ticks.iter().map(|t| t.watched.len()).collect();
    assert_eq!(&watched[..6], &[2, 2, 2, 1, 1, 0]);

    let creep = summary.first_tick_in(ScenarioStage::Creep).unwrap();
    assert_eq!(creep.sequence_num, 7);
    assert_eq!(creep.stage_before, ScenarioStage::Stop);
    assert!((creep.time - 103.0).abs() < 1e-9);

    // Frame 10 arrives after the scenario is done.
    assert_eq!(summary.ticks.last().unwrap().sequence_num, 9);
}

#[test]
fn recording_started_mid_wait_releases_on_first_tick() {
    let mut log = demo_log();
    log.context.watch_vehicles.clear();
    log.context.stop_start_time = Some(95.0);
    let config = ScenarioConfig {
        initial_stage: ScenarioStage::Stop,
        ..ScenarioConfig::default()
    };

    let summary = ReplayRunner::new(config, sim_task_factory()).run(log).unwrap();

    assert_eq!(summary.ticks[0].stage_before, ScenarioStage::Stop);
    assert_eq!(summary.ticks[0].stage_after, ScenarioStage::Creep);
    assert_eq!(summary.stop_done_overlap_id.as_deref(), Some("stop_sign_7"));
}

#[test]
fn higher_clearance_threshold_keeps_waiting() {
    let config = ScenarioConfig {
        clearance_threshold: 50.0,
        ..ScenarioConfig::default()
    };

    let summary = ReplayRunner::new(config, sim_task_factory())
        .with_stall_threshold(4)
        .run(demo_log())
        .unwrap();

    assert_eq!(summary.final_stage, ScenarioStage::Stop);
    assert_eq!(summary.final_status, ScenarioStatus::Processing);
    assert!(summary.stop_done_overlap_id.is_none());
    assert_eq!(summary.ticks.len(), 10);
    assert!(!summary.stalls.is_empty());
}
