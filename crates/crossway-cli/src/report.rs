//! Terminal rendering of a [`ReplaySummary`].

use colored::Colorize;
use crossway_runtime::{ReplaySummary, TickRecord};
use crossway_types::ScenarioStatus;

pub fn print_summary(summary: &ReplaySummary) {
    println!();
    println!(
        "  {} {}  (started {})",
        "Run".bold(),
        summary.run_id.to_string().dimmed(),
        summary.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();
    println!("  {:>6}  {:>9}  {:<20}  {}", "seq", "time", "stage", "watching");

    for tick in &summary.ticks {
        println!("  {}", tick_line(tick));
    }

    println!();
    let status = match summary.final_status {
        ScenarioStatus::Done => "DONE".green().bold(),
        ScenarioStatus::Processing => "PROCESSING".yellow().bold(),
        other => format!("{other:?}").normal(),
    };
    println!("  Final stage  {}  ({})", summary.final_stage.to_string().bold(), status);
    match &summary.stop_done_overlap_id {
        Some(id) => println!("  Stop done    {}", id.green()),
        None => println!("  Stop done    {}", "not yet".dimmed()),
    }
    if summary.error_count() > 0 {
        println!("  Errors       {}", summary.error_count().to_string().red());
    }
    for stall in &summary.stalls {
        println!(
            "  {}  at seq {} (t={:.2}s) still watching {}",
            "Stalled".yellow().bold(),
            stall.sequence_num,
            stall.time,
            stall.watched.join(", ")
        );
    }
    if summary.interrupted {
        println!("  {}", "Interrupted before the end of the log".yellow());
    }
    println!();
}

fn tick_line(tick: &TickRecord) -> String {
    let stage = if tick.stage_before == tick.stage_after {
        tick.stage_after.to_string()
    } else {
        format!("{} -> {}", tick.stage_before, tick.stage_after)
    };
    let watching = match &tick.error {
        Some(e) => e.to_string().red().to_string(),
        None if tick.watched.is_empty() => "-".dimmed().to_string(),
        None => tick.watched.join(", "),
    };
    format!("{:>6}  {:>9.2}  {:<20}  {}", tick.sequence_num, tick.time, stage, watching)
}
