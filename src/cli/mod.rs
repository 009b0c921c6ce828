//! Operator commands run against the configured ledger and stores.

pub mod args;

pub use args::{Cli, CliCommand, MeetingArgs};

use crate::app::build_components;
use crate::config::Config;
use crate::orchestrator::MeetingSnapshot;
use crate::pipeline::StageType;
use anyhow::{Context, Result};

pub async fn handle_inspect_command(args: MeetingArgs) -> Result<()> {
    let components = build_components(&Config::load()?)?;
    let snapshot = components
        .lifecycle
        .snapshot(&args.meeting_id)
        .await
        .with_context(|| format!("Failed to inspect meeting {}", args.meeting_id))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_snapshot(&snapshot);
    }
    Ok(())
}

pub async fn handle_rescan_command(args: MeetingArgs) -> Result<()> {
    let components = build_components(&Config::load()?)?;
    let outcome = components
        .router
        .evaluate_cascades(&args.meeting_id)
        .await
        .with_context(|| format!("Failed to rescan meeting {}", args.meeting_id))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    if outcome.dispatched.is_empty() {
        println!("Nothing to dispatch for meeting {}", args.meeting_id);
    }
    for (stage, task_id) in &outcome.dispatched {
        println!("Dispatched {} task {}", stage, task_id);
    }
    if outcome.cleanup.is_some() {
        println!("Meeting {} cleaned up", args.meeting_id);
    }
    if outcome.failures > 0 {
        println!("{} cascade(s) failed, see logs", outcome.failures);
    }
    Ok(())
}

pub async fn handle_cleanup_command(args: MeetingArgs) -> Result<()> {
    let components = build_components(&Config::load()?)?;
    let report = components.cleanup.cleanup(&args.meeting_id).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Cleanup of meeting {}:", args.meeting_id);
        println!("  ledger keys: {}", describe(report.ledger_keys));
        println!("  documents:   {}", describe(report.documents));
        println!("  directories: {}", describe(report.directories));
        for failure in &report.failures {
            println!("  failed: {}", failure);
        }
    }

    if report.is_complete() {
        Ok(())
    } else {
        anyhow::bail!("cleanup of meeting {} was partial", args.meeting_id)
    }
}

fn describe<T: std::fmt::Display>(count: Option<T>) -> String {
    count
        .map(|c| format!("{} removed", c))
        .unwrap_or_else(|| "failed".to_string())
}

fn print_snapshot(snapshot: &MeetingSnapshot) {
    println!("Meeting {}", snapshot.meeting_id);
    println!(
        "  status: {}",
        snapshot.status.map(|s| s.as_str()).unwrap_or("unknown")
    );
    println!(
        "  notify: {}",
        snapshot.notify_address.as_deref().unwrap_or("-")
    );

    for stage in StageType::ALL {
        let tasks = snapshot.tasks_of(stage);
        if tasks.is_empty() {
            continue;
        }
        println!("  {}:", stage);
        for (task_id, status) in tasks {
            println!("    {} {}", task_id, status.as_str());
        }
    }
}
