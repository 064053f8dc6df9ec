//! Watch source paths and snapshot automatically

use crate::util;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use snapvault_core::BackupConfig;
use snapvault_manager::{FileMonitor, Scheduler, SnapshotService};
use std::sync::Arc;

pub async fn run(config: BackupConfig) -> Result<()> {
    let orchestrator = util::open_orchestrator(config)?;
    let service: Arc<dyn SnapshotService> = orchestrator.clone();

    let monitor_settings = orchestrator.config().monitor.clone();
    let sources = orchestrator.config().source_paths.clone();
    let schedule = orchestrator.config().schedule.clone();

    let mut monitor = FileMonitor::new(
        monitor_settings.clone(),
        sources.clone(),
        service.clone(),
        orchestrator.ledger(),
    );
    monitor.start().context("Failed to start change monitor")?;

    let mut scheduler = match &schedule {
        Some(expr) => {
            let mut scheduler = Scheduler::new(expr, service.clone())
                .with_context(|| format!("Invalid schedule cadence {expr:?}"))?;
            scheduler.start().context("Failed to start scheduler")?;
            Some(scheduler)
        }
        None => None,
    };

    println!("{}", "Watching for changes".bold());
    println!(
        "  Threshold:  {} changes",
        monitor_settings.auto_snapshot_threshold
    );
    println!(
        "  Interval:   {}s, debounce {}s",
        monitor_settings.auto_snapshot_interval_secs, monitor_settings.debounce_secs
    );
    match &schedule {
        Some(expr) => println!("  Schedule:   every {expr}"),
        None => println!("  Schedule:   {}", "disabled".dimmed()),
    }
    for path in &sources {
        println!("  Watching:   {}", path.display());
    }
    println!();
    println!("{}", "Press Ctrl-C to stop".dimmed());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    println!();
    println!("Stopping...");

    monitor.stop().await;
    if let Some(scheduler) = scheduler.as_mut() {
        scheduler.stop().await;
    }

    let status = monitor.status();
    if status.pending_changes > 0 {
        println!(
            "{}",
            format!(
                "{} pending changes not yet snapshotted; run 'snapvault snapshot'",
                status.pending_changes
            )
            .yellow()
        );
    }
    println!("{}", "Stopped".green());
    Ok(())
}
