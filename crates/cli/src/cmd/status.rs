//! Show repository and store status

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;
use snapvault_core::BackupConfig;

pub async fn run(config: BackupConfig) -> Result<()> {
    let orchestrator = util::open_orchestrator(config)?;
    let status = tokio::task::spawn_blocking({
        let orchestrator = orchestrator.clone();
        move || orchestrator.status()
    })
    .await?;

    println!("{}", "Backup Status".bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    println!(
        "Repository:    {}",
        status.repository.display().to_string().cyan()
    );
    print!("Health:        ");
    if status.repository_healthy {
        println!("{}", "OK ✓".green());
    } else {
        println!("{}", "Check failed".red());
    }
    println!("Snapshots:     {}", status.total_snapshots);
    println!("Tracked:       {}", status.tracked_snapshots);
    println!("Size:          {}", util::format_size(status.repository_size));
    match status.last_snapshot {
        Some(ts) => println!("Last snapshot: {}", util::format_relative_time(ts)),
        None => println!("Last snapshot: {}", "never".dimmed()),
    }
    println!("Pending:       {} changes", status.pending_changes);
    println!();

    println!("Sources:");
    for path in &status.source_paths {
        println!("  - {}", path.display());
    }
    println!();

    println!("Recent snapshots:");
    if status.recent.is_empty() {
        println!("  {}", "No snapshots yet".dimmed());
    } else {
        for metadata in &status.recent {
            print!("  ");
            util::display_snapshot_compact(metadata);
        }
    }
    Ok(())
}
