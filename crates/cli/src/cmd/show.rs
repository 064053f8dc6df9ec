//! Show one snapshot in detail

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;
use snapvault_core::{BackupConfig, ChangeType};

pub async fn run(config: BackupConfig, reference: &str) -> Result<()> {
    let orchestrator = util::open_orchestrator(config)?;
    let reference = reference.to_string();
    let metadata = tokio::task::spawn_blocking({
        let orchestrator = orchestrator.clone();
        move || orchestrator.show(&reference)
    })
    .await??;

    let Some(metadata) = metadata else {
        println!("{}", "Snapshot exists but has no metadata record".yellow());
        return Ok(());
    };

    println!("Snapshot:  {}", metadata.snapshot_id.yellow());
    println!(
        "Time:      {} ({})",
        metadata.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        util::format_relative_time(metadata.timestamp).dimmed()
    );
    println!("Author:    {}", metadata.author);
    if let Some(message) = &metadata.message {
        println!("Message:   {}", message);
    }
    if !metadata.tags.is_empty() {
        println!("Tags:      {}", metadata.tags.join(", ").cyan());
    }
    match &metadata.parent_snapshot {
        Some(parent) => println!("Parent:    {}", util::short_id(parent).yellow()),
        None => println!("Parent:    {}", "(first snapshot)".dimmed()),
    }
    println!();

    println!("Stats:");
    println!("  Files new:        {}", metadata.stats.files_new);
    println!("  Files changed:    {}", metadata.stats.files_changed);
    println!("  Files unmodified: {}", metadata.stats.files_unmodified);
    println!(
        "  Data added:       {}",
        util::format_size(metadata.stats.data_added_bytes)
    );
    println!("  Duration:         {:.1}s", metadata.stats.duration_seconds);

    if !metadata.file_changes.is_empty() {
        println!();
        println!("Changes ({}):", metadata.file_changes.len());
        for change in metadata.file_changes.iter().take(20) {
            let marker = match change.change_type {
                ChangeType::Added => "+".green().to_string(),
                ChangeType::Modified => "~".yellow().to_string(),
                ChangeType::Deleted => "-".red().to_string(),
            };
            println!("  {} {}", marker, change.path);
        }
        if metadata.file_changes.len() > 20 {
            println!("  ... and {} more", metadata.file_changes.len() - 20);
        }
    }
    Ok(())
}
