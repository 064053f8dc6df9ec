//! Show file-level differences between two snapshots

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;
use snapvault_core::{BackupConfig, ChangeType};

pub async fn run(config: BackupConfig, ref_a: &str, ref_b: &str) -> Result<()> {
    let orchestrator = util::open_orchestrator(config)?;
    let (ref_a, ref_b) = (ref_a.to_string(), ref_b.to_string());
    let changes = tokio::task::spawn_blocking({
        let orchestrator = orchestrator.clone();
        move || orchestrator.diff(&ref_a, &ref_b)
    })
    .await??;

    if changes.is_empty() {
        println!("{}", "No differences".dimmed());
        return Ok(());
    }

    for change in &changes {
        let marker = match change.change_type {
            ChangeType::Added => "+".green().to_string(),
            ChangeType::Modified => "~".yellow().to_string(),
            ChangeType::Deleted => "-".red().to_string(),
        };
        println!("{} {}", marker, change.path);
    }
    println!();
    println!("{} changes", changes.len());
    Ok(())
}
