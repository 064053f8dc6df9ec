//! Remove snapshots, by ref or by retention policy

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;
use snapvault_core::BackupConfig;

pub async fn run(config: BackupConfig, refs: Vec<String>, dry_run: bool) -> Result<()> {
    let orchestrator = util::open_orchestrator(config)?;

    if refs.is_empty() {
        println!("Applying retention policy");
    }

    let removed =
        tokio::task::spawn_blocking(move || orchestrator.forget(&refs, dry_run)).await??;

    if removed.is_empty() {
        println!("{}", "Nothing to remove".dimmed());
        return Ok(());
    }

    let verb = if dry_run { "Would remove" } else { "Removed" };
    println!("{} {} snapshots:", verb, removed.len());
    for id in &removed {
        println!("  - {}", util::short_id(id).yellow());
    }
    Ok(())
}
