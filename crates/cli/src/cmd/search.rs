//! Search snapshots by message, author or tag

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;
use snapvault_core::BackupConfig;

pub async fn run(config: BackupConfig, query: &str, limit: usize) -> Result<()> {
    let orchestrator = util::open_orchestrator(config)?;
    let hits = orchestrator.search(query, limit);

    if hits.is_empty() {
        println!("{}", format!("No snapshots match '{query}'").dimmed());
        return Ok(());
    }

    for metadata in &hits {
        util::display_snapshot_compact(metadata);
    }
    Ok(())
}
