//! Show snapshot history

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;
use snapvault_core::BackupConfig;

pub async fn run(
    config: BackupConfig,
    limit: usize,
    author: Option<String>,
    tags: Vec<String>,
) -> Result<()> {
    let orchestrator = util::open_orchestrator(config)?;
    let records = orchestrator.log(limit, author.as_deref(), &tags);

    if records.is_empty() {
        println!("{}", "No snapshots yet".dimmed());
        return Ok(());
    }

    for metadata in &records {
        util::display_snapshot_compact(metadata);
    }
    Ok(())
}
