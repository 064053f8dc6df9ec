//! Create a snapshot immediately

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;
use snapvault_core::BackupConfig;

pub async fn run(
    config: BackupConfig,
    message: Option<String>,
    tags: Vec<String>,
    no_validate: bool,
) -> Result<()> {
    let orchestrator = util::open_orchestrator(config)?;

    let snapshot_id = tokio::task::spawn_blocking(move || {
        orchestrator.snapshot(message.as_deref(), &tags, !no_validate)
    })
    .await??;

    println!(
        "{} {}",
        "Created snapshot".green(),
        util::short_id(&snapshot_id).yellow()
    );
    Ok(())
}
