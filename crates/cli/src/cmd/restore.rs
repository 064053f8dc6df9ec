//! Restore a snapshot into a directory

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;
use snapvault_core::BackupConfig;
use snapvault_manager::RestoreOptions;
use std::path::Path;

pub async fn run(
    config: BackupConfig,
    reference: &str,
    target: &Path,
    selective_paths: Vec<String>,
    no_verify: bool,
    overwrite: bool,
) -> Result<()> {
    let orchestrator = util::open_orchestrator(config)?;
    let options = RestoreOptions {
        selective_paths,
        verify: !no_verify,
        overwrite,
        ..RestoreOptions::default()
    };

    println!(
        "Restoring {} into {}",
        reference.yellow(),
        target.display().to_string().cyan()
    );

    let reference = reference.to_string();
    let target = target.to_path_buf();
    tokio::task::spawn_blocking(move || orchestrator.restore(&reference, &target, &options))
        .await??;

    println!("{}", "Restore complete".green());
    Ok(())
}
