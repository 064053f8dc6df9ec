//! Drop metadata older than a cutoff

use anyhow::{Context, Result};
use snapvault_core::BackupConfig;
use snapvault_metadata::MetadataStore;

pub async fn run(config: BackupConfig, retain_days: i64) -> Result<()> {
    let store = MetadataStore::open(&config.metadata_dir())
        .context("Failed to open metadata store")?;

    let removed = store.cleanup(retain_days);
    println!("Removed {removed} metadata records older than {retain_days} days");
    Ok(())
}
