//! Initialize the repository and metadata store

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use snapvault_core::BackupConfig;
use snapvault_engine::ResticEngine;
use snapvault_metadata::MetadataStore;

pub async fn run(config: BackupConfig) -> Result<()> {
    println!(
        "Initializing backup repository at {}",
        config.repository.display().to_string().cyan()
    );

    let engine = ResticEngine::new_unchecked(&config.repository, config.password_file.as_deref());
    engine
        .init_repository()
        .context("Failed to initialize repository")?;

    let metadata_dir = config.metadata_dir();
    MetadataStore::open(&metadata_dir).context("Failed to create metadata store")?;

    println!("{}", "Repository initialized".green());
    println!();
    println!("Repository:    {}", config.repository.display());
    println!("Metadata:      {}", metadata_dir.display());
    println!("Sources:");
    for path in &config.source_paths {
        println!("  - {}", path.display());
    }
    println!();
    println!("Next steps:");
    println!("  - Run 'snapvault snapshot' to create the first snapshot");
    println!("  - Run 'snapvault watch' to snapshot automatically on changes");
    Ok(())
}
