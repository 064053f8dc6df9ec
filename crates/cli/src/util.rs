//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;
use snapvault_core::BackupConfig;
use snapvault_engine::ResticEngine;
use snapvault_manager::BackupOrchestrator;
use snapvault_metadata::MetadataStore;
use std::sync::Arc;

/// Wire the engine, the store and the orchestrator together.
pub fn open_orchestrator(config: BackupConfig) -> Result<Arc<BackupOrchestrator>> {
    let engine = ResticEngine::open(&config.repository, config.password_file.as_deref())
        .context("Failed to open backup repository")?;
    let store = MetadataStore::open(&config.metadata_dir())
        .context("Failed to open metadata store")?;

    let orchestrator = BackupOrchestrator::new(config, Arc::new(engine), Arc::new(store))
        .context("Failed to build orchestrator")?;
    Ok(Arc::new(orchestrator))
}

/// First eight characters of a snapshot id.
pub fn short_id(id: &str) -> &str {
    &id[..id.len().min(8)]
}

/// Format a timestamp as relative time ("2 hours ago").
pub fn format_relative_time(ts: DateTime<Utc>) -> String {
    let elapsed = Utc::now().signed_duration_since(ts);
    let seconds = elapsed.num_seconds();

    if seconds < 0 {
        "in the future".to_string()
    } else if seconds < 60 {
        format!("{} seconds ago", seconds)
    } else if seconds < 3600 {
        format!("{} minutes ago", seconds / 60)
    } else if seconds < 86400 {
        format!("{} hours ago", seconds / 3600)
    } else if seconds < 604800 {
        format!("{} days ago", seconds / 86400)
    } else {
        format!("{} weeks ago", seconds / 604800)
    }
}

/// Format a byte count in human-readable form.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// One-line snapshot display for log and search output.
pub fn display_snapshot_compact(metadata: &snapvault_core::SnapshotMetadata) {
    let time_str = format_relative_time(metadata.timestamp);
    let message = metadata.message.as_deref().unwrap_or("(no message)");

    print!(
        "{} {} {}",
        short_id(&metadata.snapshot_id).yellow(),
        time_str.dimmed(),
        message
    );
    if !metadata.tags.is_empty() {
        print!(" {}", format!("[{}]", metadata.tags.join(", ")).cyan());
    }
    println!(" - {} files", metadata.stats.total_file_count);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_id_truncates_long_ids() {
        assert_eq!(short_id("abcdef1234567890"), "abcdef12");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn format_size_picks_unit() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.00 GB");
    }

    #[test]
    fn format_relative_time_scales() {
        let now = Utc::now();
        assert!(format_relative_time(now).contains("seconds ago"));
        assert!(format_relative_time(now - chrono::Duration::hours(2)).contains("hours"));
        assert!(format_relative_time(now - chrono::Duration::days(3)).contains("days"));
    }
}
