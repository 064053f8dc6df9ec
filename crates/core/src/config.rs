//! Configuration value types
//!
//! Loaded from a TOML file by the CLI; everything here is plain data with
//! serde defaults so a minimal config only needs the repository and source
//! paths.

use crate::error::{Error, Result};
use crate::model::RetentionPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level backup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Human-readable name for this backup set
    #[serde(default = "default_name")]
    pub name: String,

    /// Paths captured by every snapshot
    pub source_paths: Vec<PathBuf>,

    /// Engine repository location
    pub repository: PathBuf,

    /// Cadence expression for the scheduler ("1h", "30m", "2d");
    /// absent disables scheduled snapshots
    #[serde(default)]
    pub schedule: Option<String>,

    #[serde(default)]
    pub retention: RetentionPolicy,

    /// File holding the repository password; falls back to the
    /// engine's password environment variable when absent
    #[serde(default)]
    pub password_file: Option<PathBuf>,

    /// Directory for the snapshot metadata database; defaults to a
    /// sibling of the repository
    #[serde(default)]
    pub metadata_dir: Option<PathBuf>,

    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    #[serde(default)]
    pub include_patterns: Vec<String>,

    #[serde(default)]
    pub monitor: MonitorSettings,
}

impl BackupConfig {
    /// Basic shape validation, independent of the filesystem.
    pub fn validate(&self) -> Result<()> {
        if self.source_paths.is_empty() {
            return Err(Error::Validation(
                "config must list at least one source path".to_string(),
            ));
        }
        if self.repository.as_os_str().is_empty() {
            return Err(Error::Validation("config repository path is empty".to_string()));
        }
        Ok(())
    }

    /// Where the metadata database lives. Kept outside the repository so
    /// the engine's own layout stays untouched.
    pub fn metadata_dir(&self) -> PathBuf {
        match &self.metadata_dir {
            Some(dir) => dir.clone(),
            None => {
                let mut path = self.repository.as_os_str().to_os_string();
                path.push("-metadata");
                PathBuf::from(path)
            }
        }
    }
}

/// Tuning for the filesystem change monitor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Pending-change count that triggers an automatic snapshot
    pub auto_snapshot_threshold: usize,

    /// Maximum wall-clock gap between automatic snapshots, in seconds
    pub auto_snapshot_interval_secs: u64,

    /// Quiet period required after the last event before trigger
    /// conditions are evaluated, in seconds
    pub debounce_secs: u64,

    /// Glob patterns for events the monitor ignores outright
    pub ignore: Vec<String>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            auto_snapshot_threshold: 50,
            auto_snapshot_interval_secs: 3600,
            debounce_secs: 30,
            ignore: vec![
                "*.tmp".to_string(),
                "*.swp".to_string(),
                "*.lock".to_string(),
                ".DS_Store".to_string(),
                "__pycache__".to_string(),
            ],
        }
    }
}

fn default_name() -> String {
    "default".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_fills_defaults() {
        let config: BackupConfig = toml::from_str(
            r#"
            source_paths = ["/home/me/docs"]
            repository = "/backups/repo"
            "#,
        )
        .unwrap();

        assert_eq!(config.name, "default");
        assert!(config.schedule.is_none());
        assert_eq!(config.retention.keep_last, 10);
        assert_eq!(config.monitor.auto_snapshot_threshold, 50);
        assert_eq!(config.monitor.debounce_secs, 30);
        assert_eq!(config.metadata_dir(), PathBuf::from("/backups/repo-metadata"));
        config.validate().unwrap();
    }

    #[test]
    fn empty_sources_fail_validation() {
        let config: BackupConfig = toml::from_str(
            r#"
            source_paths = []
            repository = "/backups/repo"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn retention_section_overrides() {
        let config: BackupConfig = toml::from_str(
            r#"
            source_paths = ["/data"]
            repository = "/repo"
            schedule = "1h"

            [retention]
            keep_last = 3
            keep_daily = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.retention.keep_last, 3);
        assert_eq!(config.retention.keep_daily, 30);
        // Unspecified buckets keep their defaults.
        assert_eq!(config.retention.keep_weekly, 4);
    }
}
