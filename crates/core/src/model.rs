//! Snapshot metadata data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of change recorded for a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Added => "added",
            ChangeType::Modified => "modified",
            ChangeType::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "added" => Some(ChangeType::Added),
            "modified" => Some(ChangeType::Modified),
            "deleted" => Some(ChangeType::Deleted),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single file-level delta, owned by its parent snapshot record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileChange {
    /// Repository-relative path
    pub path: String,
    pub change_type: ChangeType,
    pub size_bytes: Option<u64>,
    /// Content hash, when the engine reported one
    pub checksum: Option<String>,
}

impl FileChange {
    pub fn new(path: impl Into<String>, change_type: ChangeType) -> Self {
        Self {
            path: path.into(),
            change_type,
            size_bytes: None,
            checksum: None,
        }
    }
}

/// Named counters captured at snapshot time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotStats {
    pub duration_seconds: f64,
    pub files_new: u64,
    pub files_changed: u64,
    pub files_unmodified: u64,
    pub data_added_bytes: u64,
    pub total_size_bytes: u64,
    pub total_file_count: u64,
}

/// Provenance record for one engine snapshot
///
/// Created once at snapshot time and never mutated afterwards; the only
/// write after the fact is a full replacement keyed by `snapshot_id`.
/// `parent_snapshot` links to the immediately preceding snapshot at
/// creation time, forming a linear lineage chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Opaque identifier assigned by the engine
    pub snapshot_id: String,
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub author: String,
    pub tags: Vec<String>,
    pub parent_snapshot: Option<String>,
    pub stats: SnapshotStats,
    pub file_changes: Vec<FileChange>,
}

/// Retention bucket counts, supplied per evaluation
///
/// Immutable configuration value; the engine's native bucketing decides
/// which snapshots each bucket keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPolicy {
    pub keep_last: u32,
    pub keep_hourly: u32,
    pub keep_daily: u32,
    pub keep_weekly: u32,
    pub keep_monthly: u32,
    pub keep_yearly: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            keep_last: 10,
            keep_hourly: 24,
            keep_daily: 7,
            keep_weekly: 4,
            keep_monthly: 12,
            keep_yearly: 5,
        }
    }
}

/// One entry of the engine's snapshot listing, ordered oldest to newest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub id: String,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub paths: Vec<String>,
}

/// Aggregate repository statistics reported by the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoStats {
    #[serde(default)]
    pub total_size: u64,
    #[serde(default)]
    pub total_file_count: u64,
}
