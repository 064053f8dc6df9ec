//! External backup engine collaborator
//!
//! The engine performs chunking, deduplication, encryption and physical
//! storage; this crate only defines the narrow interface the rest of the
//! system consumes, plus the restic subprocess implementation of it.
//! Engine calls are blocking and potentially long-running; callers must
//! never hold bookkeeping locks across them.

pub mod restic;

use snapvault_core::{EngineSnapshot, RepoStats, Result, RetentionPolicy};
use std::path::PathBuf;

pub use restic::ResticEngine;

/// Parameters for a snapshot creation call
#[derive(Debug, Clone, Default)]
pub struct SnapshotRequest {
    pub paths: Vec<PathBuf>,
    pub tags: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub include_patterns: Vec<String>,
}

/// Counters reported by the engine for one completed snapshot
#[derive(Debug, Clone, Default)]
pub struct BackupSummary {
    pub snapshot_id: String,
    pub files_new: u64,
    pub files_changed: u64,
    pub files_unmodified: u64,
    pub data_added: u64,
    pub total_files_processed: u64,
    pub total_bytes_processed: u64,
    pub total_duration: f64,
}

/// Parameters for a restore call
#[derive(Debug, Clone)]
pub struct RestoreRequest {
    pub snapshot_id: String,
    pub target: PathBuf,
    pub selective_paths: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub include_patterns: Vec<String>,
    pub verify: bool,
}

/// Path sets distinguishing two snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub modified: Vec<String>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

/// Narrow interface onto the external backup engine
///
/// Implementations serialize snapshot creation per repository themselves;
/// the orchestrator never issues two concurrent create calls against the
/// same repository.
pub trait BackupEngine: Send + Sync {
    /// Create a snapshot of the given paths. Blocking.
    fn create_snapshot(&self, request: &SnapshotRequest) -> Result<BackupSummary>;

    /// Restore a snapshot into a target directory. Blocking.
    fn restore_snapshot(&self, request: &RestoreRequest) -> Result<()>;

    /// All known snapshots, ordered oldest to newest.
    fn list_snapshots(&self) -> Result<Vec<EngineSnapshot>>;

    /// File-level differences between two snapshots.
    fn diff_snapshots(&self, a: &str, b: &str) -> Result<SnapshotDiff>;

    /// Apply bucket-based retention; returns the removed snapshot ids.
    fn forget_by_policy(&self, policy: &RetentionPolicy, dry_run: bool) -> Result<Vec<String>>;

    /// Remove specific snapshots by id; returns the removed ids.
    fn forget_snapshots(&self, ids: &[String], dry_run: bool) -> Result<Vec<String>>;

    /// Aggregate repository statistics.
    fn repo_stats(&self) -> Result<RepoStats>;

    /// Whether the repository passes the engine's integrity check.
    fn check_health(&self) -> Result<bool>;
}
