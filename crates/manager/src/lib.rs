//! Snapshot lifecycle management
//!
//! This crate composes the engine collaborator with the metadata store:
//! - `BackupOrchestrator` drives snapshot creation, lineage and queries
//! - `RetentionEngine` translates bucket policies into engine forgets
//! - `FileMonitor` coalesces filesystem events into automatic snapshots
//! - `Scheduler` triggers snapshots on a fixed cadence

pub mod monitor;
pub mod orchestrator;
pub mod retention;
pub mod scheduler;

use snapvault_core::Result;

pub use monitor::{ChangeKind, ChangeLedger, FileMonitor, MonitorStatus};
pub use orchestrator::{BackupOrchestrator, RestoreOptions, StatusSummary};
pub use retention::RetentionEngine;
pub use scheduler::{parse_cadence, Scheduler};

/// Narrow interface the background loops use to request snapshots.
///
/// Implemented by `BackupOrchestrator`; tests substitute fakes. Both
/// operations block and may run for a long time, so callers must not hold
/// bookkeeping locks across them.
pub trait SnapshotService: Send + Sync {
    /// Create a snapshot with source validation disabled.
    fn trigger_snapshot(&self, message: &str, tags: &[&str]) -> Result<String>;

    /// Apply the configured retention policy; returns removed ids.
    fn apply_retention(&self) -> Result<Vec<String>>;
}
