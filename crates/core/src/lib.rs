//! Core types for Snapvault
//!
//! This crate provides:
//! - Snapshot metadata and file-change data structures
//! - The error taxonomy shared by all crates
//! - Symbolic reference resolution (`latest`, `HEAD~N`, tags)
//! - Configuration value types

pub mod config;
pub mod error;
pub mod model;
pub mod refs;

// Re-exports
pub use config::{BackupConfig, MonitorSettings};
pub use error::{Error, Result};
pub use model::{
    ChangeType, EngineSnapshot, FileChange, RepoStats, RetentionPolicy, SnapshotMetadata,
    SnapshotStats,
};
pub use refs::resolve;
