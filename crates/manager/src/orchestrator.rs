//! Backup orchestration
//!
//! Composes the engine collaborator, the metadata store and the retention
//! engine. Snapshot creation establishes lineage from the engine listing
//! taken before the create call and records file-level deltas from an
//! engine diff of the two most recent snapshots.
//!
//! Known limitation, kept deliberately: change detection compares the two
//! most recent engine snapshots rather than the working tree, so it
//! under-reports uncommitted changes. Only the very first snapshot walks
//! the source trees directly.

use crate::monitor::ChangeLedger;
use crate::retention::RetentionEngine;
use crate::SnapshotService;
use chrono::{DateTime, Utc};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use snapvault_core::{
    refs, BackupConfig, ChangeType, EngineSnapshot, Error, FileChange, Result, SnapshotMetadata,
    SnapshotStats,
};
use snapvault_engine::{BackupEngine, RestoreRequest, SnapshotRequest};
use snapvault_metadata::MetadataStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Options forwarded to the engine on restore
#[derive(Debug, Clone)]
pub struct RestoreOptions {
    pub selective_paths: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub include_patterns: Vec<String>,
    pub verify: bool,
    pub overwrite: bool,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            selective_paths: Vec::new(),
            exclude_patterns: Vec::new(),
            include_patterns: Vec::new(),
            verify: true,
            overwrite: false,
        }
    }
}

/// Aggregate view over the repository, the store and pending changes
#[derive(Debug, Clone)]
pub struct StatusSummary {
    pub repository: PathBuf,
    pub repository_healthy: bool,
    pub total_snapshots: usize,
    pub repository_size: u64,
    pub last_snapshot: Option<DateTime<Utc>>,
    pub pending_changes: usize,
    pub tracked_snapshots: u64,
    pub source_paths: Vec<PathBuf>,
    pub recent: Vec<SnapshotMetadata>,
}

pub struct BackupOrchestrator {
    config: BackupConfig,
    engine: Arc<dyn BackupEngine>,
    store: Arc<MetadataStore>,
    retention: RetentionEngine,
    ledger: Arc<ChangeLedger>,
    exclude_matcher: Option<Gitignore>,
    include_matcher: Option<Gitignore>,
    author: String,
}

impl BackupOrchestrator {
    pub fn new(
        config: BackupConfig,
        engine: Arc<dyn BackupEngine>,
        store: Arc<MetadataStore>,
    ) -> Result<Self> {
        config.validate()?;

        let retention = RetentionEngine::new(Arc::clone(&engine), Arc::clone(&store));
        let exclude_matcher = build_matcher(&config.exclude_patterns)?;
        let include_matcher = build_matcher(&config.include_patterns)?;

        Ok(Self {
            config,
            engine,
            store,
            retention,
            ledger: Arc::new(ChangeLedger::default()),
            exclude_matcher,
            include_matcher,
            author: current_user(),
        })
    }

    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    /// The pending-change accumulator shared with the file monitor.
    pub fn ledger(&self) -> Arc<ChangeLedger> {
        Arc::clone(&self.ledger)
    }

    /// Create a snapshot of the configured source paths.
    ///
    /// A metadata save failure propagates after the engine snapshot
    /// succeeded: the snapshot then exists engine-side but untracked
    /// (orphaned), recoverable by a re-scan.
    pub fn snapshot(
        &self,
        message: Option<&str>,
        tags: &[String],
        validate_sources: bool,
    ) -> Result<String> {
        if validate_sources {
            self.validate_sources()?;
        }

        // Lineage comes from the listing as it stood before the create
        // call: the then-newest snapshot becomes the parent.
        let listing_before = self.engine.list_snapshots()?;
        let parent_snapshot = listing_before.last().map(|s| s.id.clone());

        // The message rides along as a tag for the engine's native tag
        // system; the first-class field is persisted separately.
        let mut engine_tags = tags.to_vec();
        if let Some(message) = message {
            engine_tags.push(format!("message:{message}"));
        }

        tracing::info!(
            paths = self.config.source_paths.len(),
            "creating snapshot"
        );
        let summary = self.engine.create_snapshot(&SnapshotRequest {
            paths: self.config.source_paths.clone(),
            tags: engine_tags,
            exclude_patterns: self.config.exclude_patterns.clone(),
            include_patterns: self.config.include_patterns.clone(),
        })?;

        let file_changes = self.detect_changes(&listing_before, &summary.snapshot_id);

        let metadata = SnapshotMetadata {
            snapshot_id: summary.snapshot_id.clone(),
            message: message.map(str::to_string),
            timestamp: Utc::now(),
            author: self.author.clone(),
            tags: tags.to_vec(),
            parent_snapshot,
            stats: SnapshotStats {
                duration_seconds: summary.total_duration,
                files_new: summary.files_new,
                files_changed: summary.files_changed,
                files_unmodified: summary.files_unmodified,
                data_added_bytes: summary.data_added,
                total_size_bytes: summary.total_bytes_processed,
                total_file_count: summary.total_files_processed,
            },
            file_changes,
        };

        if let Err(e) = self.store.save(&metadata) {
            tracing::error!(
                snapshot_id = %metadata.snapshot_id,
                error = %e,
                "snapshot exists in the engine but its metadata was not persisted"
            );
            return Err(e);
        }

        tracing::info!(
            snapshot_id = %metadata.snapshot_id,
            duration = summary.total_duration,
            "snapshot created"
        );
        Ok(metadata.snapshot_id)
    }

    /// Recent snapshot records, newest first.
    pub fn log(
        &self,
        limit: usize,
        author: Option<&str>,
        tags: &[String],
    ) -> Vec<SnapshotMetadata> {
        self.store.get_recent(limit, author, tags)
    }

    /// Restore a snapshot into a target directory.
    pub fn restore(&self, reference: &str, target: &Path, options: &RestoreOptions) -> Result<()> {
        let snapshot_id = self.resolve(reference)?;

        if target.exists() && !options.overwrite {
            let occupied = target
                .read_dir()
                .map(|mut entries| entries.next().is_some())
                .unwrap_or(false);
            if occupied {
                return Err(Error::Validation(format!(
                    "target directory {} is not empty; pass overwrite to force",
                    target.display()
                )));
            }
        }
        std::fs::create_dir_all(target)
            .map_err(|e| Error::Validation(format!("cannot create restore target: {e}")))?;

        tracing::info!(%snapshot_id, target = %target.display(), "restoring snapshot");
        self.engine.restore_snapshot(&RestoreRequest {
            snapshot_id: snapshot_id.clone(),
            target: target.to_path_buf(),
            selective_paths: options.selective_paths.clone(),
            exclude_patterns: options.exclude_patterns.clone(),
            include_patterns: options.include_patterns.clone(),
            verify: options.verify,
        })?;

        tracing::info!(%snapshot_id, "restore complete");
        Ok(())
    }

    /// Resolve a ref and fetch its metadata record, if tracked.
    pub fn show(&self, reference: &str) -> Result<Option<SnapshotMetadata>> {
        let snapshot_id = self.resolve(reference)?;
        Ok(self.store.get(&snapshot_id))
    }

    /// Metadata-level diff between two persisted snapshots.
    ///
    /// Compares the persisted file-change collections keyed by path;
    /// checksum differences mark modifications.
    pub fn diff(&self, ref1: &str, ref2: &str) -> Result<Vec<FileChange>> {
        let first = self
            .show(ref1)?
            .ok_or_else(|| Error::reference(ref1, "no metadata record"))?;
        let second = self
            .show(ref2)?
            .ok_or_else(|| Error::reference(ref2, "no metadata record"))?;

        let before: std::collections::HashMap<&str, &FileChange> = first
            .file_changes
            .iter()
            .map(|c| (c.path.as_str(), c))
            .collect();
        let after: std::collections::HashMap<&str, &FileChange> = second
            .file_changes
            .iter()
            .map(|c| (c.path.as_str(), c))
            .collect();

        let mut changes = Vec::new();
        for (path, change) in &after {
            match before.get(path) {
                None => changes.push((*change).clone()),
                Some(prior) if prior.checksum != change.checksum => {
                    changes.push(FileChange::new(*path, ChangeType::Modified));
                }
                Some(_) => {}
            }
        }
        for path in before.keys() {
            if !after.contains_key(path) {
                changes.push(FileChange::new(*path, ChangeType::Deleted));
            }
        }
        changes.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(changes)
    }

    /// Aggregate status view. Individual probe failures degrade to
    /// defaults rather than failing the whole summary.
    pub fn status(&self) -> StatusSummary {
        let repository_healthy = self.engine.check_health().unwrap_or(false);
        let total_snapshots = match self.engine.list_snapshots() {
            Ok(listing) => listing.len(),
            Err(e) => {
                tracing::warn!(error = %e, "snapshot listing unavailable for status");
                0
            }
        };
        let repository_size = self
            .engine
            .repo_stats()
            .map(|s| s.total_size)
            .unwrap_or_default();

        let recent = self.store.get_recent(5, None, &[]);
        let store_stats = self.store.stats();

        StatusSummary {
            repository: self.config.repository.clone(),
            repository_healthy,
            total_snapshots,
            repository_size,
            last_snapshot: recent.first().map(|m| m.timestamp),
            pending_changes: self.ledger.pending_count(),
            tracked_snapshots: store_stats.total_snapshots,
            source_paths: self.config.source_paths.clone(),
            recent,
        }
    }

    /// Substring search over message, author and tags.
    pub fn search(&self, query: &str, limit: usize) -> Vec<SnapshotMetadata> {
        self.store.search(query, limit)
    }

    /// Remove snapshots, either the given refs or whatever the configured
    /// retention policy selects. Returns removed ids.
    pub fn forget(&self, references: &[String], dry_run: bool) -> Result<Vec<String>> {
        if references.is_empty() {
            return self.retention.apply(&self.config.retention, dry_run);
        }

        let listing = self.engine.list_snapshots()?;
        let ids: Vec<String> = references
            .iter()
            .map(|r| refs::resolve(r, &listing))
            .collect::<Result<_>>()?;

        let removed = self.engine.forget_snapshots(&ids, dry_run)?;
        if !dry_run {
            for snapshot_id in &removed {
                self.store.delete(snapshot_id);
            }
        }
        Ok(removed)
    }

    fn resolve(&self, reference: &str) -> Result<String> {
        let listing = self.engine.list_snapshots()?;
        refs::resolve(reference, &listing)
    }

    fn validate_sources(&self) -> Result<()> {
        for path in &self.config.source_paths {
            if !path.exists() {
                return Err(Error::Validation(format!(
                    "source path does not exist: {}",
                    path.display()
                )));
            }
            let readable = if path.is_dir() {
                path.read_dir().is_ok()
            } else {
                std::fs::File::open(path).is_ok()
            };
            if !readable {
                return Err(Error::Validation(format!(
                    "cannot read source path: {}",
                    path.display()
                )));
            }
        }
        Ok(())
    }

    /// File-level deltas for the new snapshot.
    ///
    /// With a prior snapshot the engine diffs the two most recent; the
    /// very first snapshot instead walks the source trees and records
    /// everything as added. A diff failure degrades to an empty list.
    fn detect_changes(
        &self,
        listing_before: &[EngineSnapshot],
        new_snapshot_id: &str,
    ) -> Vec<FileChange> {
        let Some(previous) = listing_before.last() else {
            return self.walk_initial_changes();
        };

        match self.engine.diff_snapshots(&previous.id, new_snapshot_id) {
            Ok(diff) => {
                let mut changes = Vec::new();
                for path in diff.added {
                    changes.push(FileChange::new(path, ChangeType::Added));
                }
                for path in diff.modified {
                    changes.push(FileChange::new(path, ChangeType::Modified));
                }
                for path in diff.removed {
                    changes.push(FileChange::new(path, ChangeType::Deleted));
                }
                changes
            }
            Err(e) => {
                tracing::warn!(error = %e, "snapshot diff unavailable, recording no file changes");
                Vec::new()
            }
        }
    }

    fn walk_initial_changes(&self) -> Vec<FileChange> {
        let mut changes = Vec::new();
        for source in &self.config.source_paths {
            for entry in walkdir::WalkDir::new(source)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                if self.is_excluded(entry.path()) {
                    continue;
                }
                let relative = entry
                    .path()
                    .strip_prefix(source)
                    .unwrap_or(entry.path())
                    .to_string_lossy()
                    .into_owned();
                let size = entry.metadata().ok().map(|m| m.len());
                changes.push(FileChange {
                    path: relative,
                    change_type: ChangeType::Added,
                    size_bytes: size,
                    checksum: None,
                });
            }
        }
        changes
    }

    fn is_excluded(&self, path: &Path) -> bool {
        if let Some(matcher) = &self.exclude_matcher {
            if matcher.matched(path, false).is_ignore() {
                return true;
            }
        }
        if let Some(matcher) = &self.include_matcher {
            // Include patterns act as an allow-list when present.
            return !matcher.matched(path, false).is_ignore();
        }
        false
    }
}

impl SnapshotService for BackupOrchestrator {
    fn trigger_snapshot(&self, message: &str, tags: &[&str]) -> Result<String> {
        let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
        self.snapshot(Some(message), &tags, false)
    }

    fn apply_retention(&self) -> Result<Vec<String>> {
        self.forget(&[], false)
    }
}

fn build_matcher(patterns: &[String]) -> Result<Option<Gitignore>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GitignoreBuilder::new("/");
    for pattern in patterns {
        builder
            .add_line(None, pattern)
            .map_err(|e| Error::Validation(format!("bad pattern {pattern:?}: {e}")))?;
    }
    let matcher = builder
        .build()
        .map_err(|e| Error::Validation(format!("cannot compile patterns: {e}")))?;
    Ok(Some(matcher))
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}
