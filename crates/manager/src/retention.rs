//! Retention policy evaluation
//!
//! The engine owns the bucket semantics (most-recent N plus at most one
//! per hour/day/week/month/year going backward); this component only maps
//! the policy value onto the engine call and reconciles metadata for
//! whatever the engine removed.

use snapvault_core::{Result, RetentionPolicy};
use snapvault_engine::BackupEngine;
use snapvault_metadata::MetadataStore;
use std::sync::Arc;

pub struct RetentionEngine {
    engine: Arc<dyn BackupEngine>,
    store: Arc<MetadataStore>,
}

impl RetentionEngine {
    pub fn new(engine: Arc<dyn BackupEngine>, store: Arc<MetadataStore>) -> Self {
        Self { engine, store }
    }

    /// Apply the policy and delete metadata for every removed snapshot.
    ///
    /// A metadata record that fails to delete is left dangling for a later
    /// forget run to reconcile; it is never treated as a retention failure.
    pub fn apply(&self, policy: &RetentionPolicy, dry_run: bool) -> Result<Vec<String>> {
        let removed = self.engine.forget_by_policy(policy, dry_run)?;

        if dry_run {
            tracing::info!(count = removed.len(), "retention dry run");
            return Ok(removed);
        }

        for snapshot_id in &removed {
            if !self.store.delete(snapshot_id) {
                tracing::warn!(
                    snapshot_id,
                    "no metadata deleted for removed snapshot; dangling record \
                     will be reconciled by a later forget run"
                );
            }
        }

        if !removed.is_empty() {
            tracing::info!(count = removed.len(), "retention removed snapshots");
        }
        Ok(removed)
    }
}
