//! In-memory engine double for workflow tests.

use chrono::{Duration, TimeZone, Utc};
use parking_lot::Mutex;
use snapvault_core::{EngineSnapshot, Error, RepoStats, Result, RetentionPolicy};
use snapvault_engine::{
    BackupEngine, BackupSummary, RestoreRequest, SnapshotDiff, SnapshotRequest,
};

pub struct MockEngine {
    snapshots: Mutex<Vec<EngineSnapshot>>,
    counter: Mutex<u64>,
    pub fail_create: Mutex<bool>,
    pub next_diff: Mutex<SnapshotDiff>,
    pub restores: Mutex<Vec<RestoreRequest>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            snapshots: Mutex::new(Vec::new()),
            counter: Mutex::new(0),
            fail_create: Mutex::new(false),
            next_diff: Mutex::new(SnapshotDiff::default()),
            restores: Mutex::new(Vec::new()),
        }
    }

    pub fn snapshot_ids(&self) -> Vec<String> {
        self.snapshots.lock().iter().map(|s| s.id.clone()).collect()
    }
}

impl BackupEngine for MockEngine {
    fn create_snapshot(&self, request: &SnapshotRequest) -> Result<BackupSummary> {
        if *self.fail_create.lock() {
            return Err(Error::Engine("simulated engine failure".into()));
        }
        let mut counter = self.counter.lock();
        *counter += 1;
        let id = format!("{:0>16x}", *counter);

        let mut snapshots = self.snapshots.lock();
        // Deterministic, strictly increasing timestamps.
        let time = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
            + Duration::minutes(*counter as i64);
        snapshots.push(EngineSnapshot {
            id: id.clone(),
            time,
            tags: request.tags.clone(),
            paths: request
                .paths
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
        });

        Ok(BackupSummary {
            snapshot_id: id,
            files_new: 2,
            files_changed: 1,
            files_unmodified: 4,
            data_added: 1024,
            total_files_processed: 7,
            total_bytes_processed: 4096,
            total_duration: 0.5,
        })
    }

    fn restore_snapshot(&self, request: &RestoreRequest) -> Result<()> {
        let known = self
            .snapshots
            .lock()
            .iter()
            .any(|s| s.id == request.snapshot_id);
        if !known {
            return Err(Error::Engine(format!(
                "unknown snapshot {}",
                request.snapshot_id
            )));
        }
        self.restores.lock().push(request.clone());
        Ok(())
    }

    fn list_snapshots(&self) -> Result<Vec<EngineSnapshot>> {
        Ok(self.snapshots.lock().clone())
    }

    fn diff_snapshots(&self, a: &str, b: &str) -> Result<SnapshotDiff> {
        let snapshots = self.snapshots.lock();
        for id in [a, b] {
            if !snapshots.iter().any(|s| s.id == id) {
                return Err(Error::Engine(format!("unknown snapshot {id}")));
            }
        }
        Ok(self.next_diff.lock().clone())
    }

    fn forget_by_policy(&self, policy: &RetentionPolicy, dry_run: bool) -> Result<Vec<String>> {
        // Keep-last only; the bucket logic lives in the real engine.
        let mut snapshots = self.snapshots.lock();
        let keep = policy.keep_last as usize;
        if snapshots.len() <= keep {
            return Ok(Vec::new());
        }
        let cut = snapshots.len() - keep;
        let removed: Vec<String> = snapshots[..cut].iter().map(|s| s.id.clone()).collect();
        if !dry_run {
            snapshots.drain(..cut);
        }
        Ok(removed)
    }

    fn forget_snapshots(&self, ids: &[String], dry_run: bool) -> Result<Vec<String>> {
        let mut snapshots = self.snapshots.lock();
        let removed: Vec<String> = snapshots
            .iter()
            .filter(|s| ids.contains(&s.id))
            .map(|s| s.id.clone())
            .collect();
        if !dry_run {
            snapshots.retain(|s| !ids.contains(&s.id));
        }
        Ok(removed)
    }

    fn repo_stats(&self) -> Result<RepoStats> {
        Ok(RepoStats {
            total_size: 4096 * self.snapshots.lock().len() as u64,
            total_file_count: 7,
        })
    }

    fn check_health(&self) -> Result<bool> {
        Ok(true)
    }
}
