//! End-to-end workflows against an in-memory engine and a real
//! SQLite-backed metadata store.

mod common;

use common::MockEngine;
use snapvault_core::{BackupConfig, ChangeType, MonitorSettings, RetentionPolicy};
use snapvault_engine::SnapshotDiff;
use snapvault_manager::{
    BackupOrchestrator, ChangeKind, FileMonitor, RestoreOptions, SnapshotService,
};
use snapvault_metadata::MetadataStore;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

struct Fixture {
    orchestrator: Arc<BackupOrchestrator>,
    engine: Arc<MockEngine>,
    store: Arc<MetadataStore>,
    _tmp: TempDir,
}

fn fixture_with(retention: RetentionPolicy, exclude_patterns: Vec<String>) -> Fixture {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("source");
    std::fs::create_dir_all(&source).unwrap();
    std::fs::write(source.join("notes.txt"), b"notes").unwrap();
    std::fs::write(source.join("report.md"), b"# report").unwrap();
    std::fs::write(source.join("scratch.tmp"), b"scratch").unwrap();

    let config = BackupConfig {
        name: "test".to_string(),
        source_paths: vec![source],
        repository: tmp.path().join("repo"),
        schedule: None,
        retention,
        password_file: None,
        metadata_dir: None,
        exclude_patterns,
        include_patterns: Vec::new(),
        monitor: MonitorSettings::default(),
    };

    let engine = Arc::new(MockEngine::new());
    let store = Arc::new(MetadataStore::open(&tmp.path().join("meta")).unwrap());
    let orchestrator = Arc::new(
        BackupOrchestrator::new(config, engine.clone(), store.clone()).unwrap(),
    );

    Fixture {
        orchestrator,
        engine,
        store,
        _tmp: tmp,
    }
}

fn fixture() -> Fixture {
    fixture_with(RetentionPolicy::default(), Vec::new())
}

#[test]
fn lineage_links_successive_snapshots() {
    let fx = fixture();

    let first = fx
        .orchestrator
        .snapshot(Some("initial import"), &["baseline".to_string()], true)
        .unwrap();
    let first_meta = fx.store.get(&first).unwrap();
    assert_eq!(first_meta.parent_snapshot, None);
    assert_eq!(first_meta.message.as_deref(), Some("initial import"));
    assert_eq!(first_meta.tags, vec!["baseline"]);

    // The first snapshot records the walked source tree as additions.
    let mut paths: Vec<&str> = first_meta
        .file_changes
        .iter()
        .map(|c| c.path.as_str())
        .collect();
    paths.sort();
    assert_eq!(paths, vec!["notes.txt", "report.md", "scratch.tmp"]);
    assert!(first_meta
        .file_changes
        .iter()
        .all(|c| c.change_type == ChangeType::Added && c.size_bytes.is_some()));

    *fx.engine.next_diff.lock() = SnapshotDiff {
        added: vec!["drafts/new.txt".to_string()],
        removed: vec!["report.md".to_string()],
        modified: vec!["notes.txt".to_string()],
    };
    let second = fx.orchestrator.snapshot(None, &[], true).unwrap();
    let second_meta = fx.store.get(&second).unwrap();
    assert_eq!(second_meta.parent_snapshot.as_deref(), Some(first.as_str()));
    assert_eq!(second_meta.message, None);
    assert_eq!(second_meta.file_changes.len(), 3);
}

#[test]
fn first_snapshot_walk_honors_excludes() {
    let fx = fixture_with(RetentionPolicy::default(), vec!["*.tmp".to_string()]);
    let id = fx.orchestrator.snapshot(None, &[], true).unwrap();
    let meta = fx.store.get(&id).unwrap();

    let paths: Vec<&str> = meta.file_changes.iter().map(|c| c.path.as_str()).collect();
    assert!(!paths.contains(&"scratch.tmp"));
    assert!(paths.contains(&"notes.txt"));
}

#[test]
fn engine_failure_persists_nothing() {
    let fx = fixture();
    *fx.engine.fail_create.lock() = true;

    assert!(fx.orchestrator.snapshot(None, &[], true).is_err());
    assert_eq!(fx.store.stats().total_snapshots, 0);
    assert!(fx.engine.snapshot_ids().is_empty());
}

#[test]
fn retention_removes_oldest_and_reconciles_metadata() {
    let policy = RetentionPolicy {
        keep_last: 3,
        keep_hourly: 0,
        keep_daily: 0,
        keep_weekly: 0,
        keep_monthly: 0,
        keep_yearly: 0,
    };
    let fx = fixture_with(policy, Vec::new());

    let mut ids = Vec::new();
    for i in 0..10 {
        let message = format!("snap {i}");
        ids.push(
            fx.orchestrator
                .snapshot(Some(message.as_str()), &[], false)
                .unwrap(),
        );
    }

    let removed = fx.orchestrator.forget(&[], false).unwrap();
    assert_eq!(removed, ids[..7].to_vec());
    assert_eq!(fx.engine.snapshot_ids(), ids[7..].to_vec());

    for id in &ids[..7] {
        assert!(fx.store.get(id).is_none());
    }
    for id in &ids[7..] {
        assert!(fx.store.get(id).is_some());
    }
}

#[test]
fn retention_dry_run_removes_nothing() {
    let policy = RetentionPolicy {
        keep_last: 1,
        ..RetentionPolicy::default()
    };
    let fx = fixture_with(policy, Vec::new());

    for _ in 0..3 {
        fx.orchestrator.snapshot(None, &[], false).unwrap();
    }
    let would_remove = fx.orchestrator.forget(&[], true).unwrap();
    assert_eq!(would_remove.len(), 2);
    assert_eq!(fx.engine.snapshot_ids().len(), 3);
    assert_eq!(fx.store.stats().total_snapshots, 3);
}

#[test]
fn forget_resolves_refs_before_removal() {
    let fx = fixture();
    let first = fx.orchestrator.snapshot(None, &[], false).unwrap();
    let second = fx.orchestrator.snapshot(None, &[], false).unwrap();
    let third = fx.orchestrator.snapshot(None, &[], false).unwrap();

    // HEAD~1 is the second-newest snapshot.
    let removed = fx
        .orchestrator
        .forget(&["HEAD~1".to_string()], false)
        .unwrap();
    assert_eq!(removed, vec![second.clone()]);
    assert_eq!(fx.engine.snapshot_ids(), vec![first, third]);
    assert!(fx.store.get(&second).is_none());
}

#[test]
fn metadata_diff_is_symmetric() {
    let fx = fixture();
    let first = fx.orchestrator.snapshot(None, &[], false).unwrap();
    *fx.engine.next_diff.lock() = SnapshotDiff {
        added: vec!["drafts/new.txt".to_string()],
        ..SnapshotDiff::default()
    };
    let second = fx.orchestrator.snapshot(None, &[], false).unwrap();

    let forward = fx.orchestrator.diff(&first, &second).unwrap();
    let backward = fx.orchestrator.diff(&second, &first).unwrap();

    let added: Vec<&str> = forward
        .iter()
        .filter(|c| c.change_type == ChangeType::Added)
        .map(|c| c.path.as_str())
        .collect();
    let deleted: Vec<&str> = backward
        .iter()
        .filter(|c| c.change_type == ChangeType::Deleted)
        .map(|c| c.path.as_str())
        .collect();
    assert_eq!(added, deleted);
    assert_eq!(added, vec!["drafts/new.txt"]);
}

#[test]
fn restore_refuses_occupied_target() {
    let fx = fixture();
    let id = fx.orchestrator.snapshot(None, &[], false).unwrap();

    let target = fx._tmp.path().join("restore");
    std::fs::create_dir_all(&target).unwrap();
    std::fs::write(target.join("existing.txt"), b"x").unwrap();

    let err = fx
        .orchestrator
        .restore("latest", &target, &RestoreOptions::default())
        .unwrap_err();
    assert!(err.to_string().contains("not empty"));

    let mut options = RestoreOptions::default();
    options.overwrite = true;
    fx.orchestrator.restore("latest", &target, &options).unwrap();

    let restores = fx.engine.restores.lock();
    assert_eq!(restores.len(), 1);
    assert_eq!(restores[0].snapshot_id, id);
    assert!(restores[0].verify);
}

#[test]
fn show_resolves_symbolic_refs() {
    let fx = fixture();
    fx.orchestrator
        .snapshot(Some("keep me"), &[], false)
        .unwrap();

    let meta = fx.orchestrator.show("latest").unwrap().unwrap();
    assert_eq!(meta.message.as_deref(), Some("keep me"));

    let err = fx.orchestrator.show("HEAD~5").unwrap_err();
    assert!(err.to_string().contains("HEAD~5"));
}

#[test]
fn status_reflects_engine_and_store() {
    let fx = fixture();
    fx.orchestrator.snapshot(None, &[], false).unwrap();
    fx.orchestrator.snapshot(None, &[], false).unwrap();

    let status = fx.orchestrator.status();
    assert!(status.repository_healthy);
    assert_eq!(status.total_snapshots, 2);
    assert_eq!(status.tracked_snapshots, 2);
    assert_eq!(status.pending_changes, 0);
    assert!(status.last_snapshot.is_some());
    assert_eq!(status.recent.len(), 2);
}

#[test]
fn search_matches_message_text() {
    let fx = fixture();
    fx.orchestrator
        .snapshot(Some("quarterly report"), &[], false)
        .unwrap();
    fx.orchestrator
        .snapshot(Some("scratch work"), &[], false)
        .unwrap();

    let hits = fx.orchestrator.search("quarterly", 10);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].message.as_deref(), Some("quarterly report"));
}

#[test]
fn monitor_force_snapshot_runs_full_pipeline() {
    let fx = fixture();
    let ledger = fx.orchestrator.ledger();
    let service: Arc<dyn SnapshotService> = fx.orchestrator.clone();
    let monitor = FileMonitor::new(
        MonitorSettings::default(),
        Vec::new(),
        service,
        ledger.clone(),
    );

    ledger.record(PathBuf::from("notes.txt"), ChangeKind::Modified);
    ledger.record(PathBuf::from("report.md"), ChangeKind::Deleted);

    let id = monitor.force_snapshot(None).unwrap();
    let meta = fx.store.get(&id).unwrap();
    assert_eq!(
        meta.message.as_deref(),
        Some("Manual snapshot: 1 modified, 1 deleted")
    );
    assert_eq!(meta.tags, vec!["manual", "monitor"]);
    assert_eq!(ledger.pending_count(), 0);
}
