//! Filesystem change monitoring
//!
//! Watches the configured source trees, coalesces raw notify events into
//! one pending change per path, and turns the accumulated set into
//! automatic snapshots once the debounce window has settled and either a
//! change threshold or a time interval is reached.

use crate::SnapshotService;
use chrono::{DateTime, Utc};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use snapvault_core::{Error, MonitorSettings, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What happened to a path since the last snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Moved,
}

#[derive(Debug, Default)]
struct LedgerState {
    changes: HashMap<PathBuf, ChangeKind>,
    last_change: Option<Instant>,
    last_change_at: Option<DateTime<Utc>>,
    last_auto_snapshot: Option<Instant>,
    last_auto_snapshot_at: Option<DateTime<Utc>>,
}

/// Pending-change accumulator shared between the watcher callback, the
/// evaluation loop and status queries.
///
/// Successive events against the same path coalesce: a create followed by
/// a delete cancels out, a delete followed by a create collapses to a
/// modification, and modifications to a still-new file stay an addition.
#[derive(Debug, Default)]
pub struct ChangeLedger {
    state: Mutex<LedgerState>,
}

impl ChangeLedger {
    pub fn record(&self, path: PathBuf, kind: ChangeKind) {
        let mut state = self.state.lock();
        match (state.changes.get(&path).copied(), kind) {
            (Some(ChangeKind::Added), ChangeKind::Deleted) => {
                state.changes.remove(&path);
            }
            (Some(ChangeKind::Added), ChangeKind::Modified) => {}
            (Some(ChangeKind::Deleted), ChangeKind::Added) => {
                state.changes.insert(path, ChangeKind::Modified);
            }
            (_, kind) => {
                state.changes.insert(path, kind);
            }
        }
        state.last_change = Some(Instant::now());
        state.last_change_at = Some(Utc::now());
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().changes.len()
    }

    /// Short human summary of the pending set, e.g. "3 added, 1 deleted".
    pub fn summarize(&self) -> String {
        let state = self.state.lock();
        let mut counts = [0usize; 4];
        for kind in state.changes.values() {
            let slot = match kind {
                ChangeKind::Added => 0,
                ChangeKind::Modified => 1,
                ChangeKind::Deleted => 2,
                ChangeKind::Moved => 3,
            };
            counts[slot] += 1;
        }
        let labels = ["added", "modified", "deleted", "moved"];
        let parts: Vec<String> = counts
            .iter()
            .zip(labels)
            .filter(|(n, _)| **n > 0)
            .map(|(n, label)| format!("{n} {label}"))
            .collect();
        if parts.is_empty() {
            "no changes".to_string()
        } else {
            parts.join(", ")
        }
    }

    /// Drop the pending set and stamp the auto-snapshot clock. Called only
    /// after a snapshot succeeded so failures keep the set for retry.
    fn clear_and_mark(&self) {
        let mut state = self.state.lock();
        state.changes.clear();
        state.last_auto_snapshot = Some(Instant::now());
        state.last_auto_snapshot_at = Some(Utc::now());
    }

    fn snapshot_state(&self) -> (usize, Option<Duration>, Option<Duration>) {
        let state = self.state.lock();
        (
            state.changes.len(),
            state.last_change.map(|t| t.elapsed()),
            state.last_auto_snapshot.map(|t| t.elapsed()),
        )
    }
}

/// Point-in-time view of the monitor for status output.
#[derive(Debug, Clone)]
pub struct MonitorStatus {
    pub running: bool,
    pub pending_changes: usize,
    pub last_change: Option<DateTime<Utc>>,
    pub last_auto_snapshot: Option<DateTime<Utc>>,
    pub sources: Vec<PathBuf>,
    pub settings: MonitorSettings,
}

/// Decide whether the pending set warrants a snapshot and fire it.
///
/// The debounce window gates everything: no trigger fires while events are
/// still arriving. Past that, precedence is the change threshold, then the
/// first-ever snapshot for a non-empty set, then the time interval. The
/// snapshot call runs with no ledger lock held; the set is cleared only on
/// success.
fn evaluate_trigger(
    ledger: &ChangeLedger,
    settings: &MonitorSettings,
    service: &dyn SnapshotService,
) -> Result<Option<String>> {
    let (pending, since_change, since_auto) = ledger.snapshot_state();

    let reason = match since_change {
        None => return Ok(None),
        Some(elapsed) if elapsed < Duration::from_secs(settings.debounce_secs) => {
            return Ok(None);
        }
        Some(_) => {
            if pending >= settings.auto_snapshot_threshold {
                "change threshold"
            } else if since_auto.is_none() && pending > 0 {
                "first snapshot"
            } else if pending > 0
                && since_auto
                    .map(|e| e >= Duration::from_secs(settings.auto_snapshot_interval_secs))
                    .unwrap_or(false)
            {
                "time interval"
            } else {
                return Ok(None);
            }
        }
    };

    let message = format!("Auto snapshot: {} ({reason})", ledger.summarize());
    tracing::info!(reason, pending, "change monitor triggering snapshot");
    match service.trigger_snapshot(&message, &["auto", "monitor"]) {
        Ok(snapshot_id) => {
            ledger.clear_and_mark();
            Ok(Some(snapshot_id))
        }
        Err(e) => {
            tracing::warn!(error = %e, "automatic snapshot failed, keeping pending changes");
            Err(e)
        }
    }
}

pub struct FileMonitor {
    settings: MonitorSettings,
    sources: Vec<PathBuf>,
    service: Arc<dyn SnapshotService>,
    ledger: Arc<ChangeLedger>,
    watcher: Option<RecommendedWatcher>,
    stop_tx: Option<tokio::sync::watch::Sender<bool>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl FileMonitor {
    pub fn new(
        settings: MonitorSettings,
        sources: Vec<PathBuf>,
        service: Arc<dyn SnapshotService>,
        ledger: Arc<ChangeLedger>,
    ) -> Self {
        Self {
            settings,
            sources,
            service,
            ledger,
            watcher: None,
            stop_tx: None,
            task: None,
        }
    }

    /// Begin watching and spawn the evaluation loop.
    pub fn start(&mut self) -> Result<()> {
        if self.task.is_some() {
            return Err(Error::InvalidState("monitor already running".into()));
        }

        let matcher = build_ignore_matcher(&self.settings.ignore)?;
        let ledger = Arc::clone(&self.ledger);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => handle_event(&ledger, matcher.as_ref(), event),
                Err(e) => tracing::warn!(error = %e, "watch error"),
            }
        })
        .map_err(|e| Error::InvalidState(format!("cannot create watcher: {e}")))?;

        for source in &self.sources {
            watcher
                .watch(source, RecursiveMode::Recursive)
                .map_err(|e| {
                    Error::InvalidState(format!("cannot watch {}: {e}", source.display()))
                })?;
        }
        self.watcher = Some(watcher);

        let (stop_tx, mut stop_rx) = tokio::sync::watch::channel(false);
        self.stop_tx = Some(stop_tx);

        let ledger = Arc::clone(&self.ledger);
        let service = Arc::clone(&self.service);
        let settings = self.settings.clone();
        self.task = Some(tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(1));
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let ledger = Arc::clone(&ledger);
                        let service = Arc::clone(&service);
                        let settings = settings.clone();
                        // Snapshot creation blocks on the engine binary.
                        let outcome = tokio::task::spawn_blocking(move || {
                            evaluate_trigger(&ledger, &settings, service.as_ref())
                        })
                        .await;
                        match outcome {
                            Ok(Ok(_)) | Ok(Err(_)) => {}
                            Err(e) => tracing::error!(error = %e, "monitor evaluation panicked"),
                        }
                    }
                    _ = stop_rx.changed() => break,
                }
            }
            tracing::debug!("change monitor loop stopped");
        }));

        tracing::info!(
            sources = self.sources.len(),
            threshold = self.settings.auto_snapshot_threshold,
            "change monitor started"
        );
        Ok(())
    }

    /// Snapshot the pending set immediately, bypassing debounce and
    /// thresholds. Fails with `InvalidState` when nothing is pending.
    pub fn force_snapshot(&self, message: Option<&str>) -> Result<String> {
        if self.ledger.pending_count() == 0 {
            return Err(Error::InvalidState("no pending changes to snapshot".into()));
        }
        let message = match message {
            Some(m) => m.to_string(),
            None => format!("Manual snapshot: {}", self.ledger.summarize()),
        };
        let snapshot_id = self.service.trigger_snapshot(&message, &["manual", "monitor"])?;
        self.ledger.clear_and_mark();
        Ok(snapshot_id)
    }

    pub fn status(&self) -> MonitorStatus {
        let state = self.ledger.state.lock();
        MonitorStatus {
            running: self.task.is_some(),
            pending_changes: state.changes.len(),
            last_change: state.last_change_at,
            last_auto_snapshot: state.last_auto_snapshot_at,
            sources: self.sources.clone(),
            settings: self.settings.clone(),
        }
    }

    /// Stop watching and wait briefly for the loop to drain.
    pub async fn stop(&mut self) {
        self.watcher = None;
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
        if let Some(task) = self.task.take() {
            if tokio::time::timeout(Duration::from_secs(5), task).await.is_err() {
                tracing::warn!("monitor loop did not stop in time");
            }
        }
    }
}

fn handle_event(ledger: &ChangeLedger, matcher: Option<&Gitignore>, event: notify::Event) {
    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Added,
        EventKind::Remove(_) => ChangeKind::Deleted,
        EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::Moved,
        EventKind::Modify(_) => ChangeKind::Modified,
        _ => return,
    };
    for path in event.paths {
        if let Some(matcher) = matcher {
            if matcher.matched(&path, false).is_ignore() {
                continue;
            }
        }
        ledger.record(path, kind);
    }
}

fn build_ignore_matcher(patterns: &[String]) -> Result<Option<Gitignore>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GitignoreBuilder::new("/");
    for pattern in patterns {
        builder
            .add_line(None, pattern)
            .map_err(|e| Error::Validation(format!("bad ignore pattern {pattern:?}: {e}")))?;
    }
    let matcher = builder
        .build()
        .map_err(|e| Error::Validation(format!("cannot compile ignore patterns: {e}")))?;
    Ok(Some(matcher))
}
