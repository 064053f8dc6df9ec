//! Cadence-based snapshot scheduling
//!
//! Fires a snapshot whenever the configured cadence elapses, then applies
//! retention. The loop polls coarsely (once a minute) rather than sleeping
//! the full cadence so stop requests are honored promptly.

use crate::SnapshotService;
use snapvault_core::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Parse a cadence expression like "2h", "30m" or "1d".
///
/// Whitespace and case are ignored. Anything else, including a zero
/// amount, yields `None`.
pub fn parse_cadence(expr: &str) -> Option<Duration> {
    let expr = expr.trim().to_ascii_lowercase();
    if !expr.is_ascii() {
        return None;
    }
    let (amount, unit) = expr.split_at(expr.len().checked_sub(1)?);
    let amount: u64 = amount.parse().ok()?;
    if amount == 0 {
        return None;
    }
    let secs = match unit {
        "m" => amount.checked_mul(60)?,
        "h" => amount.checked_mul(3600)?,
        "d" => amount.checked_mul(86_400)?,
        _ => return None,
    };
    Some(Duration::from_secs(secs))
}

pub struct Scheduler {
    cadence: Duration,
    service: Arc<dyn SnapshotService>,
    stop_tx: Option<tokio::sync::watch::Sender<bool>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl Scheduler {
    /// Build a scheduler from a cadence expression.
    pub fn new(expr: &str, service: Arc<dyn SnapshotService>) -> Result<Self> {
        let cadence = parse_cadence(expr)
            .ok_or_else(|| Error::Validation(format!("invalid schedule cadence {expr:?}")))?;
        Ok(Self {
            cadence,
            service,
            stop_tx: None,
            task: None,
        })
    }

    /// Spawn the scheduling loop. The first snapshot fires one full
    /// cadence after start, not immediately.
    pub fn start(&mut self) -> Result<()> {
        if self.task.is_some() {
            return Err(Error::InvalidState("scheduler already running".into()));
        }

        let (stop_tx, mut stop_rx) = tokio::sync::watch::channel(false);
        self.stop_tx = Some(stop_tx);

        let cadence = self.cadence;
        let service = Arc::clone(&self.service);
        self.task = Some(tokio::spawn(async move {
            let mut next_fire = Instant::now() + cadence;
            let mut tick = tokio::time::interval(Duration::from_secs(60));
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        if Instant::now() < next_fire {
                            continue;
                        }
                        // Recomputed unconditionally so a failing engine
                        // retries next cadence instead of every minute.
                        next_fire = Instant::now() + cadence;

                        let service = Arc::clone(&service);
                        let outcome = tokio::task::spawn_blocking(move || {
                            run_scheduled(service.as_ref())
                        })
                        .await;
                        if let Err(e) = outcome {
                            tracing::error!(error = %e, "scheduled snapshot task panicked");
                        }
                    }
                    _ = stop_rx.changed() => break,
                }
            }
            tracing::debug!("scheduler loop stopped");
        }));

        tracing::info!(cadence_secs = self.cadence.as_secs(), "scheduler started");
        Ok(())
    }

    /// Stop the loop and wait briefly for it to drain.
    pub async fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
        if let Some(task) = self.task.take() {
            if tokio::time::timeout(Duration::from_secs(5), task).await.is_err() {
                tracing::warn!("scheduler loop did not stop in time");
            }
        }
    }
}

fn run_scheduled(service: &dyn SnapshotService) {
    match service.trigger_snapshot("Scheduled snapshot", &["scheduled", "automatic"]) {
        Ok(snapshot_id) => {
            tracing::info!(%snapshot_id, "scheduled snapshot created");
            // Retention failures never abort the schedule.
            if let Err(e) = service.apply_retention() {
                tracing::warn!(error = %e, "retention after scheduled snapshot failed");
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "scheduled snapshot failed, will retry next cadence");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn parses_common_cadences() {
        assert_eq!(parse_cadence("2h"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_cadence("30m"), Some(Duration::from_secs(1800)));
        assert_eq!(parse_cadence("1d"), Some(Duration::from_secs(86_400)));
        assert_eq!(parse_cadence(" 1H "), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn rejects_malformed_cadences() {
        assert_eq!(parse_cadence(""), None);
        assert_eq!(parse_cadence("abc"), None);
        assert_eq!(parse_cadence("5x"), None);
        assert_eq!(parse_cadence("h"), None);
        assert_eq!(parse_cadence("0m"), None);
        assert_eq!(parse_cadence("-1h"), None);
    }

    struct CountingService {
        snapshots: Mutex<usize>,
        retentions: Mutex<usize>,
        fail_snapshot: bool,
    }

    impl SnapshotService for CountingService {
        fn trigger_snapshot(&self, _message: &str, _tags: &[&str]) -> Result<String> {
            if self.fail_snapshot {
                return Err(Error::Engine("down".into()));
            }
            *self.snapshots.lock() += 1;
            Ok("aabbccdd".to_string())
        }

        fn apply_retention(&self) -> Result<Vec<String>> {
            *self.retentions.lock() += 1;
            Ok(Vec::new())
        }
    }

    #[test]
    fn retention_follows_successful_snapshot() {
        let service = CountingService {
            snapshots: Mutex::new(0),
            retentions: Mutex::new(0),
            fail_snapshot: false,
        };
        run_scheduled(&service);
        assert_eq!(*service.snapshots.lock(), 1);
        assert_eq!(*service.retentions.lock(), 1);
    }

    #[test]
    fn failed_snapshot_skips_retention() {
        let service = CountingService {
            snapshots: Mutex::new(0),
            retentions: Mutex::new(0),
            fail_snapshot: true,
        };
        run_scheduled(&service);
        assert_eq!(*service.snapshots.lock(), 0);
        assert_eq!(*service.retentions.lock(), 0);
    }

    #[test]
    fn bad_cadence_fails_construction() {
        struct Noop;
        impl SnapshotService for Noop {
            fn trigger_snapshot(&self, _: &str, _: &[&str]) -> Result<String> {
                Ok(String::new())
            }
            fn apply_retention(&self) -> Result<Vec<String>> {
                Ok(Vec::new())
            }
        }
        assert!(Scheduler::new("soon", Arc::new(Noop)).is_err());
    }
}
