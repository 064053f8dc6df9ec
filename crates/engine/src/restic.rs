//! Restic subprocess engine
//!
//! Invokes the `restic` binary with `--json` and parses its output into the
//! engine interface types. The repository location and credentials are
//! passed through the environment (`RESTIC_REPOSITORY`,
//! `RESTIC_PASSWORD_FILE`); when no password file is configured the
//! process-inherited `RESTIC_PASSWORD` is left in place.

use crate::{BackupEngine, BackupSummary, RestoreRequest, SnapshotDiff, SnapshotRequest};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use snapvault_core::{EngineSnapshot, Error, RepoStats, Result, RetentionPolicy};
use std::path::{Path, PathBuf};
use std::process::Command;

pub struct ResticEngine {
    repository: PathBuf,
    password_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct ResticMessage {
    message_type: String,
    #[serde(default)]
    snapshot_id: Option<String>,
    #[serde(default)]
    files_new: u64,
    #[serde(default)]
    files_changed: u64,
    #[serde(default)]
    files_unmodified: u64,
    #[serde(default)]
    data_added: u64,
    #[serde(default)]
    total_files_processed: u64,
    #[serde(default)]
    total_bytes_processed: u64,
    #[serde(default)]
    total_duration: f64,
    // diff "change" messages
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    modifier: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResticSnapshot {
    id: String,
    time: DateTime<Utc>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    paths: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ForgetGroup {
    #[serde(default)]
    remove: Option<Vec<ForgetEntry>>,
}

#[derive(Debug, Deserialize)]
struct ForgetEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ResticStats {
    #[serde(default)]
    total_size: u64,
    #[serde(default)]
    total_file_count: u64,
}

impl ResticEngine {
    /// Open the engine against a repository, initializing it on first use.
    pub fn open(repository: &Path, password_file: Option<&Path>) -> Result<Self> {
        let engine = Self {
            repository: repository.to_path_buf(),
            password_file: password_file.map(Path::to_path_buf),
        };
        engine.ensure_repository()?;
        Ok(engine)
    }

    /// Construct without probing the repository. Used by `init`.
    pub fn new_unchecked(repository: &Path, password_file: Option<&Path>) -> Self {
        Self {
            repository: repository.to_path_buf(),
            password_file: password_file.map(Path::to_path_buf),
        }
    }

    /// Initialize a fresh repository.
    pub fn init_repository(&self) -> Result<()> {
        if let Some(parent) = self.repository.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Engine(format!("cannot create repository parent: {e}")))?;
        }
        self.run(&["init"])?;
        tracing::info!(repository = %self.repository.display(), "initialized repository");
        Ok(())
    }

    fn ensure_repository(&self) -> Result<()> {
        // `cat config` fails on a missing or uninitialized repository.
        if self.run(&["cat", "config"]).is_err() {
            tracing::info!(
                repository = %self.repository.display(),
                "repository not found, initializing"
            );
            self.init_repository()?;
        }
        Ok(())
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        self.run_owned(&args.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    }

    fn run_owned(&self, args: &[String]) -> Result<String> {
        tracing::debug!(?args, "running restic");

        let mut command = Command::new("restic");
        command.args(args);
        command.env("RESTIC_REPOSITORY", &self.repository);
        if let Some(password_file) = &self.password_file {
            command.env("RESTIC_PASSWORD_FILE", password_file);
        }

        let output = command.output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Engine("restic binary not found; install restic first".to_string())
            } else {
                Error::Engine(format!("failed to spawn restic: {e}"))
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Engine(format!(
                "restic {} exited with {}: {}",
                args.first().map(String::as_str).unwrap_or(""),
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl BackupEngine for ResticEngine {
    fn create_snapshot(&self, request: &SnapshotRequest) -> Result<BackupSummary> {
        let mut args: Vec<String> = vec!["backup".to_string()];
        for path in &request.paths {
            args.push(path.display().to_string());
        }
        for tag in &request.tags {
            args.push("--tag".to_string());
            args.push(tag.clone());
        }
        for pattern in &request.exclude_patterns {
            args.push("--exclude".to_string());
            args.push(pattern.clone());
        }
        for pattern in &request.include_patterns {
            args.push("--include".to_string());
            args.push(pattern.clone());
        }
        args.push("--json".to_string());

        let stdout = self.run_owned(&args)?;

        // Backup output is one JSON message per line; the summary carries
        // the snapshot id.
        for line in stdout.lines().rev() {
            let Ok(message) = serde_json::from_str::<ResticMessage>(line) else {
                continue;
            };
            if message.message_type == "summary" {
                let snapshot_id = message
                    .snapshot_id
                    .ok_or_else(|| Error::Engine("summary lacks a snapshot id".to_string()))?;
                return Ok(BackupSummary {
                    snapshot_id,
                    files_new: message.files_new,
                    files_changed: message.files_changed,
                    files_unmodified: message.files_unmodified,
                    data_added: message.data_added,
                    total_files_processed: message.total_files_processed,
                    total_bytes_processed: message.total_bytes_processed,
                    total_duration: message.total_duration,
                });
            }
        }

        Err(Error::Engine("backup produced no summary message".to_string()))
    }

    fn restore_snapshot(&self, request: &RestoreRequest) -> Result<()> {
        let mut args = vec![
            "restore".to_string(),
            request.snapshot_id.clone(),
            "--target".to_string(),
            request.target.display().to_string(),
        ];
        for path in &request.selective_paths {
            args.push("--include".to_string());
            args.push(path.clone());
        }
        for pattern in &request.exclude_patterns {
            args.push("--exclude".to_string());
            args.push(pattern.clone());
        }
        for pattern in &request.include_patterns {
            args.push("--include".to_string());
            args.push(pattern.clone());
        }
        if request.verify {
            args.push("--verify".to_string());
        }

        self.run_owned(&args)?;
        Ok(())
    }

    fn list_snapshots(&self) -> Result<Vec<EngineSnapshot>> {
        let stdout = self.run(&["snapshots", "--json"])?;
        let raw: Vec<ResticSnapshot> = serde_json::from_str(stdout.trim())
            .map_err(|e| Error::Engine(format!("malformed snapshot listing: {e}")))?;

        let mut listing: Vec<EngineSnapshot> = raw
            .into_iter()
            .map(|s| EngineSnapshot {
                id: s.id,
                time: s.time,
                tags: s.tags.unwrap_or_default(),
                paths: s.paths.unwrap_or_default(),
            })
            .collect();
        listing.sort_by_key(|s| s.time);
        Ok(listing)
    }

    fn diff_snapshots(&self, a: &str, b: &str) -> Result<SnapshotDiff> {
        let stdout = self.run(&["diff", a, b, "--json"])?;

        let mut diff = SnapshotDiff::default();
        for line in stdout.lines() {
            let Ok(message) = serde_json::from_str::<ResticMessage>(line) else {
                continue;
            };
            if message.message_type != "change" {
                continue;
            }
            let (Some(path), Some(modifier)) = (message.path, message.modifier) else {
                continue;
            };
            match modifier.as_str() {
                "+" => diff.added.push(path),
                "-" => diff.removed.push(path),
                // Content, metadata or type changes all count as modified.
                m if m.contains('M') || m.contains('U') || m.contains('T') => {
                    diff.modified.push(path)
                }
                _ => {}
            }
        }
        Ok(diff)
    }

    fn forget_by_policy(&self, policy: &RetentionPolicy, dry_run: bool) -> Result<Vec<String>> {
        let mut args = vec!["forget".to_string()];
        for (flag, count) in [
            ("--keep-last", policy.keep_last),
            ("--keep-hourly", policy.keep_hourly),
            ("--keep-daily", policy.keep_daily),
            ("--keep-weekly", policy.keep_weekly),
            ("--keep-monthly", policy.keep_monthly),
            ("--keep-yearly", policy.keep_yearly),
        ] {
            if count > 0 {
                args.push(flag.to_string());
                args.push(count.to_string());
            }
        }
        if args.len() == 1 {
            return Err(Error::Engine(
                "retention policy has no non-zero buckets".to_string(),
            ));
        }
        if dry_run {
            args.push("--dry-run".to_string());
        } else {
            args.push("--prune".to_string());
        }
        args.push("--json".to_string());

        let stdout = self.run_owned(&args)?;
        let groups: Vec<ForgetGroup> = serde_json::from_str(stdout.trim())
            .map_err(|e| Error::Engine(format!("malformed forget result: {e}")))?;

        let mut removed = Vec::new();
        for group in groups {
            if let Some(entries) = group.remove {
                removed.extend(entries.into_iter().map(|e| e.id));
            }
        }
        Ok(removed)
    }

    fn forget_snapshots(&self, ids: &[String], dry_run: bool) -> Result<Vec<String>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut args = vec!["forget".to_string()];
        args.extend(ids.iter().cloned());
        if dry_run {
            args.push("--dry-run".to_string());
        } else {
            args.push("--prune".to_string());
        }
        self.run_owned(&args)?;
        Ok(ids.to_vec())
    }

    fn repo_stats(&self) -> Result<RepoStats> {
        let stdout = self.run(&["stats", "--json"])?;
        let stats: ResticStats = serde_json::from_str(stdout.trim())
            .map_err(|e| Error::Engine(format!("malformed repository stats: {e}")))?;
        Ok(RepoStats {
            total_size: stats.total_size,
            total_file_count: stats.total_file_count,
        })
    }

    fn check_health(&self) -> Result<bool> {
        match self.run(&["check"]) {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!(error = %e, "repository check failed");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_summary_parses_from_json_lines() {
        let line = r#"{"message_type":"summary","files_new":3,"files_changed":1,"files_unmodified":7,"data_added":4096,"total_files_processed":11,"total_bytes_processed":8192,"total_duration":1.5,"snapshot_id":"ab12cd34"}"#;
        let message: ResticMessage = serde_json::from_str(line).unwrap();
        assert_eq!(message.message_type, "summary");
        assert_eq!(message.snapshot_id.as_deref(), Some("ab12cd34"));
        assert_eq!(message.files_new, 3);
        assert_eq!(message.data_added, 4096);
    }

    #[test]
    fn diff_change_message_parses() {
        let line = r#"{"message_type":"change","path":"/src/main.rs","modifier":"M"}"#;
        let message: ResticMessage = serde_json::from_str(line).unwrap();
        assert_eq!(message.path.as_deref(), Some("/src/main.rs"));
        assert_eq!(message.modifier.as_deref(), Some("M"));
    }

    #[test]
    fn snapshot_listing_parses_and_defaults_tags() {
        let json = r#"[
            {"id":"aaaa1111","time":"2024-01-01T00:00:00Z"},
            {"id":"bbbb2222","time":"2024-01-02T00:00:00Z","tags":["auto"],"paths":["/data"]}
        ]"#;
        let raw: Vec<ResticSnapshot> = serde_json::from_str(json).unwrap();
        assert_eq!(raw.len(), 2);
        assert!(raw[0].tags.is_none());
        assert_eq!(raw[1].tags.as_ref().unwrap()[0], "auto");
    }

    #[test]
    fn forget_groups_collect_removed_ids() {
        let json = r#"[{"remove":[{"id":"dead"},{"id":"beef"}]},{"keep":null}]"#;
        let groups: Vec<ForgetGroup> = serde_json::from_str(json).unwrap();
        let removed: Vec<String> = groups
            .into_iter()
            .flat_map(|g| g.remove.unwrap_or_default())
            .map(|e| e.id)
            .collect();
        assert_eq!(removed, vec!["dead", "beef"]);
    }
}
