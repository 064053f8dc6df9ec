//! SQLite store for snapshot records and their file-change rows
//!
//! A snapshot record and its file changes form one aggregate: `save`
//! replaces both inside a single transaction, `delete` cascades. All
//! operations serialize behind one connection lock, so a half-written
//! record is never observable. Write failures propagate as
//! `Error::Storage`; read failures degrade to absent/empty with a logged
//! warning so metadata loss never crashes a caller.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use snapvault_core::{ChangeType, Error, FileChange, Result, SnapshotMetadata, SnapshotStats};
use std::path::Path;

pub struct MetadataStore {
    conn: Mutex<Connection>,
}

/// Aggregate store statistics
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub total_snapshots: u64,
    pub total_file_changes: u64,
    /// Per-author snapshot counts, most prolific first
    pub authors: Vec<(String, u64)>,
}

impl MetadataStore {
    /// Open or create the store under the given directory.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .map_err(|e| Error::Storage(format!("cannot create metadata dir: {e}")))?;

        let conn = Connection::open(dir.join("metadata.db"))
            .map_err(|e| Error::Storage(e.to_string()))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                snapshot_id TEXT PRIMARY KEY,
                message TEXT,
                timestamp TEXT NOT NULL,
                author TEXT NOT NULL,
                tags TEXT,
                parent_snapshot TEXT,
                stats TEXT,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS file_changes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                snapshot_id TEXT NOT NULL,
                path TEXT NOT NULL,
                change_type TEXT NOT NULL,
                size_bytes INTEGER,
                checksum TEXT,
                FOREIGN KEY (snapshot_id) REFERENCES snapshots (snapshot_id)
            );

            CREATE INDEX IF NOT EXISTS idx_snapshots_timestamp
                ON snapshots (timestamp DESC);

            CREATE INDEX IF NOT EXISTS idx_file_changes_snapshot
                ON file_changes (snapshot_id);
            "#,
        )
        .map_err(|e| Error::Storage(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Upsert a snapshot record and its file changes atomically.
    ///
    /// Replaces any existing record with the same id, including its
    /// file-change rows. Failures propagate: the caller must not treat the
    /// snapshot as tracked if this errors.
    pub fn save(&self, metadata: &SnapshotMetadata) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Storage(e.to_string()))?;

        tx.execute(
            r#"
            INSERT OR REPLACE INTO snapshots
                (snapshot_id, message, timestamp, author, tags, parent_snapshot, stats)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                metadata.snapshot_id,
                metadata.message,
                metadata.timestamp.to_rfc3339(),
                metadata.author,
                serde_json::to_string(&metadata.tags)
                    .map_err(|e| Error::Storage(e.to_string()))?,
                metadata.parent_snapshot,
                serde_json::to_string(&metadata.stats)
                    .map_err(|e| Error::Storage(e.to_string()))?,
            ],
        )
        .map_err(|e| Error::Storage(e.to_string()))?;

        tx.execute(
            "DELETE FROM file_changes WHERE snapshot_id = ?1",
            params![metadata.snapshot_id],
        )
        .map_err(|e| Error::Storage(e.to_string()))?;

        for change in &metadata.file_changes {
            tx.execute(
                r#"
                INSERT INTO file_changes (snapshot_id, path, change_type, size_bytes, checksum)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    metadata.snapshot_id,
                    change.path,
                    change.change_type.as_str(),
                    change.size_bytes.map(|n| n as i64),
                    change.checksum,
                ],
            )
            .map_err(|e| Error::Storage(e.to_string()))?;
        }

        tx.commit().map_err(|e| Error::Storage(e.to_string()))?;
        tracing::debug!(snapshot_id = %metadata.snapshot_id, "saved snapshot metadata");
        Ok(())
    }

    /// Fetch one snapshot record, or None if absent or unreadable.
    pub fn get(&self, snapshot_id: &str) -> Option<SnapshotMetadata> {
        match self.try_get(snapshot_id) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(snapshot_id, error = %e, "metadata read failed");
                None
            }
        }
    }

    fn try_get(&self, snapshot_id: &str) -> rusqlite::Result<Option<SnapshotMetadata>> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                "SELECT snapshot_id, message, timestamp, author, tags, parent_snapshot, stats
                 FROM snapshots WHERE snapshot_id = ?1",
                params![snapshot_id],
                row_to_metadata,
            )
            .optional()?;

        let Some(mut record) = record else {
            return Ok(None);
        };
        record.file_changes = load_file_changes(&conn, snapshot_id)?;
        Ok(Some(record))
    }

    /// The most recent records, newest first, optionally filtered by
    /// author and by tags (all requested tags must match).
    pub fn get_recent(
        &self,
        limit: usize,
        author: Option<&str>,
        tags: &[String],
    ) -> Vec<SnapshotMetadata> {
        match self.try_get_recent(limit, author, tags) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(error = %e, "recent-snapshot query failed");
                Vec::new()
            }
        }
    }

    fn try_get_recent(
        &self,
        limit: usize,
        author: Option<&str>,
        tags: &[String],
    ) -> rusqlite::Result<Vec<SnapshotMetadata>> {
        let conn = self.conn.lock();

        let mut sql = String::from(
            "SELECT snapshot_id, message, timestamp, author, tags, parent_snapshot, stats
             FROM snapshots WHERE 1=1",
        );
        let mut values: Vec<String> = Vec::new();

        if let Some(author) = author {
            sql.push_str(" AND author = ?");
            values.push(author.to_string());
        }
        for tag in tags {
            sql.push_str(" AND tags LIKE ?");
            values.push(format!("%\"{tag}\"%"));
        }
        // LIMIT is a trusted integer, not user text.
        sql.push_str(&format!(" ORDER BY timestamp DESC LIMIT {limit}"));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(values.iter()), row_to_metadata)?;

        let mut records = Vec::new();
        for row in rows {
            let mut record = row?;
            record.file_changes = load_file_changes(&conn, &record.snapshot_id)?;
            records.push(record);
        }
        Ok(records)
    }

    /// Case-sensitive substring search over message, author and tags,
    /// newest first.
    pub fn search(&self, query: &str, limit: usize) -> Vec<SnapshotMetadata> {
        match self.try_search(query, limit) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(query, error = %e, "metadata search failed");
                Vec::new()
            }
        }
    }

    fn try_search(&self, query: &str, limit: usize) -> rusqlite::Result<Vec<SnapshotMetadata>> {
        let conn = self.conn.lock();
        let needle = format!("%{query}%");

        let mut stmt = conn.prepare(
            "SELECT snapshot_id, message, timestamp, author, tags, parent_snapshot, stats
             FROM snapshots
             WHERE message LIKE ?1 OR author LIKE ?1 OR tags LIKE ?1
             ORDER BY timestamp DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![needle, limit as i64], row_to_metadata)?;

        let mut records = Vec::new();
        for row in rows {
            let mut record = row?;
            record.file_changes = load_file_changes(&conn, &record.snapshot_id)?;
            records.push(record);
        }
        Ok(records)
    }

    /// Delete a record and its file changes. Returns whether it existed.
    pub fn delete(&self, snapshot_id: &str) -> bool {
        match self.try_delete(snapshot_id) {
            Ok(deleted) => {
                if deleted {
                    tracing::debug!(snapshot_id, "deleted snapshot metadata");
                }
                deleted
            }
            Err(e) => {
                tracing::warn!(snapshot_id, error = %e, "metadata delete failed");
                false
            }
        }
    }

    fn try_delete(&self, snapshot_id: &str) -> rusqlite::Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM file_changes WHERE snapshot_id = ?1",
            params![snapshot_id],
        )?;
        let deleted = tx.execute(
            "DELETE FROM snapshots WHERE snapshot_id = ?1",
            params![snapshot_id],
        )?;
        tx.commit()?;
        Ok(deleted > 0)
    }

    /// Bulk-delete records older than the cutoff. Returns count removed.
    pub fn cleanup(&self, retain_days: i64) -> usize {
        let cutoff = (Utc::now() - chrono::Duration::days(retain_days)).to_rfc3339();
        match self.try_cleanup(&cutoff) {
            Ok(removed) => {
                if removed > 0 {
                    tracing::info!(removed, retain_days, "cleaned up old snapshot metadata");
                }
                removed
            }
            Err(e) => {
                tracing::warn!(error = %e, "metadata cleanup failed");
                0
            }
        }
    }

    fn try_cleanup(&self, cutoff: &str) -> rusqlite::Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM file_changes WHERE snapshot_id IN
                 (SELECT snapshot_id FROM snapshots WHERE timestamp < ?1)",
            params![cutoff],
        )?;
        let removed = tx.execute("DELETE FROM snapshots WHERE timestamp < ?1", params![cutoff])?;
        tx.commit()?;
        Ok(removed)
    }

    /// Aggregate counts over the whole store.
    pub fn stats(&self) -> StoreStats {
        match self.try_stats() {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!(error = %e, "metadata stats query failed");
                StoreStats::default()
            }
        }
    }

    fn try_stats(&self) -> rusqlite::Result<StoreStats> {
        let conn = self.conn.lock();
        let total_snapshots: u64 =
            conn.query_row("SELECT COUNT(*) FROM snapshots", [], |r| r.get(0))?;
        let total_file_changes: u64 =
            conn.query_row("SELECT COUNT(*) FROM file_changes", [], |r| r.get(0))?;

        let mut stmt = conn.prepare(
            "SELECT author, COUNT(*) FROM snapshots GROUP BY author ORDER BY COUNT(*) DESC",
        )?;
        let authors = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(StoreStats {
            total_snapshots,
            total_file_changes,
            authors,
        })
    }
}

fn row_to_metadata(row: &Row<'_>) -> rusqlite::Result<SnapshotMetadata> {
    let timestamp: String = row.get("timestamp")?;
    let tags: Option<String> = row.get("tags")?;
    let stats: Option<String> = row.get("stats")?;

    Ok(SnapshotMetadata {
        snapshot_id: row.get("snapshot_id")?,
        message: row.get("message")?,
        timestamp: DateTime::parse_from_rfc3339(&timestamp)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        author: row.get("author")?,
        tags: tags
            .and_then(|t| serde_json::from_str(&t).ok())
            .unwrap_or_default(),
        parent_snapshot: row.get("parent_snapshot")?,
        stats: stats
            .and_then(|s| serde_json::from_str::<SnapshotStats>(&s).ok())
            .unwrap_or_default(),
        file_changes: Vec::new(),
    })
}

fn load_file_changes(conn: &Connection, snapshot_id: &str) -> rusqlite::Result<Vec<FileChange>> {
    let mut stmt = conn.prepare(
        "SELECT path, change_type, size_bytes, checksum
         FROM file_changes WHERE snapshot_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![snapshot_id], |row| {
        let change_type: String = row.get("change_type")?;
        Ok(FileChange {
            path: row.get("path")?,
            change_type: ChangeType::parse(&change_type).unwrap_or(ChangeType::Modified),
            size_bytes: row.get::<_, Option<i64>>("size_bytes")?.map(|n| n as u64),
            checksum: row.get("checksum")?,
        })
    })?;
    rows.collect()
}
