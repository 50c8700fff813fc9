//! SQLite-backed history log.
//!
//! Stored next to the archive as `<archive>.history.db`. Each commit adds
//! one row with the archive's SHA-256 so a revision can be matched to the
//! bytes on disk.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use super::HistoryRecorder;
use crate::archive;
use crate::errors::{Result, VaultError};

/// A single history row.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub archive: String,
    pub summary: String,
    pub digest: String,
}

/// SQLite history database.
pub struct AuditLog {
    conn: Connection,
}

impl AuditLog {
    /// Path of the history database kept beside `archive`.
    pub fn db_path(archive: &Path) -> PathBuf {
        let mut name = archive.file_name().unwrap_or_default().to_os_string();
        name.push(".history.db");
        archive.with_file_name(name)
    }

    /// Open (or create) the history database for `archive`.
    ///
    /// Returns `None` if the database can't be opened; callers carry on
    /// without history.
    pub fn open(archive: &Path) -> Option<Self> {
        let db_path = Self::db_path(archive);
        let conn = match Connection::open(&db_path) {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(db = %db_path.display(), "history unavailable: {e}");
                return None;
            }
        };

        // Restrictive permissions on the history database (owner-only).
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&db_path, perms);
        }

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS history (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp   TEXT NOT NULL,
                archive     TEXT NOT NULL,
                summary     TEXT NOT NULL,
                digest      TEXT NOT NULL
            );",
        )
        .ok()?;

        Some(Self { conn })
    }

    /// Most recent entries first.
    ///
    /// - `limit`: maximum number of entries to return.
    /// - `since`: if provided, only entries at or after this time.
    pub fn query(&self, limit: usize, since: Option<DateTime<Utc>>) -> Result<Vec<HistoryEntry>> {
        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let since = since.map_or_else(String::new, |ts| ts.to_rfc3339());

        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, timestamp, archive, summary, digest
                 FROM history
                 WHERE timestamp >= ?1
                 ORDER BY id DESC
                 LIMIT ?2",
            )
            .map_err(|e| VaultError::History(format!("query prepare: {e}")))?;

        let rows = stmt
            .query_map(rusqlite::params![since, limit_i64], |row| {
                let ts_str: String = row.get(1)?;
                let timestamp = DateTime::parse_from_rfc3339(&ts_str)
                    .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));

                Ok(HistoryEntry {
                    id: row.get(0)?,
                    timestamp,
                    archive: row.get(2)?,
                    summary: row.get(3)?,
                    digest: row.get(4)?,
                })
            })
            .map_err(|e| VaultError::History(format!("query exec: {e}")))?;

        rows.map(|row| row.map_err(|e| VaultError::History(format!("row parse: {e}"))))
            .collect()
    }
}

impl HistoryRecorder for AuditLog {
    fn record(&self, archive: &Path, summary: &str) -> Result<()> {
        let digest = archive::digest(archive)?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO history (timestamp, archive, summary, digest)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![now, archive.display().to_string(), summary, digest],
            )
            .map_err(|e| VaultError::History(format!("insert: {e}")))?;

        tracing::debug!(archive = %archive.display(), %digest, "history recorded");
        Ok(())
    }
}
