//! Audit log: SQLite-based history of key operations.
//!
//! Stores a record of every key operation (init, add-key, rm-key,
//! unlock, upgrade) in a local SQLite database at `<repo>/audit.db`.
//! Records name the operation and the factor involved, never any
//! passphrase, key, salt or hash.
//!
//! The trail is best effort. If the database can't be opened or written,
//! key operations go ahead unrecorded.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::errors::{RepoKeyError, Result};

/// One recorded key operation.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub factor: Option<String>,
    pub details: Option<String>,
}

/// Handle on a repository's audit database.
pub struct AuditLog {
    conn: Connection,
}

impl AuditLog {
    /// Open (or create) the audit database at `<repo>/audit.db`.
    ///
    /// Returns `None` if the database can't be opened. Callers treat
    /// that as "no audit trail" and carry on.
    pub fn open(repo_dir: &Path) -> Option<Self> {
        let db_path = Self::db_path(repo_dir);
        let conn = Connection::open(&db_path).ok()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(&db_path, std::fs::Permissions::from_mode(0o600));
        }

        conn.execute_batch(SCHEMA).ok()?;
        Some(Self { conn })
    }

    /// Record an operation. Errors are dropped.
    pub fn log(&self, operation: &str, factor: Option<&str>, details: Option<&str>) {
        let at = Utc::now().to_rfc3339();
        if let Err(e) = self.conn.execute(
            "INSERT INTO key_events (at, operation, factor, details) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![at, operation, factor, details],
        ) {
            tracing::debug!(operation, error = %e, "audit write failed");
        }
    }

    /// The most recent `limit` entries, newest first.
    pub fn query(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, at, operation, factor, details FROM key_events
                 ORDER BY id DESC LIMIT ?1",
            )
            .map_err(|e| RepoKeyError::AuditError(format!("prepare: {e}")))?;

        let entries = stmt
            .query_map([limit], entry_from_row)
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(|e| RepoKeyError::AuditError(format!("query: {e}")))?;

        Ok(entries)
    }

    /// Location of the audit database for a repository.
    pub fn db_path(repo_dir: &Path) -> PathBuf {
        repo_dir.join(DB_FILE_NAME)
    }
}

const DB_FILE_NAME: &str = "audit.db";

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS key_events (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    at        TEXT NOT NULL,
    operation TEXT NOT NULL,
    factor    TEXT,
    details   TEXT
);";

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditEntry> {
    let at: String = row.get(1)?;
    // A corrupt timestamp should not hide the rest of the row.
    let timestamp = DateTime::parse_from_rfc3339(&at)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default();

    Ok(AuditEntry {
        id: row.get(0)?,
        timestamp,
        operation: row.get(2)?,
        factor: row.get(3)?,
        details: row.get(4)?,
    })
}

/// Convenience helper: log an audit event for a repository.
///
/// Never fails the calling command.
pub fn log_audit(repo_dir: &Path, op: &str, factor: Option<&str>, details: Option<&str>) {
    if let Some(audit) = AuditLog::open(repo_dir) {
        audit.log(op, factor, details);
    }
}
