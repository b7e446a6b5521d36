//! `SQLite` schema for the persisted key/value store.
//!
//! The schema version lives in `PRAGMA user_version`. Each entry of
//! [`MIGRATIONS`] moves the database up one version.

use rusqlite::{Connection, TransactionBehavior};
use tracing::info;

use crate::error::{Error, Result};

/// Version 1: one row per persisted key. Compare lists store a JSON array.
const V1_ENTRIES: &str = r"
CREATE TABLE entries (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

/// Version 2: record when each key was last written.
///
/// Rows that predate the column are stamped with the upgrade time.
const V2_UPDATED_AT: &str = r"
ALTER TABLE entries ADD COLUMN updated_at TEXT NOT NULL DEFAULT '';
UPDATE entries SET updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now') WHERE updated_at = '';
CREATE INDEX idx_entries_updated ON entries(updated_at DESC);
";

/// Upgrade steps in order. Step `n` brings the database to version `n + 1`.
pub const MIGRATIONS: &[&str] = &[V1_ENTRIES, V2_UPDATED_AT];

/// Schema version this build writes.
pub const CURRENT_VERSION: usize = MIGRATIONS.len();

/// Read the schema version. A fresh database is version 0.
///
/// # Errors
///
/// Returns an error if the pragma can't be read.
pub fn schema_version(conn: &Connection) -> Result<usize> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Apply pending upgrade steps in one immediate transaction.
///
/// Two processes opening a fresh file at once are serialised by the write
/// lock; the loser sees the upgraded version and applies nothing.
///
/// # Errors
///
/// Returns [`Error::DatabaseMigration`] if the file was written by a newer
/// build or a step fails.
pub fn initialize(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let version = schema_version(&tx)?;
    if version > CURRENT_VERSION {
        return Err(Error::DatabaseMigration {
            message: format!(
                "database schema version {version} is newer than supported version {CURRENT_VERSION}"
            ),
        });
    }
    if version == CURRENT_VERSION {
        return Ok(());
    }

    for (step, sql) in MIGRATIONS.iter().enumerate().skip(version) {
        tx.execute_batch(sql).map_err(|e| Error::DatabaseMigration {
            message: format!("upgrade to version {} failed: {e}", step + 1),
        })?;
    }
    tx.pragma_update(None, "user_version", CURRENT_VERSION)?;
    tx.commit()?;

    info!(from = version, to = CURRENT_VERSION, "Upgraded database schema");
    Ok(())
}
