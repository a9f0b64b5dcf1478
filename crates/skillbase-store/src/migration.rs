//! Versioned schema for the skill catalogue.
//!
//! Each entry in [`MIGRATIONS`] runs once, inside its own immediate
//! transaction, and is recorded in `schema_history` with an RFC 3339
//! timestamp. Opening an up-to-date database runs nothing.

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, error, info, warn};

use crate::error::{StoreError, StoreResult};

struct Migration {
    version: u32,
    description: &'static str,
    /// One or more `;`-separated statements.
    sql: &'static str,
}

impl Migration {
    fn error(&self, stage: &str, err: rusqlite::Error) -> StoreError {
        StoreError::Migration {
            version: self.version,
            message: format!("{stage}: {err}"),
        }
    }
}

/// Append-only; versions strictly increase.
static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "skills table",
    sql: r#"
        CREATE TABLE skills (
            id         TEXT PRIMARY KEY CHECK(length(id) = 10),
            name       TEXT NOT NULL CHECK(length(name) > 0),
            authorized INTEGER NOT NULL DEFAULT 0 CHECK(authorized IN (0, 1)),
            added      TEXT NOT NULL
        );
        CREATE INDEX idx_skills_name ON skills(name);
    "#,
}];

const HISTORY_DDL: &str = "CREATE TABLE IF NOT EXISTS schema_history (
    version    INTEGER PRIMARY KEY,
    description TEXT NOT NULL,
    applied_at TEXT NOT NULL
)";

/// Bring the schema up to the latest version. Blocking; run it through
/// [`Database::execute_mut`](crate::db::Database::execute_mut).
pub fn run_all(conn: &mut Connection) -> StoreResult<()> {
    conn.execute_batch(HISTORY_DDL)
        .map_err(|e| StoreError::Migration {
            version: 0,
            message: format!("create schema_history: {e}"),
        })?;

    let from = current_version(conn)?;
    let mut applied = 0usize;
    for migration in MIGRATIONS.iter().filter(|m| m.version > from) {
        apply(conn, migration)?;
        applied += 1;
    }

    if applied == 0 {
        debug!(version = from, "skill schema up to date");
    } else {
        info!(from, applied, to = current_version(conn)?, "skill schema migrated");
    }
    Ok(())
}

/// Highest recorded version; 0 for a database that has never been migrated.
pub fn current_version(conn: &Connection) -> StoreResult<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_history",
        [],
        |row| row.get(0),
    )
    .map_err(|e| StoreError::Migration {
        version: 0,
        message: format!("read schema version: {e}"),
    })
}

fn apply(conn: &mut Connection, migration: &Migration) -> StoreResult<()> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| migration.error("begin", e))?;

    if let Err(err) = apply_in(&tx, migration) {
        warn!(version = migration.version, %err, "migration failed");
        if let Err(rollback) = tx.rollback() {
            error!(version = migration.version, %rollback, "rollback failed");
            return Err(migration.error(&format!("rollback after `{err}`"), rollback));
        }
        return Err(err);
    }

    tx.commit().map_err(|e| migration.error("commit", e))?;
    info!(
        version = migration.version,
        description = migration.description,
        "migration applied"
    );
    Ok(())
}

fn apply_in(tx: &Transaction<'_>, migration: &Migration) -> StoreResult<()> {
    tx.execute_batch(migration.sql)
        .map_err(|e| migration.error("execute", e))?;
    tx.execute(
        "INSERT INTO schema_history (version, description, applied_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![
            migration.version,
            migration.description,
            chrono::Utc::now().to_rfc3339()
        ],
    )
    .map_err(|e| migration.error("record", e))?;
    Ok(())
}

// ── tests ────────────────────────────────────────────────────────────
