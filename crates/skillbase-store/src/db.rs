//! SQLite database handle with WAL mode and connection pragmas.
//!
//! The [`Database`] struct wraps a `rusqlite::Connection` behind an
//! `Arc<Mutex<>>`. Clones share the same connection, so a [`Database`] is
//! a capability handed to services rather than something they own.
//! Statements run via `tokio::task::spawn_blocking` to avoid blocking the
//! async runtime.
//!
//! Every connection also gets [`FOLD_CASE_FN`], a Unicode-aware lowercase
//! function. SQLite's own `lower()` and `LIKE` only fold ASCII.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use rusqlite::functions::FunctionFlags;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::migration;

/// SQL function returning its text argument lowercased with full Unicode
/// case mapping. `NULL` stays `NULL`.
pub const FOLD_CASE_FN: &str = "fold_case";

/// Tunables applied when a connection is opened.
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    /// How long a writer waits on a locked database before failing.
    pub busy_timeout_ms: u32,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
        }
    }
}

/// Thread-safe, shared handle to a SQLite database.
///
/// All reads and writes go through [`Database::execute`], which dispatches
/// onto the blocking thread pool and holds the connection lock only for
/// the duration of the closure.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a database at `path` with default options.
    ///
    /// This call blocks briefly (file I/O), so call it during startup or
    /// wrap it in `spawn_blocking` yourself.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with(path, &DatabaseOptions::default())
    }

    /// Open (or create) a database at `path` with explicit options.
    pub fn open_with(path: impl AsRef<Path>, options: &DatabaseOptions) -> StoreResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening database");

        let conn = Connection::open(path)?;
        Self::apply_pragmas(&conn, options)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database — useful for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        debug!("opening in-memory database");

        let conn = Connection::open_in_memory()?;
        Self::apply_pragmas(&conn, &DatabaseOptions::default())?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open the database and run all pending migrations.
    pub async fn open_and_migrate(path: impl AsRef<Path> + Send + 'static) -> StoreResult<Self> {
        Self::open_and_migrate_with(path, DatabaseOptions::default()).await
    }

    /// Like [`Database::open_and_migrate`], with explicit options.
    pub async fn open_and_migrate_with(
        path: impl AsRef<Path> + Send + 'static,
        options: DatabaseOptions,
    ) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let db = tokio::task::spawn_blocking(move || Self::open_with(&path, &options)).await??;
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run all pending schema migrations.
    pub async fn run_migrations(&self) -> StoreResult<()> {
        self.execute_mut(migration::run_all).await
    }

    /// Execute a closure against the connection on the blocking pool.
    ///
    /// The closure receives a `&Connection` and must return a
    /// `StoreResult<T>`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let count: i64 = db.execute(|conn| {
    ///     let count = conn.query_row("SELECT count(*) FROM skills", [], |row| row.get(0))?;
    ///     Ok(count)
    /// }).await?;
    /// ```
    pub async fn execute<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        self.execute_mut(move |conn| f(&*conn)).await
    }

    /// Like [`Database::execute`], with a `&mut Connection` so the closure
    /// can open a `rusqlite::Transaction`.
    pub async fn execute_mut<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::TaskJoin(format!("mutex poisoned: {e}")))?;
            f(&mut conn)
        })
        .await?
    }

    // ── pragmas ──────────────────────────────────────────────────────

    fn apply_pragmas(conn: &Connection, options: &DatabaseOptions) -> StoreResult<()> {
        debug!("applying SQLite pragmas");

        // WAL mode: concurrent readers, non-blocking writes.
        conn.pragma_update(None, "journal_mode", "WAL")?;

        // NORMAL sync is safe with WAL: a power failure loses at most the
        // last transaction, never the file.
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        conn.pragma_update(None, "foreign_keys", "ON")?;

        conn.pragma_update(None, "busy_timeout", options.busy_timeout_ms)?;

        conn.create_scalar_function(
            FOLD_CASE_FN,
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|s| s.to_lowercase())),
        )?;

        info!(
            busy_timeout_ms = options.busy_timeout_ms,
            "database pragmas applied"
        );
        Ok(())
    }
}

// ── tests ────────────────────────────────────────────────────────────
