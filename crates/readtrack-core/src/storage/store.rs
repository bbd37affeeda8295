use crate::errors::{SchemaError, StoreError, StoreResult};
use crate::storage::schema;
use rusqlite::{CachedStatement, Connection};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Handle to the on-device database. Cloning shares the same connection.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    queries: Arc<AtomicU64>,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StoreStats {
    pub users: Option<u64>,
    pub progress_rows: Option<u64>,
    pub quiz_results: Option<u64>,
    pub badges: Option<u64>,
    pub version: Option<String>,
}

const KNOWN_TABLES: &[&str] = &["users", "progress", "quiz_results", "user_badges"];

impl Store {
    pub fn open(path: &Path) -> Result<Self, SchemaError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            if let Err(e) = std::fs::create_dir_all(dir) {
                tracing::warn!(event = "db_dir_create_failed", dir = %dir.display(), error = %e);
            }
        }
        let conn = Connection::open(path).map_err(|source| SchemaError::Open {
            path: path.display().to_string(),
            source,
        })?;
        tracing::debug!(event = "store_open", path = %path.display());
        Self::from_connection(conn, &path.display().to_string())
    }

    pub fn memory() -> Result<Self, SchemaError> {
        let conn = Connection::open_in_memory().map_err(|source| SchemaError::Open {
            path: ":memory:".to_string(),
            source,
        })?;
        Self::from_connection(conn, ":memory:")
    }

    fn from_connection(conn: Connection, label: &str) -> Result<Self, SchemaError> {
        relax_foreign_keys(&conn).map_err(|source| SchemaError::Open {
            path: label.to_string(),
            source,
        })?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            queries: Arc::new(AtomicU64::new(0)),
        })
    }

    pub(crate) fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Prepares (or reuses) a statement and counts it against `query_count`.
    pub(crate) fn prepare<'c>(
        &self,
        conn: &'c Connection,
        sql: &str,
    ) -> rusqlite::Result<CachedStatement<'c>> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        conn.prepare_cached(sql)
    }

    /// Statements issued through this store since it was opened.
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    /// Creates the four tables if absent and self-heals the `last_viewed_segment` gap.
    /// Safe to call on every startup.
    pub fn ensure_schema(&self) -> Result<(), SchemaError> {
        let conn = self.lock()?;

        for &(table, ddl) in schema::TABLES {
            if let Err(source) = conn.execute_batch(ddl) {
                if source.to_string().contains("already exists") {
                    tracing::warn!(event = "schema_table_exists", table = table, error = %source);
                    continue;
                }
                return Err(SchemaError::Ddl { table, source });
            }
        }

        heal_last_viewed_column(&conn);

        if let Err(e) = conn.execute(schema::PROGRESS_INDEX, []) {
            tracing::warn!(event = "schema_index_skipped", error = %e);
        }

        tracing::debug!(event = "schema_ready");
        Ok(())
    }

    pub fn table_columns(&self, table: &str) -> StoreResult<HashSet<String>> {
        let conn = self.lock()?;
        get_columns(&conn, table)
    }

    pub fn count_rows(&self, table: &str) -> StoreResult<i64> {
        if !KNOWN_TABLES.contains(&table) {
            return Err(StoreError::InvalidArgument(format!(
                "invalid table name for count_rows: {}",
                table
            )));
        }
        let conn = self.lock()?;
        let sql = format!("SELECT COUNT(*) FROM {}", table);
        let n: i64 = conn.query_row(&sql, [], |r| r.get(0))?;
        Ok(n)
    }

    pub fn stats_best_effort(&self) -> StoreResult<StoreStats> {
        let conn = self.lock()?;
        let count = |table: &str| -> Option<u64> {
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| {
                r.get::<_, i64>(0).map(|x| x as u64)
            })
            .ok()
        };

        let version: Option<String> = conn
            .query_row("PRAGMA user_version", [], |r| r.get(0))
            .ok()
            .map(|v: i64| v.to_string());

        Ok(StoreStats {
            users: count("users"),
            progress_rows: count("progress"),
            quiz_results: count("quiz_results"),
            badges: count("user_badges"),
            version,
        })
    }

    /// Closes the connection once no other handle shares it.
    pub fn close(self) -> StoreResult<()> {
        let Ok(mutex) = Arc::try_unwrap(self.conn) else {
            tracing::debug!(event = "store_close_deferred");
            return Ok(());
        };
        let conn = mutex.into_inner().map_err(|_| StoreError::Poisoned)?;
        conn.close().map_err(|(_, e)| StoreError::Sqlite(e))
    }
}

/// The bundled SQLite enforces foreign keys by default. Rows for users the
/// caller vouches for, and legacy rows whose user is gone, must still be
/// writable. A no-op inside a transaction, so call it on a fresh connection.
pub(crate) fn relax_foreign_keys(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", false)
}

/// Column-add failures are cosmetic: log and carry on.
fn heal_last_viewed_column(conn: &Connection) {
    let cols = match get_columns(conn, "progress") {
        Ok(cols) => cols,
        Err(e) => {
            tracing::warn!(event = "schema_heal_skipped", error = %e);
            return;
        }
    };
    if let Err(e) = add_column_if_missing(
        conn,
        &cols,
        "progress",
        schema::LAST_VIEWED_COLUMN,
        schema::LAST_VIEWED_COLUMN_DEF,
    ) {
        tracing::warn!(
            event = "schema_heal_failed",
            column = schema::LAST_VIEWED_COLUMN,
            error = %e
        );
    }
}

pub(crate) fn get_columns(conn: &Connection, table: &str) -> StoreResult<HashSet<String>> {
    if !KNOWN_TABLES.contains(&table) {
        return Err(StoreError::InvalidArgument(format!(
            "unknown table: {}",
            table
        )));
    }
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    let mut out = HashSet::new();
    for r in rows {
        out.insert(r?);
    }
    Ok(out)
}

fn add_column_if_missing(
    conn: &Connection,
    cols: &HashSet<String>,
    table: &str,
    col: &str,
    ty: &str,
) -> StoreResult<bool> {
    if cols.contains(col) {
        return Ok(false);
    }
    let sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, col, ty);
    conn.execute(&sql, [])?;
    tracing::info!(event = "schema_column_added", table = table, column = col);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let store = Store::memory().unwrap();
        store.ensure_schema().unwrap();
        store.ensure_schema().unwrap();
        for table in KNOWN_TABLES {
            assert_eq!(store.count_rows(table).unwrap(), 0);
        }
    }

    #[test]
    fn test_accepts_rows_for_unregistered_users() {
        let store = Store::memory().unwrap();
        store.ensure_schema().unwrap();
        let conn = store.lock().unwrap();
        let enforced: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |r| r.get(0))
            .unwrap();
        assert_eq!(enforced, 0);
        conn.execute(
            "INSERT INTO progress (user_id, story_id, segment_id, completed) VALUES (7, 1, 1, 1)",
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_count_rows_rejects_unknown_table() {
        let store = Store::memory().unwrap();
        store.ensure_schema().unwrap();
        assert!(matches!(
            store.count_rows("sqlite_master; DROP TABLE users"),
            Err(StoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_heals_missing_last_viewed_column() {
        let store = Store::memory().unwrap();
        {
            let conn = store.lock().unwrap();
            conn.execute_batch(
                "CREATE TABLE progress (
                   id INTEGER PRIMARY KEY AUTOINCREMENT,
                   user_id INTEGER, story_id INTEGER, segment_id INTEGER,
                   completed BOOLEAN DEFAULT 0, completed_at DATETIME,
                   UNIQUE(user_id, story_id, segment_id)
                 );
                 INSERT INTO progress (user_id, story_id, segment_id, completed) VALUES (1, 1, 3, 1);",
            )
            .unwrap();
        }

        store.ensure_schema().unwrap();

        let cols = store.table_columns("progress").unwrap();
        assert!(cols.contains("last_viewed_segment"));
        let conn = store.lock().unwrap();
        let lv: i64 = conn
            .query_row("SELECT last_viewed_segment FROM progress", [], |r| r.get(0))
            .unwrap();
        assert_eq!(lv, 1);
    }

    #[test]
    fn test_prepare_counts_statements() {
        let store = Store::memory().unwrap();
        store.ensure_schema().unwrap();
        let before = store.query_count();
        {
            let conn = store.lock().unwrap();
            let mut stmt = store.prepare(&conn, "SELECT COUNT(*) FROM users").unwrap();
            let _: i64 = stmt.query_row([], |r| r.get(0)).unwrap();
        }
        assert_eq!(store.query_count(), before + 1);
    }
}
