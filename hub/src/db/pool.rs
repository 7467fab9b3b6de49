use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::Path;

use crate::error::ApiError;

pub type DbPool = Pool<SqliteConnectionManager>;

const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Open (creating if needed) the read-write application database.
///
/// Every pooled connection runs in WAL mode with a busy timeout so the
/// best-effort prediction writes do not starve readers.
pub fn open_pool(path: &Path, max_size: u32) -> Result<DbPool, ApiError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let manager = SqliteConnectionManager::file(path).with_init(|c| {
        c.execute_batch(&format!(
            "PRAGMA journal_mode=WAL; PRAGMA busy_timeout={BUSY_TIMEOUT_MS}; PRAGMA foreign_keys=ON;"
        ))
    });
    let pool = Pool::builder().max_size(max_size.max(1)).build(manager)?;

    let conn = pool.get()?;
    init_schema(&conn)?;
    tracing::info!("SQLite database ready at {}", path.display());
    Ok(pool)
}

/// Idempotent schema creation.
pub fn init_schema(conn: &Connection) -> Result<(), ApiError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS predictions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            symbol TEXT NOT NULL,
            model TEXT NOT NULL,
            step INTEGER NOT NULL,
            value REAL NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );
        CREATE INDEX IF NOT EXISTS ix_predictions_symbol ON predictions(symbol);
        CREATE INDEX IF NOT EXISTS ix_predictions_model ON predictions(model);
        CREATE INDEX IF NOT EXISTS ix_predictions_created_at ON predictions(created_at);

        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            hashed_password TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'user',
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_table(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name = ?1",
            [name],
            |_| Ok(()),
        )
        .is_ok()
    }

    #[test]
    fn open_pool_creates_parent_dir_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("app.db");
        let pool = open_pool(&path, 2).unwrap();
        assert!(path.exists());

        let conn = pool.get().unwrap();
        assert!(has_table(&conn, "predictions"));
        assert!(has_table(&conn, "users"));
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |r| r.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn schema_init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert!(has_table(&conn, "predictions"));
    }
}
