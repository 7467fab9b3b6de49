//! SQLite persistence: forecast history and the admin-managed user table.

pub mod pool;
pub mod predictions;
pub mod users;

pub use pool::{open_pool, DbPool};

#[cfg(test)]
pub(crate) fn test_pool() -> (tempfile::TempDir, DbPool) {
    let dir = tempfile::tempdir().unwrap();
    let pool = open_pool(&dir.path().join("app.db"), 2).unwrap();
    (dir, pool)
}
