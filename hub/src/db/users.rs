use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use serde::Serialize;

use crate::error::ApiError;

pub const DEMO_USERNAME: &str = "demo";

/// Password column placeholder; accounts here never log in with a password.
const UNUSED_PASSWORD: &str = "not_used";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub role: String,
    pub created_at: Option<String>,
}

pub fn list(conn: &Connection) -> Result<Vec<User>, ApiError> {
    let mut stmt =
        conn.prepare_cached("SELECT id, username, role, created_at FROM users ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(User {
                id: row.get(0)?,
                username: row.get(1)?,
                role: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn find_id(conn: &Connection, username: &str) -> Result<Option<i64>, ApiError> {
    let id = conn
        .query_row("SELECT id FROM users WHERE username = ?1", [username], |r| r.get(0))
        .optional()?;
    Ok(id)
}

fn insert(conn: &Connection, username: &str, role: &str) -> Result<i64, ApiError> {
    match conn.execute(
        "INSERT INTO users (username, hashed_password, role) VALUES (?1, ?2, ?3)",
        params![username, UNUSED_PASSWORD, role],
    ) {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
            Err(ApiError::BadRequest("User already exists".into()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Create a user keyed by email. An existing email is a 400.
pub fn create(conn: &Connection, email: &str, role: &str) -> Result<i64, ApiError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ApiError::BadRequest("email must not be empty".into()));
    }
    if find_id(conn, email)?.is_some() {
        return Err(ApiError::BadRequest("User already exists".into()));
    }
    let id = insert(conn, email, role)?;
    tracing::info!(id, role, "user created");
    Ok(id)
}

/// Create the demo admin once. `None` when it already exists.
pub fn create_demo(conn: &Connection) -> Result<Option<i64>, ApiError> {
    if find_id(conn, DEMO_USERNAME)?.is_some() {
        return Ok(None);
    }
    let id = insert(conn, DEMO_USERNAME, "admin")?;
    tracing::info!(id, "demo user created");
    Ok(Some(id))
}
