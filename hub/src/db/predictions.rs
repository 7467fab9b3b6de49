use rusqlite::{params, Connection};
use serde::Serialize;

use super::DbPool;
use crate::error::ApiError;
use crate::forecast::{ForecastSet, Strategy};

/// One persisted forecast value.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PredictionRow {
    pub id: i64,
    pub symbol: String,
    pub model: String,
    pub step: i64,
    pub value: f64,
    pub created_at: String,
}

/// Insert every step of every strategy in a single transaction.
///
/// Returns the number of rows written. Nothing is written on error.
pub fn insert_forecasts(
    conn: &mut Connection,
    symbol: &str,
    set: &ForecastSet,
) -> Result<usize, ApiError> {
    let tx = conn.transaction()?;
    let mut written = 0;
    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO predictions (symbol, model, step, value) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for strategy in Strategy::ALL {
            for (step, value) in set.get(strategy).vector().steps() {
                written += stmt.execute(params![symbol, strategy.as_str(), step, value])?;
            }
        }
    }
    tx.commit()?;
    Ok(written)
}

/// Best-effort persistence. Failures are logged and swallowed.
pub fn persist(pool: &DbPool, symbol: &str, set: &ForecastSet) {
    let result = pool
        .get()
        .map_err(ApiError::from)
        .and_then(|mut conn| insert_forecasts(&mut conn, symbol, set));
    match result {
        Ok(n) => tracing::debug!(symbol, rows = n, "predictions saved"),
        Err(e) => tracing::warn!(symbol, "DB save error: {e}"),
    }
}

/// Newest first, optionally for one symbol.
pub fn recent(
    conn: &Connection,
    limit: u32,
    symbol: Option<&str>,
) -> Result<Vec<PredictionRow>, ApiError> {
    let map_row = |row: &rusqlite::Row<'_>| {
        Ok(PredictionRow {
            id: row.get(0)?,
            symbol: row.get(1)?,
            model: row.get(2)?,
            step: row.get(3)?,
            value: row.get(4)?,
            created_at: row.get(5)?,
        })
    };

    let rows = match symbol {
        Some(sym) => {
            let mut stmt = conn.prepare_cached(
                "SELECT id, symbol, model, step, value, created_at FROM predictions
                 WHERE symbol = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![sym.trim().to_uppercase(), limit], map_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let mut stmt = conn.prepare_cached(
                "SELECT id, symbol, model, step, value, created_at FROM predictions
                 ORDER BY created_at DESC, id DESC LIMIT ?1",
            )?;
            let rows = stmt
                .query_map(params![limit], map_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
    };
    Ok(rows)
}
