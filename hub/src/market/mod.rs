//! Historical daily closes from an external market-data provider.
//!
//! [`fetch`] never fails: provider errors and empty responses both come
//! back as an empty [`PriceSeries`], so the forecasting path always has
//! something to work with.

pub mod yahoo;

use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::LazyLock;

pub use yahoo::YahooChartProvider;

/// One daily close.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceRecord {
    pub date: String,
    pub close: f64,
}

/// Chronological closes; possibly empty.
pub type PriceSeries = Vec<PriceRecord>;

/// A provider row before normalisation, keyed by column name.
pub type RawRow = Map<String, Value>;

#[derive(Debug)]
pub enum FetchError {
    Http(String),
    Status(u16),
    Payload(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(msg) => write!(f, "http: {msg}"),
            Self::Status(code) => write!(f, "provider returned status {code}"),
            Self::Payload(msg) => write!(f, "payload: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

/// Source of raw daily rows for a symbol over `[start, end)`.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    async fn daily_rows(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawRow>, FetchError>;
}

/// Fetch daily closes for `symbol` between two `YYYY-MM-DD` bounds.
pub async fn fetch(
    provider: &dyn PriceProvider,
    symbol: &str,
    start_date: &str,
    end_date: &str,
) -> PriceSeries {
    let (start, end) = match (parse_day(start_date), parse_day(end_date)) {
        (Some(s), Some(e)) => (s, e),
        _ => {
            tracing::warn!(symbol, start_date, end_date, "unparsable date bounds");
            return Vec::new();
        }
    };
    if start > end {
        tracing::warn!(symbol, start_date, end_date, "inverted date range");
        return Vec::new();
    }

    match provider.daily_rows(symbol, start, end).await {
        Ok(rows) => {
            let series = normalize_rows(symbol, &rows);
            if series.is_empty() {
                tracing::warn!(symbol, raw_rows = rows.len(), "provider returned no usable closes");
            } else {
                tracing::debug!(symbol, records = series.len(), "fetched closes");
            }
            series
        }
        Err(e) => {
            tracing::warn!(symbol, "price fetch failed: {e}");
            Vec::new()
        }
    }
}

fn parse_day(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

// ── Normalisation ────────────────────────────────────────────────────────

static RE_TUPLE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\(\s*['"]([^'"]*)['"]\s*,\s*['"]([^'"]*)['"]\s*,?\s*\)$"#).unwrap()
});

/// Split a column key into `(field, ticker)`.
///
/// Recognised shapes: `Close`, `('Close', 'AAPL')` and `Close.AAPL`.
/// An empty ticker in the tuple form counts as no ticker.
fn parse_column_key(key: &str) -> (&str, Option<&str>) {
    let key = key.trim();
    if let Some(caps) = RE_TUPLE_KEY.captures(key) {
        let field = caps.get(1).map_or("", |m| m.as_str().trim());
        let ticker = caps.get(2).map(|m| m.as_str().trim()).filter(|t| !t.is_empty());
        return (field, ticker);
    }
    match key.split_once('.') {
        Some((field, ticker)) if !field.is_empty() && !ticker.is_empty() => (field, Some(ticker)),
        _ => (key, None),
    }
}

fn finite_number(v: &Value) -> Option<f64> {
    v.as_f64().filter(|x| x.is_finite())
}

/// Close price of one row, under a plain or `(field, symbol)` key.
///
/// The plain key wins when both are present.
fn row_close(symbol: &str, row: &RawRow) -> Option<f64> {
    let mut composite = None;
    for (key, value) in row {
        let (field, ticker) = parse_column_key(key);
        if !field.eq_ignore_ascii_case("close") {
            continue;
        }
        match ticker {
            None => return finite_number(value),
            Some(t) if t.eq_ignore_ascii_case(symbol) => composite = Some(value),
            Some(_) => {}
        }
    }
    composite.and_then(finite_number)
}

fn row_date(row: &RawRow) -> String {
    let value = row.iter().find_map(|(key, value)| {
        let (field, _) = parse_column_key(key);
        matches!(field.to_ascii_lowercase().as_str(), "date" | "datetime").then_some(value)
    });

    match value {
        Some(Value::String(s)) => {
            let s = s.trim();
            match s.get(..10) {
                Some(day) if parse_day(day).is_some() => day.to_string(),
                _ => s.to_string(),
            }
        }
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
            .map(|dt| dt.date_naive().to_string())
            .unwrap_or_default(),
        _ => String::new(),
    }
}

/// Flatten provider rows into `{date, close}` records.
///
/// Rows whose close is missing, non-numeric or non-finite are dropped.
pub fn normalize_rows(symbol: &str, rows: &[RawRow]) -> PriceSeries {
    rows.iter()
        .filter_map(|row| {
            let close = row_close(symbol, row)?;
            Some(PriceRecord {
                date: row_date(row),
                close,
            })
        })
        .collect()
}
