use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::{FetchError, PriceProvider, RawRow};

/// Yahoo Finance chart API (`/v8/finance/chart/{symbol}`).
pub struct YahooChartProvider {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

impl YahooChartProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) stockcast-hub")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

fn day_start_epoch(day: NaiveDate) -> i64 {
    day.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or(0)
}

/// Turn the columnar chart payload into one `{Date, Close}` row per bar.
///
/// Missing closes stay `null`; normalisation drops them.
fn chart_rows(envelope: ChartEnvelope) -> Result<Vec<RawRow>, FetchError> {
    if let Some(err) = envelope.chart.error.filter(|e| !e.is_null()) {
        return Err(FetchError::Payload(err.to_string()));
    }
    let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };
    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();

    let rows = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let close = closes.get(i).copied().flatten();
            match json!({ "Date": ts, "Close": close }) {
                Value::Object(m) => Some(m),
                _ => None,
            }
        })
        .collect();
    Ok(rows)
}

#[async_trait]
impl PriceProvider for YahooChartProvider {
    async fn daily_rows(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawRow>, FetchError> {
        let url = format!("{}/{}", self.base_url, symbol);
        tracing::debug!("Fetching chart: {url}");

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("period1", day_start_epoch(start).to_string()),
                ("period2", day_start_epoch(end).to_string()),
                ("interval", "1d".to_string()),
                ("events", "history".to_string()),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(FetchError::Status(resp.status().as_u16()));
        }

        let envelope: ChartEnvelope = resp
            .json()
            .await
            .map_err(|e| FetchError::Payload(e.to_string()))?;
        chart_rows(envelope)
    }
}
