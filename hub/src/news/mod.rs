//! Financial headlines with a sentiment score attached.

pub mod sentiment;

use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

pub use sentiment::SentimentAnalyzer;

#[derive(Debug)]
pub enum NewsError {
    MissingKey,
    Http(String),
    Status(u16),
    Payload(String),
}

impl std::fmt::Display for NewsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingKey => write!(f, "NEWS_API_KEY is not set"),
            Self::Http(msg) => write!(f, "http: {msg}"),
            Self::Status(code) => write!(f, "news API returned status {code}"),
            Self::Payload(msg) => write!(f, "payload: {msg}"),
        }
    }
}

impl std::error::Error for NewsError {}

impl From<reqwest::Error> for NewsError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ArticlesEnvelope {
    #[serde(default)]
    articles: Vec<Map<String, Value>>,
}

/// Client for a NewsAPI-compatible `everything` endpoint.
pub struct NewsClient {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    query: String,
    analyzer: SentimentAnalyzer,
}

impl NewsClient {
    pub fn new(
        url: &str,
        api_key: Option<String>,
        query: &str,
        timeout: Duration,
    ) -> Result<Self, NewsError> {
        let client = reqwest::Client::builder()
            .user_agent("stockcast-hub")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            api_key,
            query: query.to_string(),
            analyzer: SentimentAnalyzer::new(),
        })
    }

    async fn fetch_articles(&self) -> Result<Vec<Map<String, Value>>, NewsError> {
        let key = self.api_key.as_deref().ok_or(NewsError::MissingKey)?;
        let resp = self
            .client
            .get(&self.url)
            .query(&[("q", self.query.as_str()), ("apiKey", key)])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(NewsError::Status(resp.status().as_u16()));
        }
        let envelope: ArticlesEnvelope = resp
            .json()
            .await
            .map_err(|e| NewsError::Payload(e.to_string()))?;
        Ok(envelope.articles)
    }

    /// Articles with a `sentiment` field. Empty on any upstream failure.
    pub async fn headlines(&self) -> Vec<Value> {
        match self.fetch_articles().await {
            Ok(articles) => self.annotate(articles),
            Err(e) => {
                tracing::warn!("News fetch failed: {e}");
                Vec::new()
            }
        }
    }

    fn annotate(&self, articles: Vec<Map<String, Value>>) -> Vec<Value> {
        articles
            .into_iter()
            .map(|mut article| {
                let title = article.get("title").and_then(Value::as_str).unwrap_or_default();
                let polarity = self.analyzer.polarity(title);
                article.insert("sentiment".into(), Value::from(polarity));
                Value::Object(article)
            })
            .collect()
    }
}
