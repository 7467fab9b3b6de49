use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

use crate::config::HubConfig;
use crate::db::{open_pool, DbPool};
use crate::market::{PriceProvider, YahooChartProvider};
use crate::models::ModelRegistry;
use crate::news::NewsClient;

/// Shared application state, passed to all route handlers via `axum::extract::State`.
///
/// Nothing here is mutated after startup.
pub struct AppState {
    pub config: HubConfig,
    pub pool: DbPool,
    pub models: ModelRegistry,
    pub provider: Arc<dyn PriceProvider>,
    pub news: NewsClient,
}

impl AppState {
    pub fn new(config: HubConfig) -> anyhow::Result<Arc<Self>> {
        let timeout = Duration::from_secs(config.http_timeout_s);

        let pool = open_pool(&config.db_path, config.db_pool_size)
            .with_context(|| format!("opening database {}", config.db_path.display()))?;
        let models = ModelRegistry::load(&config.arima_path(), &config.lstm_path());
        let provider = YahooChartProvider::new(&config.provider_url, timeout)
            .context("building market data client")?;
        let news = NewsClient::new(
            &config.news_api_url,
            config.news_api_key.clone(),
            &config.news_query,
            timeout,
        )
        .context("building news client")?;
        if config.news_api_key.is_none() {
            tracing::warn!("NEWS_API_KEY not set, /news/ will return an empty list");
        }

        Ok(Self::from_parts(config, pool, models, Arc::new(provider), news))
    }

    pub fn from_parts(
        config: HubConfig,
        pool: DbPool,
        models: ModelRegistry,
        provider: Arc<dyn PriceProvider>,
        news: NewsClient,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            pool,
            models,
            provider,
            news,
        })
    }
}
