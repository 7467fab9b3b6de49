use std::env;
use std::path::PathBuf;

/// Hub configuration derived from environment variables.
///
/// `ADMIN_TOKEN` and `DATABASE_URL` are read without the `STOCKCAST_`
/// prefix so an existing `.env` file works unchanged.
#[derive(Debug, Clone)]
pub struct HubConfig {
    pub bind: String,
    pub port: u16,
    /// Shared secret expected in `X-Admin-Token` on admin routes.
    pub admin_token: String,

    // ── Database ───────────────────────────────────────────────────
    pub db_path: PathBuf,
    pub db_pool_size: u32,

    // ── Models ─────────────────────────────────────────────────────
    pub models_dir: PathBuf,

    // ── Market data ────────────────────────────────────────────────
    pub provider_url: String,
    pub history_start: String,
    pub history_end: String,
    /// How many trailing closes go back as `actual_prices`.
    pub recent_prices: usize,
    pub http_timeout_s: u64,

    // ── Upload + retrain ───────────────────────────────────────────
    pub upload_dir: PathBuf,
    pub upload_max_bytes: usize,
    pub retrain_cmd: Vec<String>,
    pub retrain_dir: PathBuf,

    // ── News ───────────────────────────────────────────────────────
    pub news_api_url: String,
    pub news_api_key: Option<String>,
    pub news_query: String,
}

fn env_str(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_u16(name: &str, default: u16) -> u16 {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_path(name: &str, default: &str) -> PathBuf {
    PathBuf::from(env_str(name, default))
}

/// Turn a `DATABASE_URL` into a SQLite file path.
///
/// Accepts `sqlite:///relative.db`, `sqlite:////abs/path.db`,
/// `sqlite://file.db` and bare paths.
pub fn sqlite_path_from_url(url: &str) -> PathBuf {
    let url = url.trim();
    let rest = url
        .strip_prefix("sqlite:///")
        .or_else(|| url.strip_prefix("sqlite://"))
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    PathBuf::from(rest)
}

/// Split a command line on whitespace. Quoting is not supported.
fn split_command(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

impl HubConfig {
    pub fn from_env() -> Self {
        let db_url = env_str("DATABASE_URL", "sqlite:///./app.db");

        Self {
            bind: env_str("STOCKCAST_BIND", "127.0.0.1"),
            port: env_u16("STOCKCAST_PORT", 8000),
            admin_token: env_str("ADMIN_TOKEN", "dev-admin"),
            db_path: sqlite_path_from_url(&db_url),
            db_pool_size: env_u32("STOCKCAST_DB_POOL_SIZE", 8).max(1),
            models_dir: env_path("STOCKCAST_MODELS_DIR", "./models"),
            provider_url: env_str(
                "STOCKCAST_PROVIDER_URL",
                "https://query1.finance.yahoo.com/v8/finance/chart",
            ),
            history_start: env_str("STOCKCAST_HISTORY_START", "2024-01-01"),
            history_end: env_str("STOCKCAST_HISTORY_END", "2025-01-01"),
            recent_prices: env_usize("STOCKCAST_RECENT_PRICES", 30).max(1),
            http_timeout_s: env_u64("STOCKCAST_HTTP_TIMEOUT_S", 20).max(1),
            upload_dir: env_path("STOCKCAST_UPLOAD_DIR", "./uploads"),
            upload_max_bytes: env_usize("STOCKCAST_UPLOAD_MAX_BYTES", 10 * 1024 * 1024),
            retrain_cmd: split_command(&env_str("STOCKCAST_RETRAIN_CMD", "python3 train_all.py")),
            retrain_dir: env_path("STOCKCAST_RETRAIN_DIR", "."),
            news_api_url: env_str("NEWS_API_URL", "https://newsapi.org/v2/everything"),
            news_api_key: env::var("NEWS_API_KEY")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            news_query: env_str("NEWS_QUERY", "stocks"),
        }
    }

    /// Path of the statistical model artifact.
    pub fn arima_path(&self) -> PathBuf {
        self.models_dir.join("arima_model.json")
    }

    /// Path of the sequence model artifact.
    pub fn lstm_path(&self) -> PathBuf {
        self.models_dir.join("lstm_model.json")
    }

    /// Config rooted in `dir`, with every outbound endpoint pointed at a
    /// closed local port.
    #[cfg(test)]
    pub fn for_tests(dir: &std::path::Path) -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 0,
            admin_token: "test-admin".to_string(),
            db_path: dir.join("app.db"),
            db_pool_size: 2,
            models_dir: dir.join("models"),
            provider_url: "http://127.0.0.1:9/chart".to_string(),
            history_start: "2024-01-01".to_string(),
            history_end: "2025-01-01".to_string(),
            recent_prices: 30,
            http_timeout_s: 1,
            upload_dir: dir.join("uploads"),
            upload_max_bytes: 1024,
            retrain_cmd: vec!["true".to_string()],
            retrain_dir: dir.to_path_buf(),
            news_api_url: "http://127.0.0.1:9/news".to_string(),
            news_api_key: None,
            news_query: "stocks".to_string(),
        }
    }
}
