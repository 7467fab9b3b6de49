pub mod db;
pub mod news;
pub mod stock;

use axum::routing::get;
use axum::{Extension, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::AdminToken;
use crate::error::ApiError;
use crate::state::AppState;

/// Assemble the API router.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(stock::routes())
        .merge(db::routes())
        .merge(news::routes())
        .fallback(not_found)
}

/// The full application: routes, admin token, CORS and request tracing.
pub fn app(state: Arc<AppState>) -> Router {
    let token = state.config.admin_token.clone();
    api_router()
        .layer(Extension(AdminToken(token)))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Stock Prediction API is running!" }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Not Found".to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::HubConfig;
    use crate::db::open_pool;
    use crate::market::tests::StaticProvider;
    use crate::market::RawRow;
    use crate::models::ModelRegistry;
    use crate::news::NewsClient;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use std::time::Duration;
    use tower::ServiceExt;

    pub(crate) const TOKEN: &str = "test-admin";

    pub(crate) struct TestApp {
        pub dir: tempfile::TempDir,
        pub state: Arc<AppState>,
    }

    impl TestApp {
        pub(crate) fn new(rows: Result<Vec<RawRow>, String>, models: ModelRegistry) -> Self {
            Self::with_config(rows, models, |_| {})
        }

        pub(crate) fn with_config(
            rows: Result<Vec<RawRow>, String>,
            models: ModelRegistry,
            tweak: impl FnOnce(&mut HubConfig),
        ) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let mut config = HubConfig::for_tests(dir.path());
            tweak(&mut config);
            let pool = open_pool(&config.db_path, config.db_pool_size).unwrap();
            let news = NewsClient::new(
                &config.news_api_url,
                None,
                &config.news_query,
                Duration::from_millis(200),
            )
            .unwrap();
            let provider = Arc::new(StaticProvider(rows));
            let state = AppState::from_parts(config, pool, models, provider, news);
            Self { dir, state }
        }

        pub(crate) async fn send(&self, req: Request<Body>) -> Response {
            app(Arc::clone(&self.state)).oneshot(req).await.unwrap()
        }
    }

    pub(crate) async fn body_json(resp: Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    pub(crate) fn get_req(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn root_and_health() {
        let t = TestApp::new(Ok(vec![]), ModelRegistry::empty());

        let resp = t.send(get_req("/")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["message"], "Stock Prediction API is running!");

        let resp = t.send(get_req("/health")).await;
        assert_eq!(body_json(resp).await, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn unknown_route_is_404_with_detail() {
        let t = TestApp::new(Ok(vec![]), ModelRegistry::empty());
        let resp = t.send(get_req("/nope")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await["detail"], "Not Found");
    }

    #[tokio::test]
    async fn cors_allows_any_origin() {
        let t = TestApp::new(Ok(vec![]), ModelRegistry::empty());
        let req = Request::get("/health")
            .header("origin", "http://localhost:3000")
            .body(Body::empty())
            .unwrap();
        let resp = t.send(req).await;
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    }
}
