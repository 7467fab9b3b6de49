use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use std::sync::Arc;

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/news/", get(news))
}

/// GET /news/: headlines with sentiment; never an error.
async fn news(State(state): State<Arc<AppState>>) -> Json<Vec<Value>> {
    Json(state.news.headlines().await)
}
