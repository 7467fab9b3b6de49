use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::middleware;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth::require_admin;
use crate::db::predictions::{self, PredictionRow};
use crate::db::users::{self, User};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    #[serde(default = "default_recent_limit")]
    limit: u32,
    symbol: Option<String>,
}

fn default_recent_limit() -> u32 {
    30
}

#[derive(Debug, Deserialize)]
pub struct CreateUserBody {
    email: String,
    #[serde(default = "default_role")]
    role: String,
}

fn default_role() -> String {
    "user".to_string()
}

pub fn routes() -> Router<Arc<AppState>> {
    let admin = Router::new()
        .route("/db/users", get(list_users).post(create_user))
        .route("/db/users/demo", post(create_demo_user))
        .route_layer(middleware::from_fn(require_admin));

    Router::new()
        .route("/db/predictions/recent", get(recent_predictions))
        .merge(admin)
}

async fn recent_predictions(
    State(state): State<Arc<AppState>>,
    query: Result<Query<RecentQuery>, QueryRejection>,
) -> Result<Json<Vec<PredictionRow>>, ApiError> {
    let Query(q) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let limit = q.limit.clamp(1, 1000);
    let symbol = q.symbol.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let conn = state.pool.get()?;
    Ok(Json(predictions::recent(&conn, limit, symbol)?))
}

async fn list_users(State(state): State<Arc<AppState>>) -> Result<Json<Vec<User>>, ApiError> {
    let conn = state.pool.get()?;
    Ok(Json(users::list(&conn)?))
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateUserBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let conn = state.pool.get()?;
    let email = body.email.trim();
    let id = users::create(&conn, email, &body.role)?;
    Ok(Json(json!({
        "status": "created",
        "id": id,
        "email": email,
        "role": body.role,
    })))
}

async fn create_demo_user(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let conn = state.pool.get()?;
    match users::create_demo(&conn)? {
        Some(id) => Ok(Json(json!({ "status": "created", "id": id }))),
        None => Ok(Json(json!({ "status": "exists" }))),
    }
}
