use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;

/// Header carrying the shared admin secret.
pub const ADMIN_HEADER: &str = "x-admin-token";

/// Axum middleware for admin routes: require `X-Admin-Token: <token>`.
///
/// Missing or mismatched header ⇒ 403.
pub async fn require_admin(request: Request, next: Next) -> Response {
    let token = request
        .extensions()
        .get::<AdminToken>()
        .map(|t| t.0.clone())
        .unwrap_or_default();

    let provided = request
        .headers()
        .get(ADMIN_HEADER)
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(value)
            if !token.is_empty() && constant_time_eq(value.as_bytes(), token.as_bytes()) =>
        {
            next.run(request).await
        }
        _ => {
            tracing::warn!(path = %request.uri().path(), "admin token missing or invalid");
            ApiError::Forbidden("Admin token missing or invalid".to_string()).into_response()
        }
    }
}

/// Extension type injected into every request so the middleware can read the token.
#[derive(Clone)]
pub struct AdminToken(pub String);

/// Constant-time comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
