use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::middleware;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::auth::require_admin;
use crate::db::predictions;
use crate::error::ApiError;
use crate::forecast::{forecast_all, ForecastVector, Strategy};
use crate::market;
use crate::state::AppState;
use crate::subprocess::retrain::run_retrain;

pub fn routes() -> Router<Arc<AppState>> {
    let admin = Router::new()
        .route("/stock/upload/", post(upload_dataset))
        .layer(DefaultBodyLimit::disable())
        .route_layer(middleware::from_fn(require_admin));

    Router::new()
        .route("/stock/predict/{symbol}", get(predict))
        .merge(admin)
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub symbol: String,
    pub actual_prices: Vec<f64>,
    pub actual_dates: Vec<String>,
    pub arima_prediction: ForecastVector,
    pub lstm_prediction: ForecastVector,
    pub hybrid_prediction: ForecastVector,
    /// Strategy name → why it fell back. Empty when every model answered.
    pub degraded: BTreeMap<&'static str, String>,
}

/// GET /stock/predict/{symbol}
async fn predict(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Result<Json<PredictResponse>, ApiError> {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(ApiError::BadRequest("symbol must not be empty".to_string()));
    }
    tracing::info!(symbol = %symbol, "Prediction requested");

    let cfg = &state.config;
    let series = market::fetch(
        state.provider.as_ref(),
        &symbol,
        &cfg.history_start,
        &cfg.history_end,
    )
    .await;

    let st = Arc::clone(&state);
    let sym = symbol.clone();
    let (series, set) = tokio::task::spawn_blocking(move || {
        let set = forecast_all(&st.models, &series);
        predictions::persist(&st.pool, &sym, &set);
        (series, set)
    })
    .await
    .map_err(|e| ApiError::Prediction(e.to_string()))?;

    let degraded: BTreeMap<&'static str, String> = Strategy::ALL
        .iter()
        .filter_map(|s| set.get(*s).degraded_reason().map(|r| (s.as_str(), r.to_string())))
        .collect();

    let recent = &series[series.len().saturating_sub(state.config.recent_prices)..];
    Ok(Json(PredictResponse {
        symbol,
        actual_prices: recent.iter().map(|r| r.close).collect(),
        actual_dates: recent.iter().map(|r| r.date.clone()).collect(),
        arima_prediction: set.statistical.vector(),
        lstm_prediction: set.sequence.vector(),
        hybrid_prediction: set.blended.vector(),
        degraded,
    }))
}

/// Keep the final path component and replace anything outside `[A-Za-z0-9._-]`.
fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    base.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

/// POST /stock/upload/: store a CSV and retrain synchronously.
async fn upload_dataset(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let max_bytes = state.config.upload_max_bytes;
    let bad_multipart =
        |e: axum::extract::multipart::MultipartError| ApiError::BadRequest(e.body_text());

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(mut field) = multipart.next_field().await.map_err(bad_multipart)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().map(sanitize_filename).unwrap_or_default();
        if filename.is_empty() {
            return Err(ApiError::BadRequest("missing file name".to_string()));
        }
        if !filename.to_ascii_lowercase().ends_with(".csv") {
            return Err(ApiError::BadRequest("Only .csv files are accepted".to_string()));
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(bad_multipart)? {
            if bytes.len() + chunk.len() > max_bytes {
                return Err(ApiError::BadRequest(format!("File exceeds {max_bytes} bytes")));
            }
            bytes.extend_from_slice(&chunk);
        }
        upload = Some((filename, bytes));
        break;
    }
    let (filename, bytes) =
        upload.ok_or_else(|| ApiError::BadRequest("missing multipart field 'file'".to_string()))?;

    tokio::fs::create_dir_all(&state.config.upload_dir).await?;
    let path = state
        .config
        .upload_dir
        .join(format!("{}_{}", uuid::Uuid::new_v4(), filename));
    tokio::fs::write(&path, &bytes).await?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "Dataset uploaded");

    let stdout_tail = run_retrain(&state.config.retrain_cmd, &state.config.retrain_dir, &path)
        .await
        .map_err(|e| ApiError::Retrain(e.to_string()))?;

    Ok(Json(json!({
        "status": "ok",
        "filename": filename,
        "path": path.display().to_string(),
        "stdout_tail": stdout_tail,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ADMIN_HEADER;
    use crate::forecast::tests::{FixedStatistical, MeanOfWindow};
    use crate::market::tests::row;
    use crate::market::RawRow;
    use crate::models::ModelRegistry;
    use crate::routes::tests::{body_json, get_req, TestApp, TOKEN};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};

    fn rows(closes: &[f64]) -> Vec<RawRow> {
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| row(json!({"Date": format!("2024-02-{:02}", i + 1), "Close": c})))
            .collect()
    }

    #[test]
    fn filenames_are_sanitised() {
        assert_eq!(sanitize_filename("prices.csv"), "prices.csv");
        assert_eq!(sanitize_filename("../../etc/x y.csv"), "x_y.csv");
        assert_eq!(sanitize_filename("C:\\data\\aapl.csv"), "aapl.csv");
        assert_eq!(sanitize_filename("..hidden.csv"), "hidden.csv");
    }

    #[tokio::test]
    async fn predict_without_models_repeats_last_close() {
        let closes = [100.0, 102.0, 101.0, 105.0, 103.0];
        let t = TestApp::new(Ok(rows(&closes)), ModelRegistry::empty());
        let resp = t.send(get_req("/stock/predict/aapl")).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_json(resp).await;
        assert_eq!(body["symbol"], "AAPL");
        assert_eq!(body["actual_prices"], json!([100.0, 102.0, 101.0, 105.0, 103.0]));
        assert_eq!(body["actual_dates"][0], "2024-02-01");
        for key in ["arima_prediction", "lstm_prediction", "hybrid_prediction"] {
            assert_eq!(body[key], json!([103.0, 103.0, 103.0, 103.0, 103.0]), "{key}");
        }
        assert_eq!(body["degraded"]["arima"], "model not loaded");
        assert_eq!(body["degraded"]["lstm"], "model not loaded");
        assert!(body["degraded"].get("hybrid").is_none());
    }

    #[tokio::test]
    async fn predict_with_provider_failure_still_answers() {
        let t = TestApp::new(Err("timeout".into()), ModelRegistry::empty());
        let body = body_json(t.send(get_req("/stock/predict/MSFT")).await).await;
        assert_eq!(body["actual_prices"], json!([]));
        assert_eq!(body["hybrid_prediction"], json!([0.0, 0.0, 0.0, 0.0, 0.0]));
    }

    #[tokio::test]
    async fn predict_trims_actual_prices_and_blends_models() {
        let models = ModelRegistry::empty()
            .with_statistical(Box::new(FixedStatistical(Ok(vec![10.0; 5]))))
            .with_sequence(Box::new(MeanOfWindow { shape: vec![None, Some(3), Some(1)] }));
        let t = TestApp::with_config(Ok(rows(&[20.0; 40])), models, |c| c.recent_prices = 30);

        let body = body_json(t.send(get_req("/stock/predict/TSLA")).await).await;
        assert_eq!(body["actual_prices"].as_array().unwrap().len(), 30);
        assert_eq!(body["arima_prediction"], json!([10.0, 10.0, 10.0, 10.0, 10.0]));
        assert_eq!(body["lstm_prediction"], json!([20.0, 20.0, 20.0, 20.0, 20.0]));
        assert_eq!(body["hybrid_prediction"], json!([14.0, 14.0, 14.0, 14.0, 14.0]));
        assert_eq!(body["degraded"], json!({}));
    }

    #[tokio::test]
    async fn predictions_are_persisted_and_listed() {
        let t = TestApp::new(Ok(rows(&[5.0, 6.0])), ModelRegistry::empty());
        t.send(get_req("/stock/predict/nvda")).await;

        let resp = t.send(get_req("/db/predictions/recent?limit=100")).await;
        let body = body_json(resp).await;
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 15);
        assert!(rows.iter().all(|r| r["symbol"] == "NVDA" && r["value"] == 6.0));
    }

    #[tokio::test]
    async fn failed_persist_still_returns_forecasts() {
        let t = TestApp::new(Ok(rows(&[5.0, 6.0])), ModelRegistry::empty());
        t.state
            .pool
            .get()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_hybrid BEFORE INSERT ON predictions
                 WHEN NEW.model = 'hybrid' BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let resp = t.send(get_req("/stock/predict/nvda")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["hybrid_prediction"], json!([6.0, 6.0, 6.0, 6.0, 6.0]));
        assert_eq!(body["arima_prediction"], json!([6.0, 6.0, 6.0, 6.0, 6.0]));

        let recent = body_json(t.send(get_req("/db/predictions/recent?limit=100")).await).await;
        assert_eq!(recent, json!([]));
    }

    fn multipart_req(filename: &str, content: &str, token: Option<&str>) -> Request<Body> {
        let boundary = "XBOUNDARYX";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: text/csv\r\n\r\n{content}\r\n--{boundary}--\r\n"
        );
        let mut req = Request::post("/stock/upload/")
            .header("content-type", format!("multipart/form-data; boundary={boundary}"));
        if let Some(t) = token {
            req = req.header(ADMIN_HEADER, t);
        }
        req.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn upload_requires_admin() {
        let t = TestApp::new(Ok(vec![]), ModelRegistry::empty());
        let resp = t.send(multipart_req("a.csv", "Date,Close\n", None)).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let resp = t.send(multipart_req("a.csv", "Date,Close\n", Some("nope"))).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn upload_stores_file_and_runs_retrain() {
        let t = TestApp::new(Ok(vec![]), ModelRegistry::empty());
        let resp = t
            .send(multipart_req("prices.csv", "Date,Close\n2024-01-02,1.0", Some(TOKEN)))
            .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_json(resp).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["filename"], "prices.csv");
        let path = std::path::PathBuf::from(body["path"].as_str().unwrap());
        assert!(path.starts_with(t.dir.path().join("uploads")));
        assert!(path.file_name().unwrap().to_str().unwrap().ends_with("_prices.csv"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Date,Close\n2024-01-02,1.0");
    }

    #[tokio::test]
    async fn upload_rejects_wrong_type_and_oversize() {
        let t = TestApp::new(Ok(vec![]), ModelRegistry::empty());
        let resp = t.send(multipart_req("prices.xlsx", "x", Some(TOKEN))).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let big = "1".repeat(2048);
        let resp = t.send(multipart_req("prices.csv", &big, Some(TOKEN))).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_retrain_is_500() {
        let t = TestApp::with_config(Ok(vec![]), ModelRegistry::empty(), |c| {
            c.retrain_cmd = vec!["sh".into(), "-c".into(), "echo bad data >&2; exit 1".into()];
        });
        let resp = t.send(multipart_req("prices.csv", "Date,Close", Some(TOKEN))).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let detail = body_json(resp).await["detail"].as_str().unwrap().to_string();
        assert!(detail.starts_with("Retraining failed:"), "{detail}");
        assert!(detail.contains("bad data"));
    }
}
