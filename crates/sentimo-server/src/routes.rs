//! HTTP routes and handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{debug, error, warn};

use crate::service::{PredictionService, ServiceStatus};
use sentimo_model::Classifier;

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PredictionService>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(service: Arc<PredictionService>) -> Self {
        Self {
            service,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/predict", post(predict))
        .route("/reload", post(reload))
        .fallback(fallback)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn home() -> Json<serde_json::Value> {
    Json(json!({ "message": "Sentiment analysis API is running" }))
}

async fn health_check(State(state): State<AppState>) -> Json<ServiceStatus> {
    Json(state.service.status())
}

async fn metrics(State(state): State<AppState>) -> String {
    state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub text: String,
    pub sentiment: String,
    pub score: f32,
    pub run_id: Option<String>,
}

async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::InvalidRequest(e.body_text()))?;

    let result = state.service.classify(&request.text).await?;
    debug!(
        "Predicted {} ({:.3}) in {}us",
        result.label, result.score, result.latency_us
    );

    Ok(Json(PredictResponse {
        text: request.text,
        sentiment: result.label.to_string(),
        score: result.score,
        run_id: result.metadata.run_id,
    }))
}

async fn reload(State(state): State<AppState>) -> Result<Json<ServiceStatus>, AppError> {
    let service = state.service.clone();
    let status = tokio::task::spawn_blocking(move || service.reload())
        .await
        .map_err(|e| AppError::Internal(format!("reload task failed: {e}")))??;
    Ok(Json(status))
}

async fn fallback() -> AppError {
    AppError::NotFound
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    InvalidRequest(String),
    Unavailable(String),
    NotFound,
    Internal(String),
}

impl From<sentimo_core::Error> for AppError {
    fn from(err: sentimo_core::Error) -> Self {
        use sentimo_core::Error;
        match err {
            Error::ModelUnavailable(_) => AppError::Unavailable(err.to_string()),
            Error::Config(_) | Error::InvalidRecord(_) => AppError::InvalidRequest(err.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unavailable(msg) => {
                warn!("Request refused: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, msg)
            }
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            AppError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
