//! HTTP route handlers for the breed analysis API.

use crate::advice::{advise_or_message, AdviceRequest};
use crate::extractor::extract_or_zero;
use crate::matcher::{MatchResult, ReferenceSet};
use crate::server::AppState;
use crate::split::rng_from_seed;
use crate::vector::Vector;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, Json},
    routing::{get, post},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;

/// Advice text when the reference set is empty.
const NO_DATASET_ADVICE: &str = "No dataset available.";

// --- Request/Response types ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    /// Base64 image, optionally as a `data:...;base64,` URL
    pub image: Option<String>,
    /// Precomputed feature vector, used instead of `image`
    pub vector: Option<Vec<f32>>,
    #[serde(default)]
    pub user_data: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub breed: String,
    pub confidence: f32,
    pub animal_type: String,
    pub advice: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub reference_count: usize,
}

#[derive(Serialize)]
pub struct ReloadResponse {
    pub status: String,
    pub reference_count: usize,
}

#[derive(Serialize)]
pub struct MetricsResponse {
    pub total_matches: u64,
    pub unknown_matches: u64,
    pub failed_requests: u64,
    pub reloads: u64,
    pub avg_latency_us: f64,
    pub p50_latency_us: f64,
    pub p95_latency_us: f64,
    pub p99_latency_us: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

// --- Router ---

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/metrics", get(get_metrics))
        .route("/api/analyze", post(analyze))
        .route("/api/reload", post(reload))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// --- Handlers ---

async fn home() -> Html<&'static str> {
    Html("<h1>pawmatch backend is running</h1>")
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        reference_count: state.snapshot().len(),
    })
}

/// Strip an optional `data:<mime>;base64,` prefix and decode.
fn decode_image(image: &str) -> Result<Vec<u8>, ApiError> {
    let payload = match image.split_once("base64,") {
        Some((_, data)) => data,
        None => image,
    };
    BASE64
        .decode(payload.trim())
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid base64 image: {}", e)))
}

fn context_strings(user_data: HashMap<String, serde_json::Value>) -> HashMap<String, String> {
    user_data
        .into_iter()
        .map(|(k, v)| match v {
            serde_json::Value::String(s) => (k, s),
            other => (k, other.to_string()),
        })
        .collect()
}

enum Query {
    Vector(Vector),
    Image(Vec<u8>),
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let dimension = state.config.feature_dimension;
    let query = match (req.vector, req.image.as_deref()) {
        (Some(data), _) => {
            let vector = Vector::new(data);
            if vector.dimension() != dimension {
                return Err(api_error(
                    StatusCode::BAD_REQUEST,
                    format!(
                        "Dimension mismatch: expected {}, got {}",
                        dimension,
                        vector.dimension()
                    ),
                ));
            }
            vector
                .ensure_finite()
                .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
            Query::Vector(vector)
        }
        (None, Some(image)) if !image.trim().is_empty() => Query::Image(decode_image(image)?),
        _ => return Err(api_error(StatusCode::BAD_REQUEST, "Image data not found")),
    };
    let context = context_strings(req.user_data);

    let start = Instant::now();
    let worker = Arc::clone(&state);
    let outcome = tokio::task::spawn_blocking(move || run_analysis(&worker, query, context)).await;

    let (result, response) = match outcome {
        Ok(Ok(done)) => done,
        Ok(Err(e)) => {
            tracing::error!("analyze failed: {}", e);
            if let Ok(mut metrics) = state.metrics.write() {
                metrics.record_failure();
            }
            return Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
        Err(e) => {
            tracing::error!("analyze task panicked: {}", e);
            if let Ok(mut metrics) = state.metrics.write() {
                metrics.record_failure();
            }
            return Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal error"));
        }
    };

    if let Ok(mut metrics) = state.metrics.write() {
        metrics.record_match(start.elapsed(), result.is_unknown());
    }
    Ok(Json(response))
}

/// Extract (if needed), match against the current snapshot, ask for advice.
fn run_analysis(
    state: &AppState,
    query: Query,
    context: HashMap<String, String>,
) -> anyhow::Result<(MatchResult, AnalyzeResponse)> {
    let dimension = state.config.feature_dimension;
    let query = match query {
        Query::Vector(vector) => vector,
        Query::Image(bytes) => {
            let mut upload = tempfile::Builder::new()
                .prefix("pawmatch-upload-")
                .suffix(&format!(".{}", state.config.image_extension))
                .tempfile()?;
            upload.write_all(&bytes)?;
            upload.flush()?;
            extract_or_zero(state.extractor.as_ref(), upload.path(), dimension)
        }
    };

    let snapshot = state.snapshot();
    let full = ReferenceSet::full(&snapshot);
    let reference = match state.config.sample_size {
        Some(size) => full.sample(size, &mut rng_from_seed(state.config.seed)),
        None => full,
    };
    let result = state.config.matcher().match_or_unknown(&query, &reference)?;

    let is_special = state.config.is_special(&result.label);
    let advice = if result.is_unknown() {
        NO_DATASET_ADVICE.to_string()
    } else {
        let request = AdviceRequest {
            label: result.label.clone(),
            is_special,
            context,
        };
        advise_or_message(state.advice.as_ref(), &request)
    };

    let response = AnalyzeResponse {
        breed: result.label.clone(),
        confidence: result.confidence,
        animal_type: if is_special { "cat" } else { "dog" }.to_string(),
        advice,
    };
    Ok((result, response))
}

async fn reload(State(state): State<Arc<AppState>>) -> Result<Json<ReloadResponse>, ApiError> {
    let worker = Arc::clone(&state);
    let loaded = tokio::task::spawn_blocking(move || worker.store.load_required())
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let count = loaded.len();
    state.swap(loaded);
    if let Ok(mut metrics) = state.metrics.write() {
        metrics.record_reload();
    }
    tracing::info!("Reference set reloaded ({} entries)", count);

    Ok(Json(ReloadResponse {
        status: "reloaded".to_string(),
        reference_count: count,
    }))
}

async fn get_metrics(State(state): State<Arc<AppState>>) -> Result<Json<MetricsResponse>, ApiError> {
    let metrics = state
        .metrics
        .read()
        .map_err(|_| api_error(StatusCode::INTERNAL_SERVER_ERROR, "Lock poisoned"))?;

    Ok(Json(MetricsResponse {
        total_matches: metrics.total_matches(),
        unknown_matches: metrics.unknown_matches(),
        failed_requests: metrics.failed_requests(),
        reloads: metrics.reloads(),
        avg_latency_us: metrics.avg_latency_us(),
        p50_latency_us: metrics.percentile_latency_us(50.0),
        p95_latency_us: metrics.percentile_latency_us(95.0),
        p99_latency_us: metrics.percentile_latency_us(99.0),
    }))
}
