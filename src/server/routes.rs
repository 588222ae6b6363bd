//! HTTP route handlers for the search API.

use crate::error::DocvecError;
use crate::metrics::MetricsSnapshot;
use crate::ranker::RankedResult;
use crate::server::AppState;
use crate::storage::{RecordId, RecordStore};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

// --- Request/Response types ---

#[derive(Deserialize)]
pub struct InsertRequest {
    pub text: String,
}

#[derive(Serialize, Deserialize)]
pub struct InsertResponse {
    pub id: RecordId,
}

#[derive(Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub k: Option<usize>,
}

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub document_count: usize,
    pub dimension: usize,
}

#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

// --- Router ---

pub fn create_router<S: RecordStore + Send + Sync + 'static>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route("/documents", post(insert_document::<S>))
        .route("/search", post(search_documents::<S>))
        .route("/health", get(health::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .with_state(state)
}

fn status_for(error: &DocvecError) -> StatusCode {
    match error {
        DocvecError::InvalidArgument(_)
        | DocvecError::DimensionMismatch { .. }
        | DocvecError::InvalidVector { .. } => StatusCode::BAD_REQUEST,
        DocvecError::EmbeddingFailed(_) => StatusCode::BAD_GATEWAY,
        DocvecError::EmbeddingTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject<S: RecordStore>(state: &AppState<S>, error: DocvecError) -> ApiError {
    if let Ok(mut metrics) = state.metrics.write() {
        metrics.record_failure();
    }
    tracing::warn!(error = %error, "request failed");
    (
        status_for(&error),
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

fn lock_poisoned() -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "Lock poisoned".to_string(),
        }),
    )
}

// --- Handlers ---

async fn insert_document<S: RecordStore + Send + Sync + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<InsertRequest>,
) -> Result<(StatusCode, Json<InsertResponse>), ApiError> {
    let start = Instant::now();
    let document = state
        .ingest
        .prepare(&req.text)
        .await
        .map_err(|e| reject(&state, e))?;

    let id = {
        let mut store = state.store.write().map_err(|_| lock_poisoned())?;
        state.ingest.commit(&mut *store, document)
    }
    .map_err(|e| reject(&state, e))?;

    if let Ok(mut metrics) = state.metrics.write() {
        metrics.record_ingest(start.elapsed());
    }

    Ok((StatusCode::CREATED, Json(InsertResponse { id })))
}

async fn search_documents<S: RecordStore + Send + Sync + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<Vec<RankedResult>>, ApiError> {
    let k = req.k.unwrap_or(state.default_k);
    let start = Instant::now();

    let query = state
        .query
        .embed_query(&req.query, k)
        .await
        .map_err(|e| reject(&state, e))?;

    let results = {
        let store = state.store.read().map_err(|_| lock_poisoned())?;
        state.query.rank(&*store, &query, k)
    }
    .map_err(|e| reject(&state, e))?;

    if let Ok(mut metrics) = state.metrics.write() {
        metrics.record_query(start.elapsed());
    }

    Ok(Json(results))
}

async fn health<S: RecordStore + Send + Sync + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<HealthResponse>, ApiError> {
    let store = state.store.read().map_err(|_| lock_poisoned())?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        document_count: store.count(),
        dimension: store.dimension(),
    }))
}

async fn get_metrics<S: RecordStore + Send + Sync + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<MetricsSnapshot>, ApiError> {
    let metrics = state.metrics.read().map_err(|_| lock_poisoned())?;
    Ok(Json(metrics.snapshot()))
}
