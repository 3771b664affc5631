//! JSON HTTP API.
//!
//! Exposes the ingest pipeline and its downstream consumers over HTTP:
//! uploads are accepted as jobs and processed on a spawned task, job status
//! and analytics are queryable, and search/analysis mirror the CLI
//! commands.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/logs/upload` | Accept a log file body, enqueue a processing job |
//! | `GET`  | `/jobs/{id}` | Status of one job |
//! | `GET`  | `/analytics` | Aggregate statistics |
//! | `POST` | `/search` | Keyword/semantic/hybrid search |
//! | `POST` | `/analyze` | Root-cause analysis over selected records |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Error responses are JSON:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "content must not be empty" } }
//! ```
//!
//! Codes: `bad_request` (400), `not_found` (404), `embeddings_disabled`
//! (400), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! dashboards.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::analytics;
use crate::analyze;
use crate::config::Config;
use crate::db;
use crate::ingest;
use crate::jobs;
use crate::search::{self, SearchFilters};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    pool: SqlitePool,
}

/// Start the API server on the configured bind address. Runs until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let pool = db::connect(config).await?;

    let state = AppState {
        config: Arc::new(config.clone()),
        pool,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/logs/upload", post(handle_upload))
        .route("/jobs/{id}", get(handle_job_status))
        .route("/analytics", get(handle_analytics))
        .route("/search", post(handle_search))
        .route("/analyze", post(handle_analyze))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("API server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

/// Map search/pipeline errors onto the HTTP contract. Validation and
/// configuration problems surface as 400s; everything else is a 500.
fn classify_error(err: anyhow::Error) -> AppError {
    let msg = err.to_string();

    if msg.contains("requires embeddings") || msg.contains("Embedding provider is disabled") {
        let mut e = bad_request(msg);
        e.code = "embeddings_disabled".to_string();
        e
    } else if msg.contains("Unknown search mode") || msg.contains("disabled") {
        bad_request(msg)
    } else {
        internal(msg)
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /logs/upload ============

#[derive(Deserialize)]
struct UploadRequest {
    filename: String,
    content: String,
}

#[derive(Serialize)]
struct UploadResponse {
    job_id: String,
    filename: String,
    status: String,
    message: String,
}

/// Accept a log file and enqueue it. Processing happens on a spawned task;
/// the response returns immediately with the queued job's id.
async fn handle_upload(
    State(state): State<AppState>,
    Json(request): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, AppError> {
    if request.filename.trim().is_empty() {
        return Err(bad_request("filename must not be empty"));
    }
    if request.content.trim().is_empty() {
        return Err(bad_request("content must not be empty"));
    }

    let content_hash = ingest::hash_content(&request.content);
    let job_id = jobs::create_job(&state.pool, &request.filename, &content_hash)
        .await
        .map_err(|e| internal(e.to_string()))?;

    let pool = state.pool.clone();
    let config = state.config.clone();
    let spawned_job_id = job_id.clone();
    let content = request.content;

    tokio::spawn(async move {
        // process_job records completed/failed on the job row itself; the
        // error is only logged here for the operator.
        if let Err(e) =
            ingest::process_job(&pool, &config, &spawned_job_id, &content, None).await
        {
            eprintln!("Warning: job {} failed: {}", spawned_job_id, e);
        }
    });

    Ok(Json(UploadResponse {
        job_id,
        filename: request.filename,
        status: "queued".to_string(),
        message: "Processing started".to_string(),
    }))
}

// ============ GET /jobs/{id} ============

#[derive(Serialize)]
struct JobStatusResponse {
    job_id: String,
    status: String,
    processed_count: Option<i64>,
    error: Option<String>,
}

async fn handle_job_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobStatusResponse>, AppError> {
    let job = jobs::get_job(&state.pool, &id)
        .await
        .map_err(|e| internal(e.to_string()))?
        .ok_or_else(|| not_found(format!("job not found: {}", id)))?;

    Ok(Json(JobStatusResponse {
        job_id: job.id,
        status: job.status,
        processed_count: job.processed_count,
        error: job.error,
    }))
}

// ============ GET /analytics ============

async fn handle_analytics(
    State(state): State<AppState>,
) -> Result<Json<analytics::AnalyticsSummary>, AppError> {
    let summary = analytics::gather_analytics(&state.pool)
        .await
        .map_err(|e| internal(e.to_string()))?;

    Ok(Json(summary))
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default = "default_mode")]
    mode: String,
    #[serde(default)]
    service: Option<String>,
    #[serde(default)]
    limit: Option<i64>,
}

fn default_mode() -> String {
    "keyword".to_string()
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<search::LogHit>,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    let filters = SearchFilters {
        service: request.service,
        since: None,
    };

    let results = search::search_logs(
        &state.pool,
        &state.config,
        &request.query,
        &request.mode,
        &filters,
        request.limit,
    )
    .await
    .map_err(classify_error)?;

    Ok(Json(SearchResponse { results }))
}

// ============ POST /analyze ============

#[derive(Deserialize)]
struct AnalyzeRequest {
    #[serde(default)]
    log_ids: Option<Vec<String>>,
    #[serde(default)]
    service: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

async fn handle_analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<analyze::RootCauseReport>, AppError> {
    if !state.config.analysis.is_enabled() {
        return Err(bad_request(
            "Analysis provider is disabled. Set [analysis] provider in config.",
        ));
    }

    let limit = request.limit.unwrap_or(state.config.analysis.max_records);

    let lines = match &request.log_ids {
        Some(ids) if !ids.is_empty() => analyze::lines_for_ids(&state.pool, ids)
            .await
            .map_err(|e| internal(e.to_string()))?,
        _ => analyze::top_anomalous_lines(&state.pool, request.service.as_deref(), limit)
            .await
            .map_err(|e| internal(e.to_string()))?,
    };

    if lines.is_empty() {
        return Err(not_found("no records to analyze"));
    }

    let report = match analyze::analyze_root_cause(&state.config.analysis, &lines).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Warning: analysis failed: {}", e);
            analyze::failed_report()
        }
    };

    Ok(Json(report))
}
