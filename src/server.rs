//! HTTP transport for the memory orchestrator.
//!
//! Requests are validated here. The orchestrator assumes its inputs are
//! already within bounds.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Readiness report (200 ready, 503 not ready) |
//! | `POST`   | `/documents` | Ingest one document |
//! | `POST`   | `/documents/batch` | Ingest up to 100 documents |
//! | `GET`    | `/documents/{id}` | Fetch a document |
//! | `DELETE` | `/documents/{id}` | Delete a document and its derived data |
//! | `POST`   | `/context` | Context retrieval |
//! | `POST`   | `/search` | Semantic search |
//! | `GET`    | `/stats` | Store statistics and activity counters |
//!
//! Every route except `/health` passes the readiness gate first.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `conflict` (409),
//! `cancelled` (408), `not_ready` (503), `processing_failed`,
//! `vector_store_error`, `graph_store_error`, `language_service_error`,
//! `internal` (all 500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use context_memory_core::error::{MemoryError, RepositoryError};
use context_memory_core::models::{
    BatchIngestionResult, ContextResponse, Document, DocumentSource, HealthReport,
    IngestionResult, MemoryStatistics, Metadata, SearchResponse,
};

use crate::metrics::CounterSnapshot;
use crate::orchestrator::{
    ContextRequest, IngestOptions, MemoryOrchestrator, OrchestratorParams, SearchRequest,
};

pub const MAX_BATCH_DOCUMENTS: usize = 100;
pub const MAX_CONTENT_BYTES: usize = 50 * 1024 * 1024;
pub const MIN_CHUNK_SIZE: usize = 100;
pub const MAX_CHUNK_SIZE: usize = 10_000;
pub const MAX_RESULT_LIMIT: usize = 100;

/// Request bodies may carry a full batch of large documents.
const MAX_BODY_BYTES: usize = 128 * 1024 * 1024;

#[derive(Clone)]
struct AppState {
    orchestrator: Arc<MemoryOrchestrator>,
    /// Parent of every per-request cancellation token.
    shutdown: CancellationToken,
}

/// Serve the API on `bind` until `shutdown` is cancelled.
pub async fn run_server(
    bind: &str,
    orchestrator: Arc<MemoryOrchestrator>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = build_router(orchestrator, shutdown.clone());
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "memory server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    info!("memory server stopped");
    Ok(())
}

pub fn build_router(orchestrator: Arc<MemoryOrchestrator>, shutdown: CancellationToken) -> Router {
    let state = AppState {
        orchestrator,
        shutdown,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let gated = Router::new()
        .route("/documents", post(handle_ingest))
        .route("/documents/batch", post(handle_batch))
        .route(
            "/documents/{id}",
            get(handle_get_document).delete(handle_delete_document),
        )
        .route("/context", post(handle_context))
        .route("/search", post(handle_search))
        .route("/stats", get(handle_stats))
        .route_layer(middleware::from_fn_with_state(state.clone(), readiness_gate));

    Router::new()
        .route("/health", get(handle_health))
        .merge(gated)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .with_state(state)
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

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<MemoryError> for AppError {
    fn from(err: MemoryError) -> Self {
        let message = err.to_string();
        let (status, code) = match &err {
            MemoryError::Validation(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            MemoryError::NotReady(_) => (StatusCode::SERVICE_UNAVAILABLE, "not_ready"),
            MemoryError::Cancelled => (StatusCode::REQUEST_TIMEOUT, "cancelled"),
            MemoryError::Repository(RepositoryError::NotFound { .. }) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            MemoryError::Repository(RepositoryError::AlreadyExists { .. }) => {
                (StatusCode::CONFLICT, "conflict")
            }
            MemoryError::Processing { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "processing_failed")
            }
            MemoryError::VectorStore(_) => (StatusCode::INTERNAL_SERVER_ERROR, "vector_store_error"),
            MemoryError::GraphStore(_) => (StatusCode::INTERNAL_SERVER_ERROR, "graph_store_error"),
            MemoryError::LanguageService(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "language_service_error")
            }
            MemoryError::Repository(_) | MemoryError::BatchPartialFailure { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            warn!(code, error = %message, "request failed");
        }
        AppError::new(status, code, message)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::new(StatusCode::BAD_REQUEST, "bad_request", rejection.body_text())
    }
}

// ============ Validation ============

fn validate_content(content: &str) -> Result<(), MemoryError> {
    if content.len() > MAX_CONTENT_BYTES {
        return Err(MemoryError::validation(format!(
            "content exceeds {} bytes",
            MAX_CONTENT_BYTES
        )));
    }
    Ok(())
}

/// Overrides are checked against each other and against the configured
/// defaults they combine with.
fn validate_options(
    options: &IngestOptions,
    params: &OrchestratorParams,
) -> Result<(), MemoryError> {
    if let Some(size) = options.chunk_size {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&size) {
            return Err(MemoryError::validation(format!(
                "chunk_size must be between {} and {}",
                MIN_CHUNK_SIZE, MAX_CHUNK_SIZE
            )));
        }
    }
    let size = options.chunk_size.unwrap_or(params.chunk_size);
    let overlap = options.overlap.unwrap_or(params.overlap);
    if overlap >= size {
        return Err(MemoryError::validation(format!(
            "overlap ({}) must be less than chunk_size ({})",
            overlap, size
        )));
    }
    Ok(())
}

fn validate_query(query: &str) -> Result<(), MemoryError> {
    if query.trim().is_empty() {
        return Err(MemoryError::validation("query must not be empty"));
    }
    Ok(())
}

fn validate_limit(name: &str, value: usize) -> Result<(), MemoryError> {
    if !(1..=MAX_RESULT_LIMIT).contains(&value) {
        return Err(MemoryError::validation(format!(
            "{} must be between 1 and {}",
            name, MAX_RESULT_LIMIT
        )));
    }
    Ok(())
}

// ============ Readiness ============

async fn readiness_gate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    match state.orchestrator.ensure_ready().await {
        Ok(()) => next.run(request).await,
        Err(err) => AppError::from(err).into_response(),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    components: HealthReport,
}

async fn handle_health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let components = state.orchestrator.health().await;
    let (status_code, status) = if components.is_ready() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };
    (
        status_code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            components,
        }),
    )
}

// ============ Documents ============

/// A document as submitted over the wire. `id` defaults to a new UUID.
#[derive(Debug, Deserialize)]
struct DocumentInput {
    #[serde(default)]
    id: Option<String>,
    content: String,
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    source: Option<DocumentSource>,
}

impl DocumentInput {
    fn into_document(self) -> Document {
        let mut document = match self.id {
            Some(id) => Document::with_id(id, self.content),
            None => Document::new(self.content),
        };
        document.metadata = self.metadata;
        if let Some(source) = self.source {
            document.source = source;
        }
        document
    }
}

#[derive(Debug, Deserialize)]
struct IngestRequest {
    #[serde(flatten)]
    document: DocumentInput,
    #[serde(default)]
    options: IngestOptions,
}

#[derive(Debug, Deserialize)]
struct BatchRequest {
    documents: Vec<DocumentInput>,
    #[serde(default)]
    options: IngestOptions,
}

async fn handle_ingest(
    State(state): State<AppState>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<Json<IngestionResult>, AppError> {
    let Json(request) = payload?;
    validate_content(&request.document.content)?;
    validate_options(&request.options, state.orchestrator.params())?;

    let cancel = state.shutdown.child_token();
    let result = state
        .orchestrator
        .ingest_document(request.document.into_document(), &request.options, &cancel)
        .await?;
    Ok(Json(result))
}

async fn handle_batch(
    State(state): State<AppState>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchIngestionResult>, AppError> {
    let Json(request) = payload?;
    if request.documents.is_empty() || request.documents.len() > MAX_BATCH_DOCUMENTS {
        return Err(MemoryError::validation(format!(
            "batch must contain between 1 and {} documents",
            MAX_BATCH_DOCUMENTS
        ))
        .into());
    }
    for document in &request.documents {
        validate_content(&document.content)?;
    }
    validate_options(&request.options, state.orchestrator.params())?;

    let cancel = state.shutdown.child_token();
    let documents = request
        .documents
        .into_iter()
        .map(DocumentInput::into_document)
        .collect();
    let result = state
        .orchestrator
        .ingest_batch(documents, &request.options, &cancel)
        .await;
    Ok(Json(result))
}

async fn handle_get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Document>, AppError> {
    let cancel = state.shutdown.child_token();
    match state.orchestrator.get_document(&id, &cancel).await? {
        Some(document) => Ok(Json(document)),
        None => Err(MemoryError::from(RepositoryError::NotFound { id }).into()),
    }
}

#[derive(Serialize)]
struct DeleteResponse {
    id: String,
    deleted: bool,
}

async fn handle_delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let cancel = state.shutdown.child_token();
    if state.orchestrator.delete_document(&id, &cancel).await? {
        Ok(Json(DeleteResponse { id, deleted: true }))
    } else {
        Err(MemoryError::from(RepositoryError::NotFound { id }).into())
    }
}

// ============ Retrieval ============

async fn handle_context(
    State(state): State<AppState>,
    payload: Result<Json<ContextRequest>, JsonRejection>,
) -> Result<Json<ContextResponse>, AppError> {
    let Json(request) = payload?;
    validate_query(&request.query)?;
    validate_limit("max_documents", request.max_documents)?;

    let cancel = state.shutdown.child_token();
    Ok(Json(state.orchestrator.get_context(&request, &cancel).await?))
}

async fn handle_search(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Json(request) = payload?;
    validate_query(&request.query)?;
    validate_limit("limit", request.limit)?;

    let cancel = state.shutdown.child_token();
    Ok(Json(state.orchestrator.search(&request, &cancel).await?))
}

#[derive(Serialize)]
struct StatsResponse {
    statistics: MemoryStatistics,
    counters: CounterSnapshot,
}

async fn handle_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, AppError> {
    let cancel = state.shutdown.child_token();
    let statistics = state.orchestrator.statistics(&cancel).await?;
    Ok(Json(StatsResponse {
        statistics,
        counters: state.orchestrator.counters().snapshot(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_bounds() {
        let params = OrchestratorParams::default();
        let mut options = IngestOptions::default();
        assert!(validate_options(&options, &params).is_ok());

        options.chunk_size = Some(99);
        assert!(validate_options(&options, &params).is_err());
        options.chunk_size = Some(10_001);
        assert!(validate_options(&options, &params).is_err());

        options.chunk_size = Some(200);
        options.overlap = Some(200);
        assert!(validate_options(&options, &params).is_err());
        options.overlap = Some(20);
        assert!(validate_options(&options, &params).is_ok());
    }

    #[test]
    fn test_overrides_checked_against_configured_defaults() {
        let params = OrchestratorParams::default();

        let overlap_only = IngestOptions {
            overlap: Some(600),
            ..IngestOptions::default()
        };
        let err = validate_options(&overlap_only, &params).unwrap_err();
        assert!(matches!(err, MemoryError::Validation(_)));

        // Default overlap is 50.
        let small_chunks = IngestOptions {
            chunk_size: Some(100),
            ..IngestOptions::default()
        };
        assert!(validate_options(&small_chunks, &params).is_ok());
        let tight = OrchestratorParams {
            overlap: 150,
            ..OrchestratorParams::default()
        };
        assert!(validate_options(&small_chunks, &tight).is_err());
    }

    #[test]
    fn test_query_and_limit() {
        assert!(validate_query("   ").is_err());
        assert!(validate_query("deploy").is_ok());
        assert!(validate_limit("limit", 0).is_err());
        assert!(validate_limit("limit", 101).is_err());
        assert!(validate_limit("limit", 100).is_ok());
    }

    #[test]
    fn test_error_status_mapping() {
        let status = |e: MemoryError| AppError::from(e).status;
        assert_eq!(status(MemoryError::validation("x")), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(MemoryError::NotReady("vector_store".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(status(MemoryError::Cancelled), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(
            status(RepositoryError::NotFound { id: "d".into() }.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(MemoryError::GraphStore(anyhow::anyhow!("down"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_document_input_defaults() {
        let input: DocumentInput = serde_json::from_str(r#"{"content":"hello"}"#).unwrap();
        let doc = input.into_document();
        assert!(!doc.id.is_empty());
        assert_eq!(doc.source.source_type, "api");

        let input: DocumentInput =
            serde_json::from_str(r#"{"id":"d1","content":"x","metadata":{"type":"note"}}"#).unwrap();
        let doc = input.into_document();
        assert_eq!(doc.id, "d1");
        assert_eq!(doc.metadata["type"], serde_json::json!("note"));
    }
}
