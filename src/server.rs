//! JSON HTTP API over a shared [`CorpusManager`].
//!
//! # Endpoints
//!
//! | Method   | Path | Description |
//! |----------|------|-------------|
//! | `POST`   | `/api/upload?filename=` | Ingest a PDF/DOCX/TXT file sent as the raw body |
//! | `POST`   | `/api/text-input` | Ingest pasted text |
//! | `POST`   | `/api/answer` | Answer a question from the corpus |
//! | `POST`   | `/api/extract` | Ranked passages without composition |
//! | `GET`    | `/api/documents` | List documents |
//! | `GET`    | `/api/documents/{id}` | One document with its passages |
//! | `DELETE` | `/api/documents/{id}` | Delete one document |
//! | `DELETE` | `/api/documents` | Delete everything |
//! | `GET`    | `/api/config` | Effective engine settings and corpus counts |
//! | `GET`    | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "document not found: 42" } }
//! ```
//!
//! Client mistakes are 400, unknown documents 404, provider timeouts 408,
//! unusable content 422, and unreachable providers 503.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use docuquery_core::config::BackendKind;
use docuquery_core::models::{Answer, DocumentSummary, DocumentView, RankedPassage, SourceKind};
use docuquery_core::{CoreError, CorpusManager, ProviderError};

use crate::config::Config;
use crate::extract::{extract_file, ExtractError};

#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    corpus: Arc<CorpusManager>,
}

impl AppState {
    pub fn new(config: Arc<Config>, corpus: Arc<CorpusManager>) -> Self {
        Self { config, corpus }
    }
}

/// Build the router. Used by [`run_server`] and by tests.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let upload_limit = state.config.server.max_upload_bytes;

    Router::new()
        .route("/api/upload", post(handle_upload))
        .route("/api/text-input", post(handle_text_input))
        .route("/api/answer", post(handle_answer))
        .route("/api/extract", post(handle_extract))
        .route(
            "/api/documents",
            get(handle_list_documents).delete(handle_clear_documents),
        )
        .route(
            "/api/documents/{id}",
            get(handle_get_document).delete(handle_delete_document),
        )
        .route("/api/config", get(handle_config))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(cors)
        .with_state(state)
}

/// Binds to `[server].bind` and serves until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let corpus = crate::build_corpus(config)?;
    let bind_addr = config.server.bind.clone();
    let state = AppState::new(Arc::new(config.clone()), Arc::new(corpus));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "DocuQuery server listening");
    axum::serve(listener, router(state)).await?;

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

pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::warn!(code = %self.code, message = %self.message, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        let status = match &err {
            CoreError::InvalidQuery(_) | CoreError::InvalidFilter(_) => StatusCode::BAD_REQUEST,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::EmptyDocument | CoreError::NoRelevantContent => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            CoreError::CompositionUnavailable(ProviderError::Timeout(_))
            | CoreError::Embedding(ProviderError::Timeout(_)) => StatusCode::REQUEST_TIMEOUT,
            CoreError::CompositionUnavailable(_) | CoreError::Embedding(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            CoreError::Configuration(_) | CoreError::IndexBuild(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        AppError::new(status, err.code(), err.to_string())
    }
}

impl From<ExtractError> for AppError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::UnsupportedFormat(_) => {
                AppError::new(StatusCode::BAD_REQUEST, "unsupported_format", err.to_string())
            }
            ExtractError::ExtractionFailed { .. } => AppError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "extraction_failed",
                err.to_string(),
            ),
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
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

// ============ Ingestion ============

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub document_id: String,
    pub title: String,
    pub kind: SourceKind,
    pub char_count: usize,
    pub passage_count: usize,
}

fn ingest_response(corpus: &CorpusManager, id: String) -> Result<IngestResponse, AppError> {
    let view = corpus.document(&id)?;
    Ok(IngestResponse {
        title: view.document.title.clone(),
        kind: view.document.kind,
        char_count: view.document.text.chars().count(),
        passage_count: view.passages.len(),
        document_id: id,
    })
}

#[derive(Debug, Deserialize)]
struct UploadParams {
    filename: String,
    #[serde(default)]
    title: Option<String>,
}

async fn handle_upload(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<Json<IngestResponse>, AppError> {
    if body.is_empty() {
        return Err(bad_request("upload body must not be empty"));
    }
    let filename = params.filename.clone();
    let (kind, text) = tokio::task::spawn_blocking(move || extract_file(&filename, &body))
        .await
        .map_err(|e| {
            AppError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                format!("extraction task failed: {}", e),
            )
        })??;

    let title = params
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(params.filename);
    let id = state.corpus.ingest_file_text(&text, &title, kind).await?;
    Ok(Json(ingest_response(&state.corpus, id)?))
}

#[derive(Debug, Deserialize)]
struct TextInputRequest {
    text: String,
    #[serde(default)]
    title: Option<String>,
}

async fn handle_text_input(
    State(state): State<AppState>,
    Json(req): Json<TextInputRequest>,
) -> Result<Json<IngestResponse>, AppError> {
    let id = state
        .corpus
        .ingest_text(&req.text, req.title.as_deref())
        .await?;
    Ok(Json(ingest_response(&state.corpus, id)?))
}

// ============ Queries ============

#[derive(Debug, Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
    #[serde(default)]
    document_ids: Option<Vec<String>>,
}

async fn handle_answer(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<Answer>, AppError> {
    let answer = state
        .corpus
        .query(&req.query, req.top_k, req.document_ids.as_deref())
        .await?;
    Ok(Json(answer))
}

#[derive(Debug, Serialize)]
struct ExtractResponse {
    query: String,
    passages: Vec<RankedPassage>,
}

async fn handle_extract(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<ExtractResponse>, AppError> {
    let passages = state
        .corpus
        .extract_passages(&req.query, req.top_k, req.document_ids.as_deref())
        .await?;
    Ok(Json(ExtractResponse {
        query: req.query,
        passages,
    }))
}

// ============ Documents ============

#[derive(Debug, Serialize)]
struct DocumentListResponse {
    documents: Vec<DocumentSummary>,
    total: usize,
}

async fn handle_list_documents(State(state): State<AppState>) -> Json<DocumentListResponse> {
    let documents = state.corpus.list_documents();
    Json(DocumentListResponse {
        total: documents.len(),
        documents,
    })
}

async fn handle_get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentView>, AppError> {
    Ok(Json(state.corpus.document(&id)?))
}

async fn handle_delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.corpus.delete(&id)?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

async fn handle_clear_documents(State(state): State<AppState>) -> Json<serde_json::Value> {
    let removed = state.corpus.clear();
    Json(serde_json::json!({ "deleted": removed }))
}

// ============ GET /api/config ============

#[derive(Debug, Serialize)]
struct ConfigResponse {
    backend: BackendKind,
    chunk_size: usize,
    overlap: usize,
    top_k: usize,
    max_top_k: usize,
    embedding_provider: Option<String>,
    completion_provider: String,
    strategy: docuquery_core::models::StrategyKind,
    documents: usize,
    passages: usize,
}

async fn handle_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    let engine = state.corpus.config();
    let stats = state.corpus.stats();
    Json(ConfigResponse {
        backend: engine.backend,
        chunk_size: engine.chunking.chunk_size(),
        overlap: engine.chunking.overlap(),
        top_k: engine.default_top_k,
        max_top_k: engine.max_top_k,
        embedding_provider: match engine.backend {
            BackendKind::Dense => Some(state.config.embedding.provider.clone()),
            BackendKind::Lexical => None,
        },
        completion_provider: state.config.completion.provider.clone(),
        strategy: state.corpus.composer().strategy().kind(),
        documents: stats.documents,
        passages: stats.passages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    async fn spawn() -> String {
        let config = Config::minimal();
        let corpus = crate::build_corpus(&config).unwrap();
        let app = router(AppState::new(Arc::new(config), Arc::new(corpus)));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_ingest_answer_delete_flow() {
        let base = spawn().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{}/api/text-input", base))
            .json(&json!({ "text": "Kubernetes schedules containers onto nodes.", "title": "k8s" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        let id = body["document_id"].as_str().unwrap().to_string();
        assert_eq!(body["passage_count"], 1);
        assert_eq!(body["kind"], "direct_input");

        let answer: Value = client
            .post(format!("{}/api/answer", base))
            .json(&json!({ "query": "what schedules containers?" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(answer["strategy"], "extractive");
        assert_eq!(answer["sources"][0]["document_title"], "k8s");

        let resp = client
            .delete(format!("{}/api/documents/{}", base, id))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let resp = client
            .delete(format!("{}/api/documents/{}", base, id))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
        let err: Value = resp.json().await.unwrap();
        assert_eq!(err["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn test_upload_raw_text_file() {
        let base = spawn().await;
        let client = reqwest::Client::new();
        let resp = client
            .post(format!("{}/api/upload?filename=notes.txt", base))
            .body("Cargo is the Rust package manager.")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["title"], "notes.txt");
        assert_eq!(body["kind"], "plain_text");

        let resp = client
            .post(format!("{}/api/upload?filename=slides.pptx", base))
            .body("whatever")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let err: Value = resp.json().await.unwrap();
        assert_eq!(err["error"]["code"], "unsupported_format");
    }

    #[tokio::test]
    async fn test_query_errors() {
        let base = spawn().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{}/api/answer", base))
            .json(&json!({ "query": "anything" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 422);

        let resp = client
            .post(format!("{}/api/extract", base))
            .json(&json!({ "query": "" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        let resp = client
            .post(format!("{}/api/extract", base))
            .json(&json!({ "query": "x", "document_ids": ["nope"] }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let err: Value = resp.json().await.unwrap();
        assert_eq!(err["error"]["code"], "invalid_filter");

        let resp = client
            .post(format!("{}/api/text-input", base))
            .json(&json!({ "text": "   " }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 422);
    }

    #[tokio::test]
    async fn test_list_config_and_health() {
        let base = spawn().await;
        let client = reqwest::Client::new();
        for text in ["first document", "second document"] {
            client
                .post(format!("{}/api/text-input", base))
                .json(&json!({ "text": text }))
                .send()
                .await
                .unwrap();
        }
        let list: Value = client
            .get(format!("{}/api/documents", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(list["total"], 2);

        let config: Value = client
            .get(format!("{}/api/config", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(config["backend"], "lexical");
        assert_eq!(config["chunk_size"], 1000);
        assert_eq!(config["documents"], 2);

        let cleared: Value = client
            .delete(format!("{}/api/documents", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(cleared["deleted"], 2);

        let health: Value = client
            .get(format!("{}/health", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");
    }
}
