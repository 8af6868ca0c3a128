//! HTTP API.
//!
//! # Endpoints
//!
//! | Method   | Path | Description |
//! |----------|------|-------------|
//! | `GET`    | `/` | Service status |
//! | `POST`   | `/index` | Index the configured documents directory |
//! | `POST`   | `/query` | Answer a question for a user |
//! | `GET`    | `/history/{user_id}` | A user's conversation, oldest first |
//! | `DELETE` | `/history/{user_id}` | Clear a user's conversation |
//! | `GET`    | `/stats` | Index, memory and model statistics |
//! | `DELETE` | `/clear-db` | Drop every indexed chunk |
//! | `DELETE` | `/documents/{*filename}` | Drop one file's chunks |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `index_in_progress` (409),
//! `embedding_error` (502), `generation_error` (502),
//! `vector_store_error` (500), `memory_error` (500), `config_error` (500),
//! `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use docqa_core::models::{ConversationTurn, RetrievalResult, SkippedFile};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::rag::RagService;

/// Characters of chunk text echoed back per retrieved document.
const PREVIEW_CHARS: usize = 200;

/// Shared state passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub service: Arc<RagService>,
}

/// Build the router with CORS and request tracing.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/index", post(handle_index))
        .route("/query", post(handle_query))
        .route(
            "/history/{user_id}",
            get(handle_get_history).delete(handle_clear_history),
        )
        .route("/stats", get(handle_stats))
        .route("/clear-db", delete(handle_clear_db))
        .route("/documents/{*filename}", delete(handle_delete_document))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Build the production service from `config` and serve until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let service = RagService::from_config(config).await?;
    let state = AppState {
        config: Arc::new(config.clone()),
        service: Arc::new(service),
    };

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "docqa server listening");
    println!("docqa server listening on http://{}", config.server.bind);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}

// ============ GET / ============

#[derive(Serialize)]
struct RootResponse {
    status: &'static str,
    message: &'static str,
    version: &'static str,
    timestamp: DateTime<Utc>,
    indexed_documents: i64,
}

async fn handle_root(State(state): State<AppState>) -> Result<Json<RootResponse>> {
    let stats = state.service.store_stats().await?;
    Ok(Json(RootResponse {
        status: "running",
        message: "Document QA service",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
        indexed_documents: stats.total_chunks,
    }))
}

// ============ POST /index ============

#[derive(Serialize)]
struct IndexResponse {
    message: String,
    processed_files: Vec<String>,
    total_chunks: usize,
    status: &'static str,
    skipped_files: Vec<SkippedFile>,
}

async fn handle_index(State(state): State<AppState>) -> Result<Json<IndexResponse>> {
    let dir = &state.config.paths.documents_dir;
    let stats = state.service.index_directory(dir).await?;
    Ok(Json(IndexResponse {
        message: format!(
            "Indexed {} files into {} chunks",
            stats.processed_files.len(),
            stats.total_chunks
        ),
        processed_files: stats.processed_files.into_iter().collect(),
        total_chunks: stats.total_chunks,
        status: "completed",
        skipped_files: stats.skipped,
    }))
}

// ============ POST /query ============

#[derive(Deserialize)]
pub struct QueryRequest {
    pub user_id: String,
    pub query: String,
}

#[derive(Serialize)]
struct QueryResponse {
    answer: String,
    retrieved_documents: Vec<RetrievedDocument>,
    conversation_id: String,
    timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
struct RetrievedDocument {
    content: String,
    metadata: DocumentMetadata,
    relevance_score: f32,
}

#[derive(Serialize)]
struct DocumentMetadata {
    source: String,
    filename: String,
    file_type: String,
    chunk_index: i64,
    total_chunks: i64,
}

impl From<&RetrievalResult> for RetrievedDocument {
    fn from(r: &RetrievalResult) -> Self {
        Self {
            content: preview(&r.chunk.text),
            metadata: DocumentMetadata {
                source: r.chunk.source_filename.clone(),
                filename: r.chunk.filename().to_string(),
                file_type: r.chunk.file_type(),
                chunk_index: r.chunk.chunk_index,
                total_chunks: r.chunk.total_chunks,
            },
            relevance_score: r.similarity_score,
        }
    }
}

/// First [`PREVIEW_CHARS`] characters, with `...` appended when cut.
fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

async fn handle_query(
    State(state): State<AppState>,
    body: std::result::Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>> {
    let Json(req) = body.map_err(|e| Error::bad_request(e.body_text()))?;
    let answer = state.service.answer(&req.user_id, &req.query).await?;
    Ok(Json(QueryResponse {
        retrieved_documents: answer.results.iter().map(RetrievedDocument::from).collect(),
        answer: answer.answer,
        conversation_id: answer.user_id,
        timestamp: answer.timestamp,
    }))
}

// ============ /history/{user_id} ============

async fn handle_get_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<Vec<ConversationTurn>> {
    Json(state.service.history(&user_id))
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

async fn handle_clear_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<MessageResponse>> {
    state.service.clear_history(&user_id).await?;
    Ok(Json(MessageResponse {
        message: format!("Conversation history cleared for user {}", user_id),
    }))
}

// ============ GET /stats ============

#[derive(Serialize)]
struct StatsResponse {
    total_documents: i64,
    indexed_files: i64,
    total_chunks: i64,
    total_users: usize,
    model: String,
    embedding_model: String,
    chunk_size: usize,
    chunk_overlap: usize,
    max_history: usize,
}

async fn handle_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let stats = state.service.store_stats().await?;
    Ok(Json(StatsResponse {
        total_documents: stats.total_chunks,
        indexed_files: stats.indexed_files,
        total_chunks: stats.total_chunks,
        total_users: state.service.memory().known_users(),
        model: state.service.llm_model().to_string(),
        embedding_model: state.service.embedding_model().to_string(),
        chunk_size: state.config.chunking.chunk_size,
        chunk_overlap: state.config.chunking.chunk_overlap,
        max_history: state.service.memory().max_history(),
    }))
}

// ============ DELETE /clear-db ============

async fn handle_clear_db(State(state): State<AppState>) -> Result<Json<MessageResponse>> {
    state.service.clear_index().await?;
    Ok(Json(MessageResponse {
        message: "Vector database cleared".to_string(),
    }))
}

// ============ DELETE /documents/{*filename} ============

#[derive(Serialize)]
struct DeleteDocumentResponse {
    message: String,
    deleted_chunks: u64,
}

async fn handle_delete_document(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<DeleteDocumentResponse>> {
    let deleted_chunks = state.service.delete_document(&filename).await?;
    Ok(Json(DeleteDocumentResponse {
        message: format!("Removed {} from the index", filename),
        deleted_chunks,
    }))
}
