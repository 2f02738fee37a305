//! HTTP surface for the chatbot and its admin panel.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ask` | Answer a question `{question, session_id?}` |
//! | `POST` | `/index/run` | Trigger an indexing run `{rebuild?}` (409 if busy) |
//! | `GET`  | `/index/progress` | Poll `{percent, message, running}` |
//! | `POST` | `/index/reload` | Reload the persisted vector index |
//! | `GET`  | `/documents` | List registered documents |
//! | `GET`  | `/documents/stats` | Per-status document counts |
//! | `DELETE` | `/documents/{id}` | Remove a document and its stored file |
//! | `GET`  | `/cache` | List cached answers, most recently used first |
//! | `POST` | `/cache/clear` | Drop all cached answers |
//! | `DELETE` | `/cache/{id}` | Drop one cached answer |
//! | `POST` | `/statistics/reload` | Reload the statistics table |
//! | `GET`  | `/health` | Health check |
//!
//! # Error contract
//!
//! Non-`/ask` errors come back as `{ "error": { "code", "message" } }`.
//! A failed `/ask` answers with a generic apology plus the error, never a
//! fabricated answer.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted; the admin front-end is
//! served from a different origin.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::cache;
use crate::pipeline::{run_indexing, IndexMode};
use crate::registry;
use crate::router::ChatContext;
use crate::vector_index::VectorIndex;

/// Start the HTTP server on the configured bind address.
pub async fn run_server(ctx: Arc<ChatContext>) -> anyhow::Result<()> {
    let bind_addr = ctx.config.server.bind.clone();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/ask", post(handle_ask))
        .route("/index/run", post(handle_index_run))
        .route("/index/progress", get(handle_index_progress))
        .route("/index/reload", post(handle_index_reload))
        .route("/documents", get(handle_list_documents))
        .route("/documents/stats", get(handle_document_stats))
        .route("/documents/{id}", delete(handle_delete_document))
        .route("/cache", get(handle_list_cache))
        .route("/cache/clear", post(handle_clear_cache))
        .route("/cache/{id}", delete(handle_delete_cache_entry))
        .route("/statistics/reload", post(handle_reload_statistics))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(ctx);

    println!("laakon server listening on http://{}", bind_addr);

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

fn conflict(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::CONFLICT,
        code: "conflict".to_string(),
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

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    #[serde(default)]
    session_id: Option<String>,
}

async fn handle_ask(
    State(ctx): State<Arc<ChatContext>>,
    Json(req): Json<AskRequest>,
) -> Response {
    if req.question.trim().is_empty() {
        return bad_request("Pertanyaan kosong.").into_response();
    }

    match ctx.answer_question(&req.question, req.session_id).await {
        Ok(answer) => Json(answer).into_response(),
        Err(e) => {
            eprintln!("Error answering question: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "answer": "Maaf, terjadi kesalahan pada sistem AI.",
                    "error": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

// ============ Indexing ============

#[derive(Deserialize, Default)]
struct IndexRunRequest {
    #[serde(default)]
    rebuild: bool,
}

/// Kick off an indexing run in the background. At most one run may be in
/// flight; a second trigger answers 409 instead of overlapping.
async fn handle_index_run(
    State(ctx): State<Arc<ChatContext>>,
    body: Option<Json<IndexRunRequest>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Json(req) = body.unwrap_or_default();
    let guard = ctx
        .index_state
        .try_begin()
        .map_err(|e| conflict(e.to_string()))?;

    let mode = if req.rebuild {
        IndexMode::Rebuild
    } else {
        IndexMode::Incremental
    };

    let task_ctx = ctx.clone();
    tokio::spawn(async move {
        let result = run_indexing(
            &task_ctx.config,
            &task_ctx.pool,
            task_ctx.embedder.as_ref(),
            mode,
            &guard,
        )
        .await;
        drop(guard);

        match result {
            Ok(report) => {
                println!(
                    "Indexing done: {} documents, {} chunks, {} batches ok, {} failed",
                    report.documents_processed,
                    report.chunks_extracted,
                    report.batches_ok,
                    report.batches_failed
                );
                // The corpus changed: pick up the new index and drop stale
                // cached answers.
                if VectorIndex::exists(&task_ctx.config.storage.index_dir) {
                    if let Err(e) = task_ctx.reload_index().await {
                        eprintln!("Warning: could not reload vector index: {}", e);
                    }
                }
                if let Err(e) = cache::clear(&task_ctx.pool).await {
                    eprintln!("Warning: could not clear answer cache: {}", e);
                }
            }
            Err(e) => eprintln!("Indexing run failed: {:#}", e),
        }
    });

    Ok(Json(serde_json::json!({
        "success": true,
        "mode": if req.rebuild { "rebuild" } else { "incremental" },
    })))
}

async fn handle_index_progress(State(ctx): State<Arc<ChatContext>>) -> Json<serde_json::Value> {
    let snapshot = ctx.index_state.snapshot();
    Json(serde_json::to_value(snapshot).unwrap_or_default())
}

async fn handle_index_reload(
    State(ctx): State<Arc<ChatContext>>,
) -> Result<Json<serde_json::Value>, AppError> {
    ctx.reload_index().await.map_err(|e| internal(e.to_string()))?;
    Ok(Json(serde_json::json!({ "success": true })))
}

// ============ Documents ============

async fn handle_list_documents(
    State(ctx): State<Arc<ChatContext>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let documents = registry::list_documents(&ctx.pool)
        .await
        .map_err(|e| internal(e.to_string()))?;
    Ok(Json(serde_json::json!(documents)))
}

async fn handle_document_stats(
    State(ctx): State<Arc<ChatContext>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let stats = registry::document_stats(&ctx.pool)
        .await
        .map_err(|e| internal(e.to_string()))?;
    Ok(Json(serde_json::json!(stats)))
}

/// Remove a document's registry record and stored file. Cached answers may
/// reference the removed content, so the cache is cleared too.
async fn handle_delete_document(
    State(ctx): State<Arc<ChatContext>>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let record = registry::get_document(&ctx.pool, id)
        .await
        .map_err(|e| internal(e.to_string()))?
        .ok_or_else(|| not_found(format!("no document with id {}", id)))?;

    let stored = std::path::Path::new(&record.file_path).join(&record.file_name);
    if stored.is_file() {
        if let Err(e) = std::fs::remove_file(&stored) {
            eprintln!("Warning: could not remove {}: {}", stored.display(), e);
        }
    }

    registry::delete_document(&ctx.pool, id)
        .await
        .map_err(|e| internal(e.to_string()))?;
    cache::clear(&ctx.pool)
        .await
        .map_err(|e| internal(e.to_string()))?;

    Ok(Json(serde_json::json!({ "success": true })))
}

// ============ Cache administration ============

async fn handle_list_cache(
    State(ctx): State<Arc<ChatContext>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let entries = cache::list(&ctx.pool)
        .await
        .map_err(|e| internal(e.to_string()))?;
    Ok(Json(serde_json::json!(entries)))
}

async fn handle_clear_cache(
    State(ctx): State<Arc<ChatContext>>,
) -> Result<Json<serde_json::Value>, AppError> {
    cache::clear(&ctx.pool)
        .await
        .map_err(|e| internal(e.to_string()))?;
    Ok(Json(serde_json::json!({ "success": true })))
}

async fn handle_delete_cache_entry(
    State(ctx): State<Arc<ChatContext>>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    cache::delete(&ctx.pool, id)
        .await
        .map_err(|e| internal(e.to_string()))?;
    Ok(Json(serde_json::json!({ "success": true })))
}

// ============ Statistics ============

async fn handle_reload_statistics(
    State(ctx): State<Arc<ChatContext>>,
) -> Result<Json<serde_json::Value>, AppError> {
    ctx.reload_statistics()
        .await
        .map_err(|e| internal(e.to_string()))?;
    Ok(Json(serde_json::json!({ "success": true })))
}
