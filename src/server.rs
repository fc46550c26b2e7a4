//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Liveness banner |
//! | `GET`  | `/health` | Health check (returns version and mode) |
//! | `POST` | `/ingest` | Chunk and store a batch of documents |
//! | `POST` | `/upload` | Ingest one multipart `file` (text, or an image to caption) |
//! | `POST` | `/search` | Knowledge-base search, no web fallback |
//! | `POST` | `/chat` | One chat turn |
//! | `GET`  | `/history` | Stored chat history |
//! | `DELETE` | `/history` | Clear stored chat history |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "malformed input: message must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `upstream_unavailable` (503),
//! `configuration_missing` (500), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser frontend
//! can call the API directly.

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::bootstrap::Agent;
use crate::config::Config;
use crate::error::EngineError;
use crate::ingest::caption_image;
use crate::loader::media_type_for;
use crate::models::{ContentType, ConversationHistory, ConversationMessage, Document, MessageInput};

/// Starts the HTTP server on `[server].bind`. Runs until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let agent = Arc::new(Agent::from_config(config.clone()).await?);

    if agent.is_dummy() {
        println!("No generative model configured; answers will be dummy responses.");
    }

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    println!("Vector agent listening on http://{}", bind_addr);
    serve(listener, agent).await
}

/// Serve `agent` on an already bound listener.
pub async fn serve(listener: tokio::net::TcpListener, agent: Arc<Agent>) -> anyhow::Result<()> {
    axum::serve(listener, router(agent)).await?;
    Ok(())
}

pub fn router(agent: Arc<Agent>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/ingest", post(handle_ingest))
        .route("/upload", post(handle_upload))
        .route("/search", post(handle_search))
        .route("/chat", post(handle_chat))
        .route("/history", get(handle_history).delete(handle_clear_history))
        .layer(cors)
        .with_state(agent)
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
    code: &'static str,
    message: String,
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

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        let (status, code) = match &err {
            EngineError::MalformedInput(_) | EngineError::InvalidChunking { .. } => {
                (StatusCode::BAD_REQUEST, "bad_request")
            }
            EngineError::UpstreamUnavailable { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "upstream_unavailable")
            }
            EngineError::ConfigurationMissing(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "configuration_missing")
            }
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    tracing::error!(error = %format!("{:#}", err), "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: format!("{:#}", err),
    }
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

// ============ GET / and GET /health ============

async fn handle_root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Vector Store Agent API is running".to_string(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    /// `"dummy"` when no generative model is configured, else `"model"`.
    mode: String,
}

async fn handle_health(State(agent): State<Arc<Agent>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        mode: (if agent.is_dummy() { "dummy" } else { "model" }).to_string(),
    })
}

// ============ POST /ingest ============

#[derive(Serialize)]
struct IngestResponse {
    message: String,
    documents: usize,
    skipped: usize,
    chunks: usize,
}

async fn handle_ingest(
    State(agent): State<Arc<Agent>>,
    Json(documents): Json<Vec<Document>>,
) -> Result<Json<IngestResponse>, AppError> {
    let report = agent.ingest(&documents).await?;
    Ok(Json(IngestResponse {
        message: format!("Ingested {} documents", report.documents),
        documents: report.documents,
        skipped: report.skipped,
        chunks: report.chunks,
    }))
}

// ============ POST /upload ============

fn bad_multipart(err: MultipartError) -> AppError {
    bad_request(format!("invalid multipart body: {}", err))
}

/// Ingest the multipart `file` field. The media type comes from the file
/// name. Images are captioned first, which needs a generative model.
async fn handle_upload(
    State(agent): State<Arc<Agent>>,
    mut multipart: Multipart,
) -> Result<Json<MessageResponse>, AppError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("upload").to_string();
        let bytes = field.bytes().await.map_err(bad_multipart)?;
        upload = Some((name, bytes));
        break;
    }
    let Some((name, bytes)) = upload else {
        return Err(bad_request("multipart field 'file' is required"));
    };

    let media_type = media_type_for(Path::new(&name))
        .ok_or_else(|| bad_request(format!("unsupported file type: {}", name)))?;

    let document = match ContentType::from_media_type(media_type) {
        ContentType::Text => {
            let content = String::from_utf8(bytes.to_vec())
                .map_err(|_| bad_request(format!("{} is not valid UTF-8", name)))?;
            let mut doc = Document::text(name.clone(), content);
            doc.media_type = media_type.to_string();
            doc
        }
        ContentType::Image => {
            let model = agent.model().ok_or_else(|| {
                bad_request("image uploads need a generative model; none is configured")
            })?;
            caption_image(model, &name, &bytes, media_type, agent.config().timeouts.model())
                .await?
        }
    };

    let report = agent.ingest(std::slice::from_ref(&document)).await?;
    if report.documents == 0 {
        return Err(bad_request(format!("{} has no content", name)));
    }

    Ok(Json(MessageResponse {
        message: format!("Successfully ingested {} ({} chunks)", name, report.chunks),
    }))
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<crate::models::KnowledgeBaseItem>,
}

async fn handle_search(
    State(agent): State<Arc<Agent>>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    let results = agent.search(&req.query, req.limit).await?;
    Ok(Json(SearchResponse { results }))
}

// ============ POST /chat ============

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    /// Prior turns, oldest first. Omitted means "use the stored history".
    #[serde(default)]
    history: Option<Vec<MessageInput>>,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
    standalone_query: String,
    sources_used: Vec<&'static str>,
}

async fn handle_chat(
    State(agent): State<Arc<Agent>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let history = req.history.map(ConversationHistory::from_inputs);
    let turn = agent.chat(&req.message, history).await?;
    Ok(Json(ChatResponse {
        response: turn.response,
        standalone_query: turn.standalone_query,
        sources_used: turn.sources_used.iter().map(|s| s.as_str()).collect(),
    }))
}

// ============ /history ============

#[derive(Serialize)]
struct HistoryResponse {
    messages: Vec<ConversationMessage>,
}

async fn handle_history(
    State(agent): State<Arc<Agent>>,
) -> Result<Json<HistoryResponse>, AppError> {
    let messages = agent
        .history()
        .list_recent(agent.config().history.store_limit)
        .await
        .map_err(internal)?;
    Ok(Json(HistoryResponse { messages }))
}

async fn handle_clear_history(
    State(agent): State<Arc<Agent>>,
) -> Result<Json<MessageResponse>, AppError> {
    agent.history().clear().await.map_err(internal)?;
    Ok(Json(MessageResponse {
        message: "Chat history cleared".to_string(),
    }))
}
