//! Capability traits for the engine's external collaborators.
//!
//! The orchestration components depend only on these traits. Concrete
//! adapters (SQLite knowledge base, DuckDuckGo, Gemini, ...) are built
//! once at startup and handed in as `Arc<dyn Trait>`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  ┌────────────────┐  ┌───────────────────┐
//! │ KnowledgeBase    │  │ WebSearch      │  │ GenerativeModel   │
//! │ sqlite / memory  │  │ duckduckgo     │  │ gemini            │
//! └────────┬─────────┘  └───────┬────────┘  └─────────┬─────────┘
//!          └──────────────┬─────┴─────────────────────┘
//!                         ▼
//!                  ChatEngine::respond()
//! ```
//!
//! All traits are async (via `async-trait`) and `Send + Sync` so the same
//! instances can serve concurrent HTTP requests.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Chunk, ConversationMessage, KnowledgeBaseItem, Role, WebItem};

// ═══════════════════════════════════════════════════════════════════════
// Knowledge Base
// ═══════════════════════════════════════════════════════════════════════

/// The private document store, searched by semantic similarity.
///
/// The engine never mutates stored chunks; it only searches and appends.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use anyhow::Result;
/// use vector_agent::models::{Chunk, KnowledgeBaseItem};
/// use vector_agent::traits::KnowledgeBaseClient;
///
/// struct FixedKnowledgeBase;
///
/// #[async_trait]
/// impl KnowledgeBaseClient for FixedKnowledgeBase {
///     async fn search(&self, _query: &str, limit: usize) -> Result<Vec<KnowledgeBaseItem>> {
///         let mut items = vec![KnowledgeBaseItem { content: "Rust is fast.".into(), score: 0.9 }];
///         items.truncate(limit);
///         Ok(items)
///     }
///
///     async fn ingest(&self, chunks: &[Chunk]) -> Result<usize> {
///         Ok(chunks.len())
///     }
/// }
/// ```
#[async_trait]
pub trait KnowledgeBaseClient: Send + Sync {
    /// Return at most `limit` matches ranked by descending score.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<KnowledgeBaseItem>>;

    /// Embed and store chunks in order. Returns the number inserted.
    ///
    /// Must accept an empty slice and return `Ok(0)`.
    async fn ingest(&self, chunks: &[Chunk]) -> Result<usize>;
}

// ═══════════════════════════════════════════════════════════════════════
// Web Search
// ═══════════════════════════════════════════════════════════════════════

/// Secondary retrieval source consulted when the knowledge base is weak.
#[async_trait]
pub trait WebSearchClient: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Return at most `limit` snippets in provider rank order.
    ///
    /// Implementations should prefer an empty list over an error on
    /// transient failures; callers tolerate errors either way.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebItem>>;
}

// ═══════════════════════════════════════════════════════════════════════
// Generative Model
// ═══════════════════════════════════════════════════════════════════════

/// A text generation backend.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Model identifier (e.g. `"gemini-2.5-flash"`).
    fn model_name(&self) -> &str;

    /// Generate text for a prompt. One call, no streaming.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate text for a prompt with an attached image.
    ///
    /// Used by ingestion to caption images before chunking.
    async fn generate_with_image(
        &self,
        prompt: &str,
        image: &[u8],
        mime_type: &str,
    ) -> Result<String>;
}

// ═══════════════════════════════════════════════════════════════════════
// History Store
// ═══════════════════════════════════════════════════════════════════════

/// Persistent chat history. Append-only or full clear, never partial update.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, role: Role, content: &str) -> Result<()>;

    /// The most recent `limit` messages, oldest first.
    async fn list_recent(&self, limit: usize) -> Result<Vec<ConversationMessage>>;

    async fn clear(&self) -> Result<()>;
}
