//! SQLite-backed [`KnowledgeBaseClient`].
//!
//! Chunks are stored in `kb_chunks` together with their embedding as a
//! little-endian f32 BLOB. Search loads every vector written by the
//! current model and scores them in process.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, embed_query, vec_to_blob, EmbeddingProvider};
use crate::models::{Chunk, KnowledgeBaseItem};
use crate::traits::KnowledgeBaseClient;

use super::{embed_chunks, rank};

pub struct SqliteKnowledgeBase {
    pool: SqlitePool,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SqliteKnowledgeBase {
    /// The pool must already have had [`run_migrations`](crate::migrate::run_migrations) applied.
    pub fn new(pool: SqlitePool, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { pool, embedder }
    }

    /// Number of stored chunks, across all models.
    pub async fn count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kb_chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}

#[async_trait]
impl KnowledgeBaseClient for SqliteKnowledgeBase {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<KnowledgeBaseItem>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT content, embedding FROM kb_chunks WHERE model = ? ORDER BY created_at, chunk_index",
        )
        .bind(self.embedder.model_name())
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = embed_query(self.embedder.as_ref(), query).await?;

        let stored: Vec<(String, Vec<f32>)> = rows
            .iter()
            .map(|row| {
                let content: String = row.get("content");
                let blob: Vec<u8> = row.get("embedding");
                (content, blob_to_vec(&blob))
            })
            .collect();

        let items = rank(
            &query_vec,
            stored.iter().map(|(c, v)| (c.as_str(), v.as_slice())),
            limit,
        );

        tracing::debug!(candidates = stored.len(), returned = items.len(), "knowledge base search");
        Ok(items)
    }

    async fn ingest(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let vectors = embed_chunks(self.embedder.as_ref(), chunks).await?;
        let now = chrono::Utc::now().timestamp();
        let model = self.embedder.model_name();

        let mut tx = self.pool.begin().await?;

        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            let source = chunk
                .metadata
                .get("source")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            let metadata_json = serde_json::to_string(&chunk.metadata)?;

            sqlx::query(
                r#"
                INSERT INTO kb_chunks (id, source, chunk_index, content, content_type,
                                       metadata_json, embedding, model, dims, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(source)
            .bind(chunk.index as i64)
            .bind(&chunk.content)
            .bind(chunk.content_type.as_str())
            .bind(&metadata_json)
            .bind(vec_to_blob(vector))
            .bind(model)
            .bind(vector.len() as i64)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(chunks.len())
    }
}
