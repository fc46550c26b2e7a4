//! In-memory [`KnowledgeBaseClient`] for tests and throwaway sessions.
//!
//! Chunks and vectors live in a `Vec` behind `std::sync::RwLock`.

use std::sync::{Arc, RwLock};

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::{embed_query, EmbeddingProvider};
use crate::models::{Chunk, KnowledgeBaseItem};
use crate::traits::KnowledgeBaseClient;

use super::{embed_chunks, rank};

struct StoredChunk {
    content: String,
    vector: Vec<f32>,
}

pub struct InMemoryKnowledgeBase {
    embedder: Arc<dyn EmbeddingProvider>,
    chunks: RwLock<Vec<StoredChunk>>,
}

impl InMemoryKnowledgeBase {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            chunks: RwLock::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KnowledgeBaseClient for InMemoryKnowledgeBase {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<KnowledgeBaseItem>> {
        let empty = self.chunks.read().map_err(|_| poisoned())?.is_empty();
        if empty || limit == 0 {
            return Ok(Vec::new());
        }

        let query_vec = embed_query(self.embedder.as_ref(), query).await?;
        let stored = self
            .chunks
            .read()
            .map_err(|_| poisoned())?;

        Ok(rank(
            &query_vec,
            stored
                .iter()
                .map(|c| (c.content.as_str(), c.vector.as_slice())),
            limit,
        ))
    }

    async fn ingest(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let vectors = embed_chunks(self.embedder.as_ref(), chunks).await?;
        let mut stored = self
            .chunks
            .write()
            .map_err(|_| poisoned())?;
        for (chunk, vector) in chunks.iter().zip(vectors) {
            stored.push(StoredChunk {
                content: chunk.content.clone(),
                vector,
            });
        }
        Ok(chunks.len())
    }
}

fn poisoned() -> anyhow::Error {
    anyhow::anyhow!("knowledge base lock poisoned")
}
