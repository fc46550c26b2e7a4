//! Knowledge-base backends.
//!
//! Both backends embed chunks at ingestion time through an
//! [`EmbeddingProvider`] and rank by brute-force [`relevance_score`] over
//! every stored vector at query time.
//!
//! | Backend | Type | Persistence |
//! |---------|------|-------------|
//! | `sqlite` | [`SqliteKnowledgeBase`] | `kb_chunks` table |
//! | `memory` | [`InMemoryKnowledgeBase`] | process lifetime |

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryKnowledgeBase;
pub use sqlite::SqliteKnowledgeBase;

use anyhow::{bail, Result};

use crate::embedding::{relevance_score, EmbeddingProvider};
use crate::models::{Chunk, KnowledgeBaseItem};

/// Embed chunk contents, checking that the provider returned one vector each.
pub(crate) async fn embed_chunks(
    provider: &dyn EmbeddingProvider,
    chunks: &[Chunk],
) -> Result<Vec<Vec<f32>>> {
    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let vectors = provider.embed(&texts).await?;
    if vectors.len() != chunks.len() {
        bail!(
            "embedding provider returned {} vectors for {} chunks",
            vectors.len(),
            chunks.len()
        );
    }
    Ok(vectors)
}

/// Score `candidates` against `query`, best first, at most `limit`.
///
/// Ties keep insertion order.
pub(crate) fn rank<'a, I>(query: &[f32], candidates: I, limit: usize) -> Vec<KnowledgeBaseItem>
where
    I: IntoIterator<Item = (&'a str, &'a [f32])>,
{
    let mut scored: Vec<KnowledgeBaseItem> = candidates
        .into_iter()
        .map(|(content, vector)| KnowledgeBaseItem {
            content: content.to_string(),
            score: relevance_score(query, vector),
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(limit);
    scored
}
