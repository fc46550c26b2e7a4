//! Knowledge-base retrieval with web-search fallback.
//!
//! # Fallback Policy
//!
//! 1. Search the knowledge base for at most `kb_limit` items.
//! 2. `top_score` is the first item's score, or `0.0` when nothing matched.
//! 3. If `top_score < fallback_threshold` (strict), search the web for at
//!    most `web_limit` items and append them after the knowledge-base items.
//!    The two lists are never interleaved or re-ranked together.
//! 4. A failed or timed-out web search contributes zero items.
//!
//! The knowledge base is a required dependency: its failure fails the query.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{bounded, EngineError, Upstream};
use crate::models::{RetrievalResult, RetrievedItem, Source, SourcesUsed};
use crate::traits::{KnowledgeBaseClient, WebSearchClient};

/// Default minimum top score for the knowledge base to be trusted alone.
pub const DEFAULT_FALLBACK_THRESHOLD: f64 = 0.75;

/// Default number of knowledge-base items requested per query.
pub const DEFAULT_KB_LIMIT: usize = 3;

/// Default number of web items requested on fallback.
pub const DEFAULT_WEB_LIMIT: usize = 3;

/// Admission control for the web-search fallback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallbackPolicy {
    pub fallback_threshold: f64,
    pub kb_limit: usize,
    pub web_limit: usize,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            fallback_threshold: DEFAULT_FALLBACK_THRESHOLD,
            kb_limit: DEFAULT_KB_LIMIT,
            web_limit: DEFAULT_WEB_LIMIT,
        }
    }
}

impl FallbackPolicy {
    /// Whether a knowledge-base top score calls for web search.
    pub fn needs_fallback(&self, top_score: f64) -> bool {
        top_score < self.fallback_threshold
    }
}

pub struct RetrievalOrchestrator {
    knowledge_base: Arc<dyn KnowledgeBaseClient>,
    web: Arc<dyn WebSearchClient>,
    policy: FallbackPolicy,
    timeout: Duration,
}

impl RetrievalOrchestrator {
    pub fn new(
        knowledge_base: Arc<dyn KnowledgeBaseClient>,
        web: Arc<dyn WebSearchClient>,
        policy: FallbackPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            knowledge_base,
            web,
            policy,
            timeout,
        }
    }

    /// Run the fallback policy for one query.
    pub async fn retrieve(&self, search_query: &str) -> Result<RetrievalResult, EngineError> {
        tracing::info!(query = search_query, "searching knowledge base");
        let kb_items = bounded(
            Upstream::KnowledgeBase,
            self.timeout,
            self.knowledge_base.search(search_query, self.policy.kb_limit),
        )
        .await?;

        let top_score = kb_items.first().map(|item| item.score).unwrap_or(0.0);
        tracing::info!(top_score, hits = kb_items.len(), "knowledge base searched");

        let mut items: Vec<RetrievedItem> = kb_items
            .into_iter()
            .take(self.policy.kb_limit)
            .map(RetrievedItem::KnowledgeBase)
            .collect();
        let mut sources_used = SourcesUsed::knowledge_base();

        if self.policy.needs_fallback(top_score) {
            tracing::info!(
                top_score,
                threshold = self.policy.fallback_threshold,
                provider = self.web.name(),
                "score below threshold, searching the web"
            );
            sources_used.insert(Source::WebSearch);

            match bounded(
                Upstream::WebSearch,
                self.timeout,
                self.web.search(search_query, self.policy.web_limit),
            )
            .await
            {
                Ok(web_items) => {
                    tracing::debug!(hits = web_items.len(), "web search returned");
                    items.extend(
                        web_items
                            .into_iter()
                            .take(self.policy.web_limit)
                            .map(RetrievedItem::Web),
                    );
                }
                Err(e) => {
                    tracing::warn!(error = %e, "web search failed, continuing with knowledge base results");
                }
            }
        }

        Ok(RetrievalResult {
            items,
            sources_used,
        })
    }
}
