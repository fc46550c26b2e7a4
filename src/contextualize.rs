//! Follow-up question rewriting.
//!
//! Turns a question that leans on earlier turns ("what about its
//! license?") into a standalone query suitable for retrieval. Any failure
//! degrades to the original question.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{bounded, Upstream};
use crate::models::ConversationHistory;
use crate::traits::GenerativeModel;

/// Default number of history messages shown to the rewriter.
pub const DEFAULT_REWRITE_WINDOW: usize = 3;

pub struct QueryContextualizer {
    model: Option<Arc<dyn GenerativeModel>>,
    window: usize,
    timeout: Duration,
}

impl QueryContextualizer {
    pub fn new(model: Option<Arc<dyn GenerativeModel>>, window: usize, timeout: Duration) -> Self {
        Self {
            model,
            window,
            timeout,
        }
    }

    /// Rewrite `query` into a standalone question.
    ///
    /// Returns `query` unchanged when the history is empty, when no model
    /// is configured, or when the model call fails or answers with
    /// nothing. Makes at most one model call and never retries.
    pub async fn rewrite(&self, query: &str, history: &ConversationHistory) -> String {
        let model = match &self.model {
            Some(m) if !history.is_empty() => m,
            _ => return query.to_string(),
        };

        let prompt = build_rewrite_prompt(query, history, self.window);

        match bounded(Upstream::GenerativeModel, self.timeout, model.generate(&prompt)).await {
            Ok(text) => {
                let rewritten = text.trim();
                if rewritten.is_empty() {
                    tracing::warn!("query rewrite returned empty text, using original query");
                    query.to_string()
                } else {
                    tracing::info!(original = query, rewritten, "rewrote follow-up question");
                    rewritten.to_string()
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "query rewrite failed, using original query");
                query.to_string()
            }
        }
    }
}

/// Render the rewrite prompt from the last `window` history messages.
pub fn build_rewrite_prompt(query: &str, history: &ConversationHistory, window: usize) -> String {
    let lines: Vec<String> = history
        .recent(window)
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect();

    format!(
        "Given the following conversation history and a follow-up question, \
rephrase the follow-up question to be a standalone question that can be understood \
without the conversation history. Do not answer the question. \
Return only the standalone question.\n\n\
Chat History:\n{}\n\n\
Follow-up Question: {}\n\n\
Standalone Question:",
        lines.join("\n"),
        query
    )
}
