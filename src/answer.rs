//! Final answer generation.
//!
//! With a model configured, builds one grounded prompt and calls the model
//! once. Without one, returns a deterministic dummy answer that echoes the
//! sources and the assembled context, so the pipeline can be exercised
//! without a live model.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{bounded, Upstream};
use crate::models::PromptContext;
use crate::traits::GenerativeModel;

/// Prefix of every answer produced without a model.
pub const DUMMY_MARKER: &str = "[Dummy Agent]";

pub struct AnswerGenerator {
    model: Option<Arc<dyn GenerativeModel>>,
    timeout: Duration,
}

impl AnswerGenerator {
    pub fn new(model: Option<Arc<dyn GenerativeModel>>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    pub fn is_dummy(&self) -> bool {
        self.model.is_none()
    }

    /// Produce the answer text. Never fails: model errors become the answer.
    pub async fn generate(&self, query: &str, context: &PromptContext) -> String {
        let Some(model) = &self.model else {
            return dummy_answer(context);
        };

        let prompt = build_answer_prompt(query, context);
        tracing::debug!(model = model.model_name(), prompt_len = prompt.len(), "generating answer");

        match bounded(Upstream::GenerativeModel, self.timeout, model.generate(&prompt)).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "answer generation failed");
                format!("Error generating response: {}", e)
            }
        }
    }
}

/// The grounded answer prompt. Knowledge-base evidence takes priority.
pub fn build_answer_prompt(query: &str, context: &PromptContext) -> String {
    format!(
        "You are a helpful assistant. Use the provided context to answer the user's question.\n\
If the answer is found in the Knowledge Base results, prioritize that.\n\
If the answer is found in the Web Search results, use that and mention it came from the web.\n\
If the answer is not found in the context, say you don't know.\n\
\n\
Context:\n\
{}\n\
\n\
Question: {}\n\
\n\
Answer:",
        context.text, query
    )
}

/// Deterministic answer used when no model is configured.
pub fn dummy_answer(context: &PromptContext) -> String {
    format!(
        "{} Sources: {}\nContext:\n{}\n(Configure GOOGLE_API_KEY)",
        DUMMY_MARKER, context.sources_used, context.text
    )
}
