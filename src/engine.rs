//! One chat turn, end to end.
//!
//! ```text
//! message + history
//!       │
//!       ▼
//! QueryContextualizer ──▶ RetrievalOrchestrator ──▶ assemble() ──▶ AnswerGenerator
//!   standalone query        KB (+ web fallback)      prompt ctx       response text
//! ```
//!
//! The steps run strictly in sequence. Only a knowledge-base failure
//! aborts the turn; every other failure degrades inside its component.

use crate::answer::AnswerGenerator;
use crate::assemble::assemble;
use crate::contextualize::QueryContextualizer;
use crate::error::EngineError;
use crate::models::{ConversationHistory, SourcesUsed};
use crate::retrieval::RetrievalOrchestrator;

/// The outcome of one chat turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub response: String,
    /// The query actually sent to retrieval.
    pub standalone_query: String,
    pub sources_used: SourcesUsed,
}

pub struct ChatEngine {
    contextualizer: QueryContextualizer,
    orchestrator: RetrievalOrchestrator,
    generator: AnswerGenerator,
    prompt_window: usize,
}

impl ChatEngine {
    pub fn new(
        contextualizer: QueryContextualizer,
        orchestrator: RetrievalOrchestrator,
        generator: AnswerGenerator,
        prompt_window: usize,
    ) -> Self {
        Self {
            contextualizer,
            orchestrator,
            generator,
            prompt_window,
        }
    }

    pub fn is_dummy(&self) -> bool {
        self.generator.is_dummy()
    }

    /// Answer `message` given the prior `history` (which excludes `message`).
    pub async fn respond(
        &self,
        message: &str,
        history: &ConversationHistory,
    ) -> Result<ChatTurn, EngineError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(EngineError::MalformedInput(
                "message must not be empty".to_string(),
            ));
        }

        let standalone_query = self.contextualizer.rewrite(message, history).await;
        let result = self.orchestrator.retrieve(&standalone_query).await?;
        let context = assemble(&result, history, self.prompt_window);
        let response = self.generator.generate(message, &context).await;

        Ok(ChatTurn {
            response,
            standalone_query,
            sources_used: result.sources_used,
        })
    }
}
