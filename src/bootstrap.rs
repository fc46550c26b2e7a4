//! Wiring: turn a [`Config`] into a ready [`Agent`].
//!
//! Every external collaborator is constructed exactly once here and shared
//! as `Arc<dyn Trait>`. A missing generative-model credential is logged
//! and the agent runs in dummy mode.

use std::sync::Arc;

use anyhow::Result;

use crate::answer::AnswerGenerator;
use crate::config::Config;
use crate::contextualize::QueryContextualizer;
use crate::embedding::create_provider;
use crate::engine::{ChatEngine, ChatTurn};
use crate::error::{bounded, EngineError, Upstream};
use crate::history::{InMemoryHistoryStore, SqliteHistoryStore};
use crate::ingest::{IngestReport, IngestionPipeline};
use crate::llm::GeminiClient;
use crate::models::{ConversationHistory, Document, KnowledgeBaseItem, Role};
use crate::retrieval::RetrievalOrchestrator;
use crate::store::{InMemoryKnowledgeBase, SqliteKnowledgeBase};
use crate::traits::{GenerativeModel, HistoryStore, KnowledgeBaseClient, WebSearchClient};
use crate::web::{DisabledWebSearch, DuckDuckGoClient};

/// The external collaborators an [`Agent`] runs against.
#[derive(Clone)]
pub struct Components {
    pub knowledge_base: Arc<dyn KnowledgeBaseClient>,
    pub web_search: Arc<dyn WebSearchClient>,
    pub model: Option<Arc<dyn GenerativeModel>>,
    pub history: Arc<dyn HistoryStore>,
}

impl Components {
    pub async fn from_config(config: &Config) -> Result<Self> {
        let embedder = create_provider(&config.embedding)?;

        let knowledge_base: Arc<dyn KnowledgeBaseClient>;
        let history: Arc<dyn HistoryStore>;
        match config.knowledge_base.backend.as_str() {
            "memory" => {
                knowledge_base = Arc::new(InMemoryKnowledgeBase::new(embedder));
                history = Arc::new(InMemoryHistoryStore::new());
            }
            _ => {
                let pool = crate::db::connect(config).await?;
                crate::migrate::run_migrations(&pool).await?;
                knowledge_base = Arc::new(SqliteKnowledgeBase::new(pool.clone(), embedder));
                history = Arc::new(SqliteHistoryStore::new(pool));
            }
        }

        let web_search: Arc<dyn WebSearchClient> = match config.web_search.provider.as_str() {
            "disabled" => Arc::new(DisabledWebSearch),
            _ => Arc::new(DuckDuckGoClient::new(&config.web_search)?),
        };

        let model: Option<Arc<dyn GenerativeModel>> = match config.llm.provider.as_str() {
            "disabled" => None,
            _ => match GeminiClient::from_config(&config.llm) {
                Ok(client) => Some(Arc::new(client)),
                Err(EngineError::ConfigurationMissing(reason)) => {
                    tracing::warn!(%reason, "generative model not configured, running in dummy mode");
                    None
                }
                Err(e) => return Err(e.into()),
            },
        };

        Ok(Self {
            knowledge_base,
            web_search,
            model,
            history,
        })
    }
}

/// Chat engine, ingestion pipeline and history store behind one handle.
pub struct Agent {
    config: Config,
    components: Components,
    engine: ChatEngine,
    ingestion: IngestionPipeline,
}

impl Agent {
    pub fn new(config: Config, components: Components) -> Result<Self> {
        let timeouts = &config.timeouts;

        let contextualizer = QueryContextualizer::new(
            components.model.clone(),
            config.history.rewrite_window,
            timeouts.model(),
        );
        let orchestrator = RetrievalOrchestrator::new(
            components.knowledge_base.clone(),
            components.web_search.clone(),
            config.retrieval.policy(),
            timeouts.search(),
        );
        let generator = AnswerGenerator::new(components.model.clone(), timeouts.model());
        let engine = ChatEngine::new(
            contextualizer,
            orchestrator,
            generator,
            config.history.prompt_window,
        );

        let ingestion = IngestionPipeline::new(
            components.knowledge_base.clone(),
            config.chunking.params()?,
            timeouts.ingest(),
        );

        Ok(Self {
            config,
            components,
            engine,
            ingestion,
        })
    }

    pub async fn from_config(config: Config) -> Result<Self> {
        let components = Components::from_config(&config).await?;
        Self::new(config, components)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_dummy(&self) -> bool {
        self.engine.is_dummy()
    }

    pub fn model(&self) -> Option<&dyn GenerativeModel> {
        self.components.model.as_deref()
    }

    pub fn history(&self) -> &dyn HistoryStore {
        self.components.history.as_ref()
    }

    /// One chat turn.
    ///
    /// With `history = None` the last `history.store_limit` stored messages
    /// are used. Either way the message and response are appended to the
    /// history store afterwards; a store failure there is only logged.
    pub async fn chat(
        &self,
        message: &str,
        history: Option<ConversationHistory>,
    ) -> Result<ChatTurn, EngineError> {
        let history = match history {
            Some(h) => h,
            None => self.stored_history().await,
        };

        let turn = self.engine.respond(message, &history).await?;

        for (role, content) in [(Role::User, message.trim()), (Role::Agent, turn.response.as_str())] {
            if let Err(e) = self.components.history.append(role, content).await {
                tracing::warn!(error = %e, "failed to record chat history");
            }
        }

        Ok(turn)
    }

    /// Plain knowledge-base search, no fallback.
    pub async fn search(
        &self,
        query: &str,
        limit: Option<usize>,
    ) -> Result<Vec<KnowledgeBaseItem>, EngineError> {
        if query.trim().is_empty() {
            return Err(EngineError::MalformedInput(
                "query must not be empty".to_string(),
            ));
        }
        let limit = limit.unwrap_or(self.config.retrieval.search_limit);
        bounded(
            Upstream::KnowledgeBase,
            self.config.timeouts.search(),
            self.components.knowledge_base.search(query, limit),
        )
        .await
    }

    pub async fn ingest(&self, documents: &[Document]) -> Result<IngestReport, EngineError> {
        self.ingestion.ingest(documents).await
    }

    async fn stored_history(&self) -> ConversationHistory {
        match self
            .components
            .history
            .list_recent(self.config.history.store_limit)
            .await
        {
            Ok(messages) => ConversationHistory::from_messages(messages),
            Err(e) => {
                tracing::warn!(error = %e, "failed to load chat history, continuing without it");
                ConversationHistory::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmbeddingConfig, KnowledgeBaseConfig, LlmConfig, WebSearchConfig};

    fn offline_config() -> Config {
        Config {
            knowledge_base: KnowledgeBaseConfig {
                backend: "memory".into(),
            },
            embedding: EmbeddingConfig {
                provider: "disabled".into(),
                ..Default::default()
            },
            llm: LlmConfig {
                provider: "disabled".into(),
                ..Default::default()
            },
            web_search: WebSearchConfig {
                provider: "disabled".into(),
                ..Default::default()
            },
            ..Config::minimal()
        }
    }

    #[tokio::test]
    async fn test_offline_agent_runs_in_dummy_mode() {
        let agent = Agent::from_config(offline_config()).await.unwrap();
        assert!(agent.is_dummy());
        assert!(agent.model().is_none());

        let turn = agent.chat("hello there", None).await.unwrap();
        assert!(turn.response.starts_with(crate::answer::DUMMY_MARKER));

        let stored = agent.history().list_recent(10).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].content, "hello there");
        assert_eq!(stored[1].role, Role::Agent);
    }

    #[tokio::test]
    async fn test_search_rejects_blank_query() {
        let agent = Agent::from_config(offline_config()).await.unwrap();
        let err = agent.search("  ", None).await.unwrap_err();
        assert!(matches!(err, EngineError::MalformedInput(_)));
        assert!(agent.search("anything", None).await.unwrap().is_empty());
    }
}
