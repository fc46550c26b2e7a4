use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::assemble::DEFAULT_PROMPT_WINDOW;
use crate::chunk::{ChunkParams, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP};
use crate::contextualize::DEFAULT_REWRITE_WINDOW;
use crate::retrieval::{
    FallbackPolicy, DEFAULT_FALLBACK_THRESHOLD, DEFAULT_KB_LIMIT, DEFAULT_WEB_LIMIT,
};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub knowledge_base: KnowledgeBaseConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub web_search: WebSearchConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/vagent.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeBaseConfig {
    /// `"sqlite"` (persistent) or `"memory"` (process lifetime only).
    #[serde(default = "default_kb_backend")]
    pub backend: String,
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            backend: default_kb_backend(),
        }
    }
}

fn default_kb_backend() -> String {
    "sqlite".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_overlap() -> usize {
    DEFAULT_OVERLAP
}

impl ChunkingConfig {
    pub fn params(&self) -> Result<ChunkParams> {
        Ok(ChunkParams::new(self.chunk_size, self.overlap)?)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_kb_limit")]
    pub kb_limit: usize,
    #[serde(default = "default_web_limit")]
    pub web_limit: usize,
    #[serde(default = "default_fallback_threshold")]
    pub fallback_threshold: f64,
    /// Result count for the plain `/search` endpoint and `vagent search`.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            kb_limit: DEFAULT_KB_LIMIT,
            web_limit: DEFAULT_WEB_LIMIT,
            fallback_threshold: DEFAULT_FALLBACK_THRESHOLD,
            search_limit: default_search_limit(),
        }
    }
}

fn default_kb_limit() -> usize {
    DEFAULT_KB_LIMIT
}
fn default_web_limit() -> usize {
    DEFAULT_WEB_LIMIT
}
fn default_fallback_threshold() -> f64 {
    DEFAULT_FALLBACK_THRESHOLD
}
fn default_search_limit() -> usize {
    5
}

impl RetrievalConfig {
    pub fn policy(&self) -> FallbackPolicy {
        FallbackPolicy {
            fallback_threshold: self.fallback_threshold,
            kb_limit: self.kb_limit,
            web_limit: self.web_limit,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    #[serde(default = "default_rewrite_window")]
    pub rewrite_window: usize,
    #[serde(default = "default_prompt_window")]
    pub prompt_window: usize,
    /// Messages loaded from the history store when a request carries none.
    #[serde(default = "default_store_limit")]
    pub store_limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            rewrite_window: DEFAULT_REWRITE_WINDOW,
            prompt_window: DEFAULT_PROMPT_WINDOW,
            store_limit: default_store_limit(),
        }
    }
}

fn default_rewrite_window() -> usize {
    DEFAULT_REWRITE_WINDOW
}
fn default_prompt_window() -> usize {
    DEFAULT_PROMPT_WINDOW
}
fn default_store_limit() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
            url: None,
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// `"gemini"` or `"disabled"`.
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            api_key_env: default_api_key_env(),
            base_url: default_llm_base_url(),
        }
    }
}

fn default_llm_provider() -> String {
    "gemini".to_string()
}
fn default_llm_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_api_key_env() -> String {
    "GOOGLE_API_KEY".to_string()
}
fn default_llm_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebSearchConfig {
    /// `"duckduckgo"` or `"disabled"`.
    #[serde(default = "default_web_provider")]
    pub provider: String,
    #[serde(default = "default_web_base_url")]
    pub base_url: String,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            provider: default_web_provider(),
            base_url: default_web_base_url(),
        }
    }
}

fn default_web_provider() -> String {
    "duckduckgo".to_string()
}
fn default_web_base_url() -> String {
    "https://api.duckduckgo.com/".to_string()
}

/// Per-call deadlines for external collaborators.
#[derive(Debug, Deserialize, Clone)]
pub struct TimeoutsConfig {
    /// Knowledge-base and web search calls.
    #[serde(default = "default_search_secs")]
    pub search_secs: u64,
    /// Generative model calls (rewrite, answer, captioning).
    #[serde(default = "default_model_secs")]
    pub model_secs: u64,
    /// Knowledge-base ingestion (includes embedding).
    #[serde(default = "default_ingest_secs")]
    pub ingest_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            search_secs: default_search_secs(),
            model_secs: default_model_secs(),
            ingest_secs: default_ingest_secs(),
        }
    }
}

fn default_search_secs() -> u64 {
    30
}
fn default_model_secs() -> u64 {
    60
}
fn default_ingest_secs() -> u64 {
    600
}

impl TimeoutsConfig {
    pub fn search(&self) -> Duration {
        Duration::from_secs(self.search_secs)
    }
    pub fn model(&self) -> Duration {
        Duration::from_secs(self.model_secs)
    }
    pub fn ingest(&self) -> Duration {
        Duration::from_secs(self.ingest_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_include_globs() -> Vec<String> {
    [
        "**/*.md",
        "**/*.txt",
        "**/*.png",
        "**/*.jpg",
        "**/*.jpeg",
        "**/*.gif",
        "**/*.webp",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Config {
    /// All defaults; used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to [`Config::minimal`].
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::info!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::minimal())
    }
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    config
        .chunking
        .params()
        .with_context(|| "Invalid [chunking] section")?;

    // Validate retrieval
    if config.retrieval.kb_limit < 1 {
        anyhow::bail!("retrieval.kb_limit must be >= 1");
    }
    if config.retrieval.search_limit < 1 {
        anyhow::bail!("retrieval.search_limit must be >= 1");
    }
    if !(0.0..=1.0).contains(&config.retrieval.fallback_threshold) {
        anyhow::bail!("retrieval.fallback_threshold must be in [0.0, 1.0]");
    }

    // Validate history windows
    if config.history.rewrite_window < 1 || config.history.prompt_window < 1 {
        anyhow::bail!("history.rewrite_window and history.prompt_window must be >= 1");
    }

    let timeouts = &config.timeouts;
    if timeouts.search_secs == 0 || timeouts.model_secs == 0 || timeouts.ingest_secs == 0 {
        anyhow::bail!("timeouts.search_secs, model_secs and ingest_secs must be > 0");
    }

    match config.knowledge_base.backend.as_str() {
        "sqlite" | "memory" => {}
        other => anyhow::bail!(
            "Unknown knowledge_base.backend: '{}'. Must be sqlite or memory.",
            other
        ),
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "disabled" | "local" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, local, openai, or ollama.",
            other
        ),
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    match config.llm.provider.as_str() {
        "gemini" | "disabled" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be gemini or disabled.",
            other
        ),
    }

    match config.web_search.provider.as_str() {
        "duckduckgo" | "disabled" => {}
        other => anyhow::bail!(
            "Unknown web_search provider: '{}'. Must be duckduckgo or disabled.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_empty_file_gives_documented_defaults() {
        let c = parse("").unwrap();
        assert_eq!(c.chunking.chunk_size, 500);
        assert_eq!(c.chunking.overlap, 50);
        assert_eq!(c.retrieval.kb_limit, 3);
        assert_eq!(c.retrieval.web_limit, 3);
        assert_eq!(c.retrieval.fallback_threshold, 0.75);
        assert_eq!(c.history.rewrite_window, 3);
        assert_eq!(c.history.prompt_window, 5);
        assert_eq!(c.llm.api_key_env, "GOOGLE_API_KEY");
        assert_eq!(c.llm.model, "gemini-2.5-flash");
        assert_eq!(c.server.bind, "0.0.0.0:8000");
    }

    #[test]
    fn test_overlap_must_be_below_chunk_size() {
        let err = parse("[chunking]\nchunk_size = 100\noverlap = 100\n").unwrap_err();
        assert!(format!("{:#}", err).contains("overlap"));
        assert!(parse("[chunking]\nchunk_size = 100\noverlap = 99\n").is_ok());
    }

    #[test]
    fn test_threshold_range() {
        assert!(parse("[retrieval]\nfallback_threshold = 1.5\n").is_err());
        let c = parse("[retrieval]\nfallback_threshold = 0.5\n").unwrap();
        assert_eq!(c.retrieval.policy().fallback_threshold, 0.5);
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        assert!(parse("[timeouts]\nsearch_secs = 0\n").is_err());
        assert!(parse("[timeouts]\nmodel_secs = 0\n").is_err());
        assert!(parse("[timeouts]\ningest_secs = 0\n").is_err());
        assert!(parse("[timeouts]\nsearch_secs = 1\nmodel_secs = 1\ningest_secs = 1\n").is_ok());
    }

    #[test]
    fn test_remote_embedding_requires_model_and_dims() {
        assert!(parse("[embedding]\nprovider = \"openai\"\n").is_err());
        assert!(parse(
            "[embedding]\nprovider = \"openai\"\nmodel = \"text-embedding-3-small\"\ndims = 1536\n"
        )
        .is_ok());
    }

    #[test]
    fn test_unknown_providers_rejected() {
        assert!(parse("[llm]\nprovider = \"gpt\"\n").is_err());
        assert!(parse("[web_search]\nprovider = \"bing\"\n").is_err());
        assert!(parse("[knowledge_base]\nbackend = \"mongo\"\n").is_err());
    }

    #[test]
    fn test_load_config_reads_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("vagent.toml");
        std::fs::write(&path, "[server]\nbind = \"127.0.0.1:9000\"\n").unwrap();
        let c = load_config(&path).unwrap();
        assert_eq!(c.server.bind, "127.0.0.1:9000");
        assert!(load_config(&tmp.path().join("missing.toml")).is_err());
        assert!(load_or_default(&tmp.path().join("missing.toml")).is_ok());
    }
}
