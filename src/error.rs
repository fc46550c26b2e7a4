//! Error taxonomy for the orchestration engine.
//!
//! Adapters return `anyhow::Result`; the engine converts their failures
//! into [`EngineError`] at the call site so callers can tell a missing
//! dependency from a bad request.

use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// An external collaborator of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    KnowledgeBase,
    WebSearch,
    GenerativeModel,
    Embedding,
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Upstream::KnowledgeBase => "knowledge base",
            Upstream::WebSearch => "web search",
            Upstream::GenerativeModel => "generative model",
            Upstream::Embedding => "embedding provider",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// A credential or setting is absent; callers degrade instead of failing.
    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),

    /// An external call failed or timed out.
    #[error("{upstream} unavailable: {message}")]
    UpstreamUnavailable { upstream: Upstream, message: String },

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("invalid chunking parameters: overlap ({overlap}) must be smaller than chunk_size ({chunk_size}) and chunk_size must be > 0")]
    InvalidChunking { chunk_size: usize, overlap: usize },
}

impl EngineError {
    pub fn upstream(upstream: Upstream, err: impl fmt::Display) -> Self {
        EngineError::UpstreamUnavailable {
            upstream,
            message: err.to_string(),
        }
    }
}

/// Await an adapter call under a deadline.
///
/// Both an adapter error and an elapsed deadline become
/// [`EngineError::UpstreamUnavailable`] for `upstream`.
pub async fn bounded<T, F>(upstream: Upstream, limit: Duration, fut: F) -> Result<T, EngineError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(EngineError::upstream(upstream, format!("{:#}", e))),
        Err(_) => Err(EngineError::upstream(
            upstream,
            format!("timed out after {}s", limit.as_secs_f64()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_message() {
        let e = EngineError::upstream(Upstream::KnowledgeBase, "connection refused");
        assert_eq!(
            e.to_string(),
            "knowledge base unavailable: connection refused"
        );
    }

    #[tokio::test]
    async fn test_bounded_maps_adapter_error() {
        let r: Result<(), _> = bounded(Upstream::WebSearch, Duration::from_secs(1), async {
            Err::<(), _>(anyhow::anyhow!("HTTP 502"))
        })
        .await;
        match r {
            Err(EngineError::UpstreamUnavailable { upstream, message }) => {
                assert_eq!(upstream, Upstream::WebSearch);
                assert!(message.contains("HTTP 502"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let r: Result<(), _> = bounded(
            Upstream::GenerativeModel,
            Duration::from_millis(20),
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<(), anyhow::Error>(())
            },
        )
        .await;
        let err = r.unwrap_err();
        assert!(err.to_string().contains("timed out"), "{}", err);
    }
}
