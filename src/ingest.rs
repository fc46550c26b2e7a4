//! Ingestion pipeline: documents → chunks → knowledge base.
//!
//! Documents with empty content are skipped, not rejected. All chunks of a
//! batch are handed to [`KnowledgeBaseClient::ingest`] in document order in
//! a single call; ingestion does not read back what was stored.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::chunk::{chunk_document, ChunkParams};
use crate::error::{bounded, EngineError, Upstream};
use crate::models::{Chunk, Document};
use crate::traits::{GenerativeModel, KnowledgeBaseClient};

/// Prompt used to turn an image into indexable text.
pub const CAPTION_PROMPT: &str = "Describe this image in detail. \
Include any visible text, labels, numbers, and the relationships between the elements shown, \
so the description can be used to answer questions about the image.";

/// Counts from one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Documents that produced at least one chunk.
    pub documents: usize,
    /// Documents skipped for having no content.
    pub skipped: usize,
    /// Chunks the knowledge base reported as inserted.
    pub chunks: usize,
}

pub struct IngestionPipeline {
    knowledge_base: Arc<dyn KnowledgeBaseClient>,
    params: ChunkParams,
    timeout: Duration,
}

impl IngestionPipeline {
    pub fn new(
        knowledge_base: Arc<dyn KnowledgeBaseClient>,
        params: ChunkParams,
        timeout: Duration,
    ) -> Self {
        Self {
            knowledge_base,
            params,
            timeout,
        }
    }

    /// Chunk documents without storing them.
    pub fn plan(&self, documents: &[Document]) -> (Vec<Chunk>, IngestReport) {
        let mut report = IngestReport::default();
        let mut chunks = Vec::new();

        for doc in documents {
            if doc.content.trim().is_empty() {
                tracing::debug!(source = %doc.source, "skipping document with empty content");
                report.skipped += 1;
                continue;
            }
            chunks.extend(chunk_document(doc, &self.params));
            report.documents += 1;
        }

        (chunks, report)
    }

    /// Chunk and store documents.
    pub async fn ingest(&self, documents: &[Document]) -> Result<IngestReport, EngineError> {
        let (chunks, mut report) = self.plan(documents);

        tracing::info!(
            documents = report.documents,
            skipped = report.skipped,
            chunks = chunks.len(),
            "ingesting documents"
        );

        report.chunks = bounded(
            Upstream::KnowledgeBase,
            self.timeout,
            self.knowledge_base.ingest(&chunks),
        )
        .await?;

        tracing::info!(inserted = report.chunks, "ingestion finished");
        Ok(report)
    }
}

/// Caption an image so it can be ingested as text.
///
/// The returned document keeps the image's media type, so its chunks are
/// tagged `image`.
pub async fn caption_image(
    model: &dyn GenerativeModel,
    source: &str,
    image: &[u8],
    mime_type: &str,
    timeout: Duration,
) -> Result<Document, EngineError> {
    if image.is_empty() {
        return Err(EngineError::MalformedInput(format!(
            "image '{}' is empty",
            source
        )));
    }

    let caption = bounded(
        Upstream::GenerativeModel,
        timeout,
        model.generate_with_image(CAPTION_PROMPT, image, mime_type),
    )
    .await?;

    let mut metadata = serde_json::Map::new();
    metadata.insert("captioned_by".to_string(), model.model_name().to_string().into());

    Ok(Document {
        source: source.to_string(),
        media_type: mime_type.to_string(),
        content: caption.trim().to_string(),
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentType, KnowledgeBaseItem};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingKb {
        batches: Mutex<Vec<Vec<Chunk>>>,
    }

    #[async_trait]
    impl KnowledgeBaseClient for RecordingKb {
        async fn search(&self, _: &str, _: usize) -> Result<Vec<KnowledgeBaseItem>> {
            Ok(Vec::new())
        }

        async fn ingest(&self, chunks: &[Chunk]) -> Result<usize> {
            self.batches.lock().unwrap().push(chunks.to_vec());
            Ok(chunks.len())
        }
    }

    struct CaptionModel;

    #[async_trait]
    impl GenerativeModel for CaptionModel {
        fn model_name(&self) -> &str {
            "caption-test"
        }

        async fn generate(&self, _: &str) -> Result<String> {
            anyhow::bail!("not used")
        }

        async fn generate_with_image(&self, prompt: &str, image: &[u8], mime: &str) -> Result<String> {
            assert_eq!(prompt, CAPTION_PROMPT);
            Ok(format!("  A {} picture of {} bytes.  ", mime, image.len()))
        }
    }

    fn pipeline(kb: Arc<RecordingKb>) -> IngestionPipeline {
        IngestionPipeline::new(kb, ChunkParams::default(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_skips_empty_documents() {
        let kb = Arc::new(RecordingKb::default());
        let docs = vec![
            Document::text("a", "first document"),
            Document::text("b", "   "),
            Document::text("c", ""),
            Document::text("d", "second document"),
        ];
        let report = pipeline(kb.clone()).ingest(&docs).await.unwrap();
        assert_eq!(
            report,
            IngestReport {
                documents: 2,
                skipped: 2,
                chunks: 2
            }
        );
        let batches = kb.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0][0].content, "first document");
        assert_eq!(batches[0][1].content, "second document");
    }

    #[tokio::test]
    async fn test_chunks_keep_document_order() {
        let kb = Arc::new(RecordingKb::default());
        let docs = vec![
            Document::text("long", "l".repeat(1200)),
            Document::text("short", "s"),
        ];
        let report = pipeline(kb.clone()).ingest(&docs).await.unwrap();
        assert_eq!(report.chunks, 4);
        let batches = kb.batches.lock().unwrap();
        let sources: Vec<&str> = batches[0]
            .iter()
            .map(|c| c.metadata["source"].as_str().unwrap())
            .collect();
        assert_eq!(sources, vec!["long", "long", "long", "short"]);
        let indices: Vec<usize> = batches[0].iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 0]);
    }

    #[tokio::test]
    async fn test_zero_documents_is_noop() {
        let kb = Arc::new(RecordingKb::default());
        let report = pipeline(kb.clone()).ingest(&[]).await.unwrap();
        assert_eq!(report, IngestReport::default());
    }

    #[tokio::test]
    async fn test_caption_image_document() {
        let doc = caption_image(
            &CaptionModel,
            "chart.png",
            &[1, 2, 3],
            "image/png",
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(doc.content, "A image/png picture of 3 bytes.");
        assert_eq!(doc.content_type(), ContentType::Image);
        assert_eq!(doc.metadata["captioned_by"], "caption-test");
    }

    #[tokio::test]
    async fn test_caption_rejects_empty_image() {
        let err = caption_image(&CaptionModel, "x.png", &[], "image/png", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::MalformedInput(_)));
    }
}
