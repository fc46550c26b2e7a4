//! Sliding-window text chunker.
//!
//! Splits document content into fixed-size, overlapping windows measured in
//! characters. Window `i` covers `[i * stride, i * stride + chunk_size)`
//! where `stride = chunk_size - overlap`; the walk stops at the first
//! window that reaches the end of the text, so the final chunk may be
//! shorter than `chunk_size` but is never made up of overlap alone.
//!
//! Windows are cut on `char` boundaries, never inside a UTF-8 sequence.
//!
//! # Example
//!
//! ```rust
//! use vector_agent::chunk::{chunk_text, ChunkParams};
//!
//! let params = ChunkParams::new(4, 1).unwrap();
//! assert_eq!(chunk_text("abcdefghij", &params), vec!["abcd", "defg", "ghij"]);
//! ```

use crate::error::EngineError;
use crate::models::{Chunk, Document};

/// Default window size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Default overlap between consecutive windows, in characters.
pub const DEFAULT_OVERLAP: usize = 50;

/// Validated chunking parameters. `overlap < chunk_size` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkParams {
    /// Rejects `chunk_size == 0` and `overlap >= chunk_size`; either would
    /// stop the window from advancing.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, EngineError> {
        if chunk_size == 0 || overlap >= chunk_size {
            return Err(EngineError::InvalidChunking {
                chunk_size,
                overlap,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

/// Split `text` into overlapping windows. Empty text yields no windows.
pub fn chunk_text<'a>(text: &'a str, params: &ChunkParams) -> Vec<&'a str> {
    // Byte offset of every char, plus the end of the string.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_len = bounds.len() - 1;

    let mut windows = Vec::new();
    let mut start = 0;
    while start < char_len {
        let end = (start + params.chunk_size()).min(char_len);
        windows.push(&text[bounds[start]..bounds[end]]);
        if end == char_len {
            break;
        }
        start += params.stride();
    }
    windows
}

/// Chunk a document, tagging each chunk with the document's metadata.
///
/// Every chunk receives a copy of `doc.metadata` plus `source`,
/// `media_type` and `content_type`. The content type comes from the
/// document's media type, never from the chunk text.
pub fn chunk_document(doc: &Document, params: &ChunkParams) -> Vec<Chunk> {
    let content_type = doc.content_type();

    chunk_text(&doc.content, params)
        .into_iter()
        .enumerate()
        .map(|(index, window)| {
            let mut metadata = doc.metadata.clone();
            metadata.insert("source".to_string(), doc.source.clone().into());
            metadata.insert("media_type".to_string(), doc.media_type.clone().into());
            metadata.insert(
                "content_type".to_string(),
                content_type.as_str().to_string().into(),
            );
            Chunk {
                index,
                content: window.to_string(),
                content_type,
                metadata,
            }
        })
        .collect()
}
