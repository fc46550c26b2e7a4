//! Core data models used throughout the agent.
//!
//! These types represent the conversation, the retrieved evidence, and the
//! documents and chunks that flow through the chat and ingestion pipelines.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Who authored a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[serde(alias = "assistant")]
    Agent,
}

impl Role {
    /// Wire name, used verbatim in rewrite prompts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Agent => "agent",
        }
    }

    /// Display label used in the assembled prompt context.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Agent => "Assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "agent" | "assistant" => Some(Role::Agent),
            _ => None,
        }
    }
}

/// A single chat message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    /// Monotonic sequence number within its history.
    pub ordinal: i64,
}

/// A message as it arrives over the wire, before an ordinal is assigned.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessageInput {
    pub role: Role,
    pub content: String,
}

/// Ordered conversation history.
///
/// Messages are kept in ordinal order. The rewrite window and the prompt
/// window are independent truncations taken with [`recent`](Self::recent).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationHistory {
    messages: Vec<ConversationMessage>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a history from wire messages, assigning ordinals `0..n`.
    pub fn from_inputs(inputs: impl IntoIterator<Item = MessageInput>) -> Self {
        let mut history = Self::new();
        for input in inputs {
            history.push(input.role, input.content);
        }
        history
    }

    /// Build a history from stored messages, sorting by ordinal.
    pub fn from_messages(mut messages: Vec<ConversationMessage>) -> Self {
        messages.sort_by_key(|m| m.ordinal);
        Self { messages }
    }

    /// Append a message with the next ordinal.
    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        let ordinal = self.messages.last().map(|m| m.ordinal + 1).unwrap_or(0);
        self.messages.push(ConversationMessage {
            role,
            content: content.into(),
            ordinal,
        });
    }

    /// The last `n` messages, oldest first.
    pub fn recent(&self, n: usize) -> &[ConversationMessage] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }
}

/// Provenance of a retrieved item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Source {
    #[serde(rename = "Knowledge Base")]
    KnowledgeBase,
    #[serde(rename = "Web Search")]
    WebSearch,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::KnowledgeBase => "Knowledge Base",
            Source::WebSearch => "Web Search",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of sources consulted for one query, in fixed order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourcesUsed(BTreeSet<Source>);

impl SourcesUsed {
    /// The knowledge base is always consulted.
    pub fn knowledge_base() -> Self {
        let mut set = BTreeSet::new();
        set.insert(Source::KnowledgeBase);
        Self(set)
    }

    pub fn insert(&mut self, source: Source) {
        self.0.insert(source);
    }

    pub fn contains(&self, source: Source) -> bool {
        self.0.contains(&source)
    }

    pub fn iter(&self) -> impl Iterator<Item = Source> + '_ {
        self.0.iter().copied()
    }
}

impl fmt::Display for SourcesUsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|s| s.as_str()).collect();
        f.write_str(&names.join(" + "))
    }
}

/// A knowledge-base match with its similarity score in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBaseItem {
    pub content: String,
    pub score: f64,
}

/// A web search snippet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebItem {
    pub title: String,
    pub body: String,
    pub url: String,
}

/// A retrieved piece of evidence tagged with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub enum RetrievedItem {
    KnowledgeBase(KnowledgeBaseItem),
    Web(WebItem),
}

impl RetrievedItem {
    pub fn source(&self) -> Source {
        match self {
            RetrievedItem::KnowledgeBase(_) => Source::KnowledgeBase,
            RetrievedItem::Web(_) => Source::WebSearch,
        }
    }
}

/// Outcome of one retrieval: items in retrieval order plus the sources consulted.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub items: Vec<RetrievedItem>,
    pub sources_used: SourcesUsed,
}

impl RetrievalResult {
    pub fn knowledge_base_items(&self) -> impl Iterator<Item = &KnowledgeBaseItem> {
        self.items.iter().filter_map(|item| match item {
            RetrievedItem::KnowledgeBase(kb) => Some(kb),
            RetrievedItem::Web(_) => None,
        })
    }

    pub fn web_items(&self) -> impl Iterator<Item = &WebItem> {
        self.items.iter().filter_map(|item| match item {
            RetrievedItem::Web(web) => Some(web),
            RetrievedItem::KnowledgeBase(_) => None,
        })
    }
}

/// Rendered prompt context. Derived, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptContext {
    pub text: String,
    pub sources_used: SourcesUsed,
}

/// Content-type tag carried by every chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Image,
}

impl ContentType {
    /// Derived from the document's media type, never from chunk content.
    pub fn from_media_type(media_type: &str) -> Self {
        if media_type.trim().to_ascii_lowercase().starts_with("image/") {
            ContentType::Image
        } else {
            ContentType::Text
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Image => "image",
        }
    }
}

/// A raw document submitted for ingestion.
///
/// Image documents carry their caption as `content`; the original media
/// type is kept so chunks are tagged `image`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default = "default_media_type")]
    pub media_type: String,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

fn default_source() -> String {
    "api".to_string()
}

fn default_media_type() -> String {
    "text/plain".to_string()
}

impl Document {
    pub fn text(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            media_type: default_media_type(),
            content: content.into(),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn content_type(&self) -> ContentType {
        ContentType::from_media_type(&self.media_type)
    }
}

/// A window of a document's content, ready for embedding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    /// Position within the parent document, starting at 0.
    pub index: usize,
    pub content: String,
    pub content_type: ContentType,
    /// Document metadata plus `source`, `media_type` and `content_type`.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}
