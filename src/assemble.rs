//! Prompt context rendering.
//!
//! Sections are emitted in a fixed order (knowledge base, web, history)
//! and omitted entirely when they have nothing to show.

use crate::models::{ConversationHistory, PromptContext, RetrievalResult};

/// Default number of history messages rendered into the prompt.
pub const DEFAULT_PROMPT_WINDOW: usize = 5;

pub const KNOWLEDGE_BASE_HEADER: &str = "--- Knowledge Base Results ---";
pub const WEB_SEARCH_HEADER: &str = "--- Web Search Results ---";
pub const HISTORY_HEADER: &str = "--- Conversation History ---";

/// Render retrieval results and recent history into a prompt context.
///
/// Pure and deterministic: identical inputs always give identical text.
pub fn assemble(
    result: &RetrievalResult,
    history: &ConversationHistory,
    history_window: usize,
) -> PromptContext {
    let mut sections: Vec<String> = Vec::new();

    let kb_lines: Vec<String> = result
        .knowledge_base_items()
        .map(|item| format!("- {} (Score: {:.4})", item.content, item.score))
        .collect();
    if !kb_lines.is_empty() {
        sections.push(render_section(KNOWLEDGE_BASE_HEADER, &kb_lines));
    }

    let web_lines: Vec<String> = result
        .web_items()
        .map(|item| format!("- [{}] {} (Source: {})", item.title, item.body, item.url))
        .collect();
    if !web_lines.is_empty() {
        sections.push(render_section(WEB_SEARCH_HEADER, &web_lines));
    }

    let history_lines: Vec<String> = history
        .recent(history_window)
        .iter()
        .map(|m| format!("{}: {}", m.role.label(), m.content))
        .collect();
    if !history_lines.is_empty() {
        sections.push(render_section(HISTORY_HEADER, &history_lines));
    }

    PromptContext {
        text: sections.join("\n\n"),
        sources_used: result.sources_used.clone(),
    }
}

fn render_section(header: &str, lines: &[String]) -> String {
    let mut out = String::from(header);
    for line in lines {
        out.push('\n');
        out.push_str(line);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{KnowledgeBaseItem, RetrievedItem, Role, Source, SourcesUsed, WebItem};

    fn kb_item(content: &str, score: f64) -> RetrievedItem {
        RetrievedItem::KnowledgeBase(KnowledgeBaseItem {
            content: content.into(),
            score,
        })
    }

    fn web_item(title: &str) -> RetrievedItem {
        RetrievedItem::Web(WebItem {
            title: title.into(),
            body: "body text".into(),
            url: "https://example.org".into(),
        })
    }

    fn both_sources() -> SourcesUsed {
        let mut s = SourcesUsed::knowledge_base();
        s.insert(Source::WebSearch);
        s
    }

    #[test]
    fn test_kb_only() {
        let result = RetrievalResult {
            items: vec![kb_item("X", 0.9)],
            sources_used: SourcesUsed::knowledge_base(),
        };
        let ctx = assemble(&result, &ConversationHistory::new(), 5);
        assert_eq!(ctx.text, "--- Knowledge Base Results ---\n- X (Score: 0.9000)");
        assert!(!ctx.text.contains(WEB_SEARCH_HEADER));
        assert!(!ctx.text.contains(HISTORY_HEADER));
    }

    #[test]
    fn test_section_order_and_format() {
        let result = RetrievalResult {
            items: vec![kb_item("Rust is a language", 0.61234), web_item("Rust")],
            sources_used: both_sources(),
        };
        let mut history = ConversationHistory::new();
        history.push(Role::User, "hi");
        history.push(Role::Agent, "hello");

        let ctx = assemble(&result, &history, 5);
        let expected = "--- Knowledge Base Results ---\n\
- Rust is a language (Score: 0.6123)\n\
\n\
--- Web Search Results ---\n\
- [Rust] body text (Source: https://example.org)\n\
\n\
--- Conversation History ---\n\
User: hi\n\
Assistant: hello";
        assert_eq!(ctx.text, expected);
        assert_eq!(ctx.sources_used, both_sources());
    }

    #[test]
    fn test_empty_sections_omitted() {
        let result = RetrievalResult {
            items: vec![web_item("only web")],
            sources_used: both_sources(),
        };
        let ctx = assemble(&result, &ConversationHistory::new(), 5);
        assert!(ctx.text.starts_with(WEB_SEARCH_HEADER));
        assert!(!ctx.text.contains(KNOWLEDGE_BASE_HEADER));

        let empty = RetrievalResult {
            items: Vec::new(),
            sources_used: both_sources(),
        };
        assert_eq!(assemble(&empty, &ConversationHistory::new(), 5).text, "");
    }

    #[test]
    fn test_history_window_of_five() {
        let mut history = ConversationHistory::new();
        for i in 0..8 {
            history.push(Role::User, format!("turn {}", i));
        }
        let result = RetrievalResult {
            items: Vec::new(),
            sources_used: SourcesUsed::knowledge_base(),
        };
        let ctx = assemble(&result, &history, 5);
        assert!(!ctx.text.contains("turn 2"));
        for i in 3..8 {
            assert!(ctx.text.contains(&format!("User: turn {}", i)));
        }
    }

    #[test]
    fn test_idempotent() {
        let result = RetrievalResult {
            items: vec![kb_item("a", 0.1), kb_item("b", 0.05), web_item("w")],
            sources_used: both_sources(),
        };
        let mut history = ConversationHistory::new();
        history.push(Role::User, "q");
        assert_eq!(assemble(&result, &history, 5), assemble(&result, &history, 5));
    }
}
