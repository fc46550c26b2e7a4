//! Web search adapters.

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::config::WebSearchConfig;
use crate::models::WebItem;
use crate::traits::WebSearchClient;

/// DuckDuckGo Instant Answer API. No API key required.
///
/// Returns the abstract (when present) followed by related topics.
pub struct DuckDuckGoClient {
    client: reqwest::Client,
    base_url: String,
}

impl DuckDuckGoClient {
    pub fn new(config: &WebSearchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("vagent/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }
}

#[async_trait]
impl WebSearchClient for DuckDuckGoClient {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebItem>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .context("DuckDuckGo request failed")?
            .error_for_status()?;

        // DuckDuckGo answers with `application/x-javascript`, so parse by hand.
        let body = response.text().await?;
        let data: serde_json::Value =
            serde_json::from_str(&body).context("Failed to parse DuckDuckGo response")?;

        Ok(parse_instant_answer(&data, limit))
    }
}

/// Flatten an Instant Answer payload into at most `limit` items.
///
/// Nested topic groups (`{"Name": .., "Topics": [..]}`) are expanded in place.
pub fn parse_instant_answer(data: &serde_json::Value, limit: usize) -> Vec<WebItem> {
    let mut results = Vec::new();
    if limit == 0 {
        return results;
    }

    // Abstract (main result)
    if let Some(abstract_text) = data.get("AbstractText").and_then(|t| t.as_str()) {
        if !abstract_text.is_empty() {
            results.push(WebItem {
                title: str_field(data, "Heading").unwrap_or("Result").to_string(),
                body: abstract_text.to_string(),
                url: str_field(data, "AbstractURL").unwrap_or("").to_string(),
            });
        }
    }

    // Related topics
    if let Some(topics) = data.get("RelatedTopics").and_then(|r| r.as_array()) {
        collect_topics(topics, limit, &mut results);
    }

    results.truncate(limit);
    results
}

fn collect_topics(topics: &[serde_json::Value], limit: usize, results: &mut Vec<WebItem>) {
    for topic in topics {
        if results.len() >= limit {
            return;
        }
        if let Some(nested) = topic.get("Topics").and_then(|t| t.as_array()) {
            collect_topics(nested, limit, results);
            continue;
        }
        if let Some(text) = str_field(topic, "Text") {
            results.push(WebItem {
                title: text.chars().take(80).collect::<String>(),
                body: text.to_string(),
                url: str_field(topic, "FirstURL").unwrap_or("").to_string(),
            });
        }
    }
}

fn str_field<'a>(value: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(|v| v.as_str())
}

/// Used when `web_search.provider = "disabled"`: always finds nothing.
pub struct DisabledWebSearch;

#[async_trait]
impl WebSearchClient for DisabledWebSearch {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<WebItem>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> serde_json::Value {
        json!({
            "Heading": "Rust (programming language)",
            "AbstractText": "Rust is a general-purpose programming language.",
            "AbstractURL": "https://en.wikipedia.org/wiki/Rust_(programming_language)",
            "RelatedTopics": [
                {"Text": "Cargo - the Rust package manager", "FirstURL": "https://duckduckgo.com/Cargo"},
                {"Name": "See also", "Topics": [
                    {"Text": "Ferris - the Rust mascot", "FirstURL": "https://duckduckgo.com/Ferris"}
                ]},
                {"Text": "Crates.io - registry", "FirstURL": "https://duckduckgo.com/Crates"}
            ]
        })
    }

    #[test]
    fn test_abstract_first_then_topics() {
        let items = parse_instant_answer(&sample(), 10);
        assert_eq!(items.len(), 4);
        assert_eq!(items[0].title, "Rust (programming language)");
        assert!(items[0].url.contains("wikipedia"));
        assert_eq!(items[2].body, "Ferris - the Rust mascot");
    }

    #[test]
    fn test_limit_respected() {
        let items = parse_instant_answer(&sample(), 2);
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].url, "https://duckduckgo.com/Cargo");
        assert!(parse_instant_answer(&sample(), 0).is_empty());
    }

    #[test]
    fn test_empty_payload() {
        assert!(parse_instant_answer(&json!({"AbstractText": "", "RelatedTopics": []}), 3).is_empty());
    }

    #[tokio::test]
    async fn test_disabled_finds_nothing() {
        assert!(DisabledWebSearch.search("q", 3).await.unwrap().is_empty());
    }
}
