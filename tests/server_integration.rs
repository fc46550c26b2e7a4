//! HTTP API tests against a real server on a loopback port.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use vector_agent::bootstrap::{Agent, Components};
use vector_agent::config::Config;
use vector_agent::embedding::EmbeddingProvider;
use vector_agent::history::InMemoryHistoryStore;
use vector_agent::models::{Chunk, KnowledgeBaseItem};
use vector_agent::store::InMemoryKnowledgeBase;
use vector_agent::traits::KnowledgeBaseClient;
use vector_agent::web::DisabledWebSearch;

/// One dimension per distinct word in a tiny fixed vocabulary.
struct VocabEmbedder;

const VOCAB: [&str; 5] = ["sqlite", "rust", "tokio", "axum", "garden"];

#[async_trait]
impl EmbeddingProvider for VocabEmbedder {
    fn model_name(&self) -> &str {
        "vocab"
    }
    fn dims(&self) -> usize {
        VOCAB.len()
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                VOCAB
                    .iter()
                    .map(|w| if lower.contains(w) { 1.0 } else { 0.0 })
                    .collect()
            })
            .collect())
    }
}

struct DownKnowledgeBase;

#[async_trait]
impl KnowledgeBaseClient for DownKnowledgeBase {
    async fn search(&self, _: &str, _: usize) -> Result<Vec<KnowledgeBaseItem>> {
        anyhow::bail!("database is locked")
    }
    async fn ingest(&self, _: &[Chunk]) -> Result<usize> {
        anyhow::bail!("database is locked")
    }
}

fn components(knowledge_base: Arc<dyn KnowledgeBaseClient>) -> Components {
    Components {
        knowledge_base,
        web_search: Arc::new(DisabledWebSearch),
        model: None,
        history: Arc::new(InMemoryHistoryStore::new()),
    }
}

/// Start a server for `components` and return its base URL.
async fn start(components: Components) -> String {
    let agent = Arc::new(Agent::new(Config::minimal(), components).unwrap());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        vector_agent::server::serve(listener, agent).await.unwrap();
    });

    let base = format!("http://127.0.0.1:{}", port);
    wait_for_server(&base).await;
    base
}

async fn wait_for_server(base: &str) {
    let url = format!("{}/health", base);
    for _ in 0..50 {
        if reqwest::get(&url).await.is_ok() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    panic!("server did not start at {}", base);
}

async fn memory_server() -> String {
    start(components(Arc::new(InMemoryKnowledgeBase::new(Arc::new(VocabEmbedder))))).await
}

#[tokio::test]
async fn test_root_and_health() {
    let base = memory_server().await;

    let root: Value = reqwest::get(&base).await.unwrap().json().await.unwrap();
    assert_eq!(root["message"], "Vector Store Agent API is running");

    let health: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["mode"], "dummy");
}

#[tokio::test]
async fn test_ingest_search_and_chat() {
    let base = memory_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/ingest", base))
        .json(&json!([
            {"content": "SQLite is an embedded database.", "source": "db.md"},
            {"content": "The garden needs watering.", "metadata": {"owner": "sam"}},
            {"content": "   "}
        ]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Ingested 2 documents");
    assert_eq!(body["chunks"], 2);
    assert_eq!(body["skipped"], 1);

    let search: Value = client
        .post(format!("{}/search", base))
        .json(&json!({"query": "tell me about sqlite", "limit": 1}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let results = search["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["content"], "SQLite is an embedded database.");
    assert!(results[0]["score"].as_f64().unwrap() > 0.99);

    let chat: Value = client
        .post(format!("{}/chat", base))
        .json(&json!({"message": "what is sqlite?"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let response = chat["response"].as_str().unwrap();
    assert!(response.starts_with("[Dummy Agent] Sources: Knowledge Base\n"));
    assert!(response.contains("SQLite is an embedded database."));
    assert_eq!(chat["sources_used"], json!(["Knowledge Base"]));
}

#[tokio::test]
async fn test_chat_history_is_recorded_and_cleared() {
    let base = memory_server().await;
    let client = reqwest::Client::new();

    let chat = client
        .post(format!("{}/chat", base))
        .json(&json!({
            "message": "and the second one?",
            "history": [
                {"role": "user", "content": "list two crates"},
                {"role": "assistant", "content": "tokio and axum"}
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(chat.status(), 200);
    let chat: Value = chat.json().await.unwrap();
    // No knowledge, so the web fallback fired (disabled, so nothing found).
    assert_eq!(chat["sources_used"], json!(["Knowledge Base", "Web Search"]));
    assert!(chat["response"]
        .as_str()
        .unwrap()
        .contains("Assistant: tokio and axum"));

    let history: Value = reqwest::get(format!("{}/history", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let messages = history["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[0]["content"], "and the second one?");
    assert_eq!(messages[1]["role"], "agent");

    let cleared = client
        .delete(format!("{}/history", base))
        .send()
        .await
        .unwrap();
    assert_eq!(cleared.status(), 200);

    let history: Value = reqwest::get(format!("{}/history", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(history["messages"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_blank_message_is_bad_request() {
    let base = memory_server().await;
    let resp = reqwest::Client::new()
        .post(format!("{}/chat", base))
        .json(&json!({"message": "  "}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_knowledge_base_outage_is_503() {
    let base = start(components(Arc::new(DownKnowledgeBase))).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/chat", base))
        .json(&json!({"message": "hello"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 503);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "upstream_unavailable");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("database is locked"));

    let resp = client
        .post(format!("{}/ingest", base))
        .json(&json!([{"content": "x"}]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 503);
}

#[tokio::test]
async fn test_upload_text_file_and_reject_image_in_dummy_mode() {
    let base = memory_server().await;
    let client = reqwest::Client::new();

    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(b"Axum is a web framework built on tokio.".to_vec())
            .file_name("notes.txt"),
    );
    let resp = client
        .post(format!("{}/upload", base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().contains("notes.txt"));

    let search: Value = client
        .post(format!("{}/search", base))
        .json(&json!({"query": "axum", "limit": 1}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        search["results"][0]["content"],
        "Axum is a web framework built on tokio."
    );

    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(vec![0x89u8, 0x50, 0x4e, 0x47]).file_name("chart.png"),
    );
    let resp = client
        .post(format!("{}/upload", base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}
