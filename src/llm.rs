//! Google Gemini adapter for [`GenerativeModel`].
//!
//! Calls `POST {base_url}/models/{model}:generateContent` with the API key
//! in the `x-goog-api-key` header. Images are sent inline as base64.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::Engine as _;
use serde_json::json;

use crate::config::LlmConfig;
use crate::error::EngineError;
use crate::traits::GenerativeModel;

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Build from config, reading the key from `llm.api_key_env`.
    ///
    /// A missing or empty key is [`EngineError::ConfigurationMissing`];
    /// callers fall back to dummy mode on that.
    pub fn from_config(config: &LlmConfig) -> Result<Self, EngineError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                EngineError::ConfigurationMissing(format!(
                    "{} environment variable not set",
                    config.api_key_env
                ))
            })?;

        Self::new(api_key, config.model.clone(), config.base_url.clone())
            .map_err(|e| EngineError::ConfigurationMissing(format!("{:#}", e)))
    }

    async fn generate_content(&self, parts: serde_json::Value) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = json!({ "contents": [{ "parts": parts }] });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Gemini request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("Gemini API error {}: {}", status, text);
        }

        let data: serde_json::Value = response.json().await?;
        parse_generate_response(&data)
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_content(json!([{ "text": prompt }])).await
    }

    async fn generate_with_image(
        &self,
        prompt: &str,
        image: &[u8],
        mime_type: &str,
    ) -> Result<String> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        self.generate_content(json!([
            { "text": prompt },
            { "inline_data": { "mime_type": mime_type, "data": encoded } }
        ]))
        .await
    }
}

/// Concatenate the text parts of the first candidate.
fn parse_generate_response(data: &serde_json::Value) -> Result<String> {
    let candidate = data
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first());

    let Some(candidate) = candidate else {
        if let Some(reason) = data
            .pointer("/promptFeedback/blockReason")
            .and_then(|r| r.as_str())
        {
            bail!("Gemini blocked the prompt: {}", reason);
        }
        bail!("Invalid Gemini response: no candidates");
    };

    let parts = candidate
        .pointer("/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Gemini response: candidate has no parts"))?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_joins_text_parts() {
        let data = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Hello, " }, { "text": "world." }] }
            }]
        });
        assert_eq!(parse_generate_response(&data).unwrap(), "Hello, world.");
    }

    #[test]
    fn test_parse_reports_block_reason() {
        let data = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let err = parse_generate_response(&data).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
        assert!(parse_generate_response(&json!({ "candidates": [{}] })).is_err());
    }

    #[test]
    fn test_missing_key_is_configuration_missing() {
        let config = LlmConfig {
            api_key_env: "VAGENT_TEST_UNSET_KEY_8F3A".to_string(),
            ..Default::default()
        };
        let err = GeminiClient::from_config(&config).err().unwrap();
        assert!(matches!(err, EngineError::ConfigurationMissing(_)));
        assert!(err.to_string().contains("VAGENT_TEST_UNSET_KEY_8F3A"));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let c = GeminiClient::new("k", "gemini-2.5-flash", "http://localhost:1234/v1beta/").unwrap();
        assert_eq!(c.base_url, "http://localhost:1234/v1beta");
        assert_eq!(c.model_name(), "gemini-2.5-flash");
    }
}
