//! Chat-completions adapter for the configured LLM provider.
//!
//! OpenAI, Groq (llama), and Mistral all speak the same wire format, so
//! one client covers the three providers; only the base URL, model, and
//! key differ.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::LanguageModel;
use crate::config::LlmConfig;

/// OpenAI-compatible chat-completions client.
pub struct ChatCompletionsClient {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl ChatCompletionsClient {
    /// Build a client from configuration, applying the provider's
    /// defaults for anything unset. Fails when the API key is missing.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config.api_key.clone().with_context(|| {
            format!(
                "No API key configured for LLM provider {:?} (env or .prsentry/config.yaml)",
                config.provider
            )
        })?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| config.provider.default_base_url().to_string());

        let model = config
            .model
            .clone()
            .unwrap_or_else(|| config.provider.default_model().to_string());

        Ok(Self::new(base_url, api_key, model, config.temperature))
    }

    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LanguageModel for ChatCompletionsClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .context("Failed to reach chat-completions endpoint")?
            .error_for_status()
            .context("Chat-completions request rejected")?;

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat-completions response")?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .context("Chat-completions response contained no choices")?;

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [
                    {"message": {"role": "assistant", "content": "A tidy summary."}}
                ]
            })))
            .mount(&server)
            .await;

        let client = ChatCompletionsClient::new(server.uri(), "key", "gpt-4", 0.1);
        let text = client.complete("summarize this").await.unwrap();
        assert_eq!(text, "A tidy summary.");
    }

    #[tokio::test]
    async fn test_complete_surfaces_http_errors() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = ChatCompletionsClient::new(server.uri(), "key", "gpt-4", 0.1);
        assert!(client.complete("summarize this").await.is_err());
    }

    #[tokio::test]
    async fn test_empty_choices_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let client = ChatCompletionsClient::new(server.uri(), "key", "gpt-4", 0.1);
        assert!(client.complete("summarize this").await.is_err());
    }
}
