//! Ollama chat client.
//!
//! Thin wrapper around the non-streaming `/api/chat` endpoint used by
//! every model-backed collaborator (exam extraction, answer sheet
//! extraction, student analysis).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for the model client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub ollama_url: String,
    pub model_name: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
    /// Extra attempts after the first failure.
    pub retries: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            model_name: "qwen2.5:14b".to_string(),
            temperature: 0.1,
            timeout_seconds: 600,
            retries: 2,
        }
    }
}

impl From<&crate::config::ModelConfig> for ClientConfig {
    fn from(config: &crate::config::ModelConfig) -> Self {
        Self {
            ollama_url: config.ollama_url.trim_end_matches('/').to_string(),
            model_name: config.name.clone(),
            temperature: config.temperature,
            timeout_seconds: config.timeout_seconds,
            retries: config.retries,
        }
    }
}

/// Message in the chat history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    /// Ask Ollama to constrain the reply to valid JSON.
    format: &'a str,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

/// Client for the Ollama chat endpoint.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    config: ClientConfig,
    http_client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new client.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.config.model_name
    }

    /// Send a system + user prompt and return the reply text.
    ///
    /// Failed attempts are retried up to `retries` times.
    pub async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let messages = [ChatMessage::system(system), ChatMessage::user(prompt)];
        let attempts = self.config.retries + 1;
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.send_chat(&messages).await {
                Ok(content) => return Ok(content),
                Err(e) => {
                    if attempt < attempts {
                        warn!("Model request failed (attempt {}/{}): {}", attempt, attempts, e);
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Model request was never sent")))
    }

    async fn send_chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/api/chat", self.config.ollama_url);

        let request = OllamaChatRequest {
            model: &self.config.model_name,
            messages,
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: self.config.temperature,
            },
        };

        debug!("Sending chat request to {} ({} messages)", url, messages.len());

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    anyhow::anyhow!("Request timed out after {}s", self.config.timeout_seconds)
                } else if e.is_connect() {
                    anyhow::anyhow!(
                        "Cannot connect to Ollama at {}. Is Ollama running?",
                        self.config.ollama_url
                    )
                } else {
                    anyhow::anyhow!("Failed to send request: {}", e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Ollama API error {}: {}", status, body));
        }

        let chat_response: OllamaChatResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        Ok(chat_response.message.content)
    }
}

/// Remove a surrounding Markdown code fence from a model reply.
pub fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest.trim_start_matches("json"),
    };
    body.trim_end().trim_end_matches("```").trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("{\"a\": 1}"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("  ```\n{}\n```  "), "{}");
        assert_eq!(strip_code_fences("```json {\"a\": 1}```"), "{\"a\": 1}");
    }

    #[test]
    fn test_client_config_from_model_config() {
        let model = crate::config::ModelConfig {
            ollama_url: "http://gpu-box:11434/".to_string(),
            ..Default::default()
        };
        let config = ClientConfig::from(&model);
        assert_eq!(config.ollama_url, "http://gpu-box:11434");
        assert_eq!(config.model_name, model.name);
    }

    #[test]
    fn test_unreachable_server_is_reported() {
        let client = OllamaClient::new(ClientConfig {
            ollama_url: "http://127.0.0.1:9".to_string(),
            timeout_seconds: 5,
            retries: 0,
            ..Default::default()
        })
        .unwrap();

        let result = tokio_test::block_on(client.complete("system", "prompt"));
        assert!(result.is_err());
    }
}
