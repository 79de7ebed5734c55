use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{Backend, LlmConfig};

/// A single-turn prompt sent to the configured backend.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptRequest {
    pub prompt: String,
    pub system: Option<String>,
}

impl PromptRequest {
    pub fn new(prompt: impl Into<String>, system: Option<&str>) -> Self {
        Self {
            prompt: prompt.into(),
            system: system.map(str::to_string),
        }
    }
}

/// A synchronous (non-streaming) completion API.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Request exactly one completion and return its text.
    async fn complete(&self, request: &PromptRequest) -> Result<String>;
}

/// Build the backend selected by `[llm] backend`.
pub fn backend_from_config(config: &LlmConfig) -> Arc<dyn CompletionBackend> {
    match config.backend {
        Backend::Local => Arc::new(OllamaClient::new(
            &config.local_base_url,
            &config.local_model,
        )),
        Backend::Remote => Arc::new(GeminiClient::new(
            &config.remote_base_url,
            &config.remote_api_key,
            &config.remote_model,
        )),
    }
}

// ── Ollama ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl CompletionBackend for OllamaClient {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: &PromptRequest) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: request.prompt.clone(),
        });

        let body = OllamaChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        let url = format!("{}/api/chat", self.base_url);
        debug!("Sending request to Ollama: {} (model {})", url, self.model);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to Ollama")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama API error ({}): {}", status, error_body);
        }

        let chat_response: OllamaChatResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        Ok(chat_response.message.content)
    }
}

// ── Gemini ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl CompletionBackend for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, request: &PromptRequest) -> Result<String> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(request.prompt.clone()),
                }],
            }],
            system_instruction: request.system.as_ref().map(|system| Content {
                role: None,
                parts: vec![Part {
                    text: Some(system.clone()),
                }],
            }),
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        debug!("Sending request to Gemini: {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to Gemini")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API error ({}): {}", status, error_body);
        }

        let generated: GenerateContentResponse = response
            .json()
            .await
            .context("Failed to parse Gemini response")?;

        let content = generated
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .context("No candidates in Gemini response")?;

        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        if text.is_empty() {
            anyhow::bail!("Gemini response contained no text");
        }
        Ok(text)
    }
}
