use std::sync::Arc;

use tracing::{error, info};

use crate::config::LlmConfig;
use crate::llm::{backend_from_config, CompletionBackend, PromptRequest};
use crate::platform::{IncomingMessage, MessageKind, OutboundMessage};

/// Outcome of a single backend call.
#[derive(Debug)]
pub enum CompletionResult {
    Reply(String),
    Failed(anyhow::Error),
}

impl CompletionResult {
    /// Reply text, or the caller's fallback when the backend failed.
    pub fn into_text(self, fallback: impl FnOnce(&anyhow::Error) -> String) -> String {
        match self {
            CompletionResult::Reply(text) => text,
            CompletionResult::Failed(e) => fallback(&e),
        }
    }
}

/// Forwards prompts to the backend chosen at start-up.
pub struct Relay {
    backend: Arc<dyn CompletionBackend>,
    system_prompt: Option<String>,
}

impl Relay {
    pub fn new(backend: Arc<dyn CompletionBackend>, system_prompt: Option<&str>) -> Self {
        Self {
            backend,
            system_prompt: system_prompt.map(str::to_string),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(backend_from_config(config), config.system_instruction())
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Send one prompt and wait for exactly one completion.
    pub async fn relay(&self, prompt: &str) -> CompletionResult {
        let request = PromptRequest::new(prompt, self.system_prompt.as_deref());

        info!("Prompt -> {}: {}", self.backend.name(), prompt);
        match self.backend.complete(&request).await {
            Ok(reply) => {
                info!("Reply <- {}: {}", self.backend.name(), reply);
                CompletionResult::Reply(reply)
            }
            Err(e) => {
                error!("{} request failed: {:#}", self.backend.name(), e);
                CompletionResult::Failed(e)
            }
        }
    }

    /// Turn one inbound message into its reply. Non-text messages get none.
    pub async fn respond(
        &self,
        incoming: &IncomingMessage,
        fallback: impl FnOnce(&anyhow::Error) -> String,
    ) -> Option<OutboundMessage> {
        if incoming.kind != MessageKind::Text {
            return None;
        }

        let text = self.relay(&incoming.text).await.into_text(fallback);
        Some(OutboundMessage {
            recipient: incoming.sender.clone(),
            text,
        })
    }
}
