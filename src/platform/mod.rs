pub mod telegram;
pub mod whatsapp;

use anyhow::Result;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    /// Media, stickers, reactions, locations and anything else without a body we relay
    Other,
}

/// A message received from any platform
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    /// Platform-specific conversation / sender ID as string
    pub sender: String,
    /// The message text (empty for non-text messages)
    pub text: String,
    pub kind: MessageKind,
}

impl IncomingMessage {
    pub fn text(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
            kind: MessageKind::Text,
        }
    }

    pub fn other(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            text: String::new(),
            kind: MessageKind::Other,
        }
    }
}

/// A reply to deliver back to the originating conversation
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub recipient: String,
    pub text: String,
}

/// Platform send primitive for bots that deliver replies over plain HTTP.
#[async_trait]
pub trait ReplySender: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<()>;
}
