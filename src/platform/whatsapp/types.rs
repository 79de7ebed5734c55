//! WhatsApp Cloud API webhook payload.
//!
//! Every level is optional: status updates, read receipts and other
//! non-message events arrive through the same endpoint with parts missing.
//! Messages are kept raw and decoded one at a time so a single odd message
//! cannot hide its siblings.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::platform::IncomingMessage;

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub entry: Vec<Entry>,
}

impl WebhookPayload {
    /// `None` when the body carries no `entry` field at all.
    pub fn from_json(raw: &Value) -> serde_json::Result<Option<Self>> {
        if raw.get("entry").is_none() {
            return Ok(None);
        }
        Self::deserialize(raw).map(Some)
    }
}

#[derive(Debug, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangeValue {
    pub messages: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
pub struct WaMessage {
    pub from: Option<String>,
    #[serde(rename = "type")]
    pub message_type: Option<String>,
    pub text: Option<TextBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextBody {
    pub body: Option<String>,
}

/// A text message that cannot be relayed.
#[derive(Debug, PartialEq, Eq)]
pub enum Malformed {
    MissingSender,
    MissingBody,
}

impl WaMessage {
    pub fn from_json(raw: &Value) -> serde_json::Result<Self> {
        Self::deserialize(raw)
    }

    pub fn is_text(&self) -> bool {
        self.message_type.as_deref() == Some("text")
    }

    /// Convert to an [`IncomingMessage`]. Anything but `type == "text"` maps to
    /// [`MessageKind::Other`](crate::platform::MessageKind::Other).
    pub fn to_incoming(&self) -> Result<IncomingMessage, Malformed> {
        if !self.is_text() {
            return Ok(IncomingMessage::other(self.from.clone().unwrap_or_default()));
        }
        let sender = self.from.as_deref().ok_or(Malformed::MissingSender)?;
        let body = self
            .text
            .as_ref()
            .and_then(|t| t.body.as_deref())
            .ok_or(Malformed::MissingBody)?;
        Ok(IncomingMessage::text(sender, body))
    }
}

/// Body of `POST /{phone-number-id}/messages` for a plain text reply.
#[derive(Debug, Serialize)]
pub struct SendMessageRequest<'a> {
    pub messaging_product: &'static str,
    pub recipient_type: &'static str,
    pub to: &'a str,
    #[serde(rename = "type")]
    pub message_type: &'static str,
    pub text: SendText<'a>,
}

#[derive(Debug, Serialize)]
pub struct SendText<'a> {
    pub body: &'a str,
}

impl<'a> SendMessageRequest<'a> {
    pub fn text(to: &'a str, body: &'a str) -> Self {
        Self {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to,
            message_type: "text",
            text: SendText { body },
        }
    }
}
