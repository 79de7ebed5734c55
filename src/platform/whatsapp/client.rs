use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::config::WhatsAppConfig;
use crate::platform::whatsapp::types::SendMessageRequest;
use crate::platform::{OutboundMessage, ReplySender};

/// Sends text messages through the WhatsApp Cloud (Graph) API.
pub struct WhatsAppClient {
    client: reqwest::Client,
    messages_url: String,
    access_token: String,
}

impl WhatsAppClient {
    pub fn new(config: &WhatsAppConfig) -> Self {
        let messages_url = format!(
            "{}/{}/{}/messages",
            config.api_base_url.trim_end_matches('/'),
            config.api_version,
            config.phone_number_id
        );
        Self {
            client: reqwest::Client::new(),
            messages_url,
            access_token: config.access_token.clone(),
        }
    }
}

#[async_trait]
impl ReplySender for WhatsAppClient {
    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        let body = SendMessageRequest::text(&message.recipient, &message.text);

        debug!("Sending WhatsApp message: {}", self.messages_url);

        let response = self
            .client
            .post(&self.messages_url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to WhatsApp")?;

        let status = response.status();
        let response_body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("WhatsApp API error ({}): {}", status, response_body);
        }

        debug!("WhatsApp API response: {} {}", status, response_body);
        Ok(())
    }
}
