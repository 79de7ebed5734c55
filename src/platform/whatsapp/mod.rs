pub mod client;
pub mod types;
pub mod webhook;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::WhatsAppConfig;
use crate::relay::Relay;

use self::client::WhatsAppClient;
use self::webhook::WebhookState;

/// Serve the WhatsApp webhook until Ctrl-C.
pub async fn run(config: &WhatsAppConfig, relay: Arc<Relay>) -> Result<()> {
    let state = WebhookState {
        verify_token: Arc::from(config.verify_token.as_str()),
        relay,
        sender: Arc::new(WhatsAppClient::new(config)),
    };

    let app = webhook::router(state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.listen_addr))?;

    info!("WhatsApp webhook listening on http://{}/webhook", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down WhatsApp webhook...");
        })
        .await
        .context("Server error")?;

    Ok(())
}
