//! NeuroCourier WhatsApp webhook server.
//!
//! Registers `GET /webhook` (Meta subscription handshake) and `POST /webhook`
//! (message delivery) and answers each text message through the configured
//! LLM backend. Takes the config path as its only argument
//! (default `config.toml`).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use neurocourier::config::Config;
use neurocourier::platform::whatsapp;
use neurocourier::relay::Relay;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,neurocourier=debug,whatsapp=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    let whatsapp_config = config.whatsapp()?;

    info!("Configuration loaded successfully");
    info!("  Backend: {}", config.llm.backend);
    info!("  Model: {}", config.llm.active_model());
    info!("  Phone number ID: {}", whatsapp_config.phone_number_id);

    let relay = Arc::new(Relay::from_config(&config.llm));

    info!("Relaying to {}", relay.backend_name());
    whatsapp::run(whatsapp_config, relay).await
}
