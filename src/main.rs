use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use neurocourier::config::Config;
use neurocourier::platform::telegram;
use neurocourier::relay::Relay;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,neurocourier=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    let telegram_config = config.telegram()?;

    info!("Configuration loaded successfully");
    info!("  Backend: {}", config.llm.backend);
    info!("  Model: {}", config.llm.active_model());

    let relay = Arc::new(Relay::from_config(&config.llm));

    info!("Relaying to {}", relay.backend_name());
    info!("Bot is running...");
    telegram::run(telegram_config, relay).await?;

    Ok(())
}
