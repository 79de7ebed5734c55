use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;

/// Persona attached to every prompt unless `[llm] system_prompt` overrides it.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are NeuroCourier, a helpful AI assistant created by \
     Aditya Guha. Be helpful, concise, and intelligent.";

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Ollama running on this machine
    #[default]
    Local,
    /// Google Gemini API
    Remote,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Local => write!(f, "local"),
            Backend::Remote => write!(f, "remote"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default = "default_local_model")]
    pub local_model: String,
    #[serde(default = "default_local_base_url")]
    pub local_base_url: String,
    #[serde(default)]
    pub remote_api_key: String,
    #[serde(default = "default_remote_model")]
    pub remote_model: String,
    #[serde(default = "default_remote_base_url")]
    pub remote_base_url: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl LlmConfig {
    /// Model name of whichever backend is selected.
    pub fn active_model(&self) -> &str {
        match self.backend {
            Backend::Local => &self.local_model,
            Backend::Remote => &self.remote_model,
        }
    }

    /// System instruction to send, `None` when configured as blank.
    pub fn system_instruction(&self) -> Option<&str> {
        let trimmed = self.system_prompt.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(&self.system_prompt)
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            local_model: default_local_model(),
            local_base_url: default_local_base_url(),
            remote_api_key: String::new(),
            remote_model: default_remote_model(),
            remote_base_url: default_remote_base_url(),
            system_prompt: default_system_prompt(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WhatsAppConfig {
    pub verify_token: String,
    pub access_token: String,
    pub phone_number_id: String,
    #[serde(default = "default_graph_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_graph_api_version")]
    pub api_version: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    pub telegram: Option<TelegramConfig>,
    pub whatsapp: Option<WhatsAppConfig>,
}

fn default_local_model() -> String {
    "qwen2.5:7b".to_string()
}

fn default_local_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_remote_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_remote_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_graph_base_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_graph_api_version() -> String {
    "v22.0".to_string()
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.llm.backend == Backend::Remote && self.llm.remote_api_key.trim().is_empty() {
            anyhow::bail!("[llm] backend = \"remote\" requires remote_api_key");
        }
        Ok(())
    }

    /// The [telegram] section, required by the long-polling bot.
    pub fn telegram(&self) -> Result<&TelegramConfig> {
        self.telegram
            .as_ref()
            .context("Missing [telegram] section in config")
    }

    /// The [whatsapp] section, required by the webhook server.
    pub fn whatsapp(&self) -> Result<&WhatsAppConfig> {
        self.whatsapp
            .as_ref()
            .context("Missing [whatsapp] section in config")
    }
}
