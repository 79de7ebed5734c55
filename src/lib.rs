//! NeuroCourier: relays chat messages from Telegram and WhatsApp to an LLM
//! backend (Ollama or Gemini) and sends the answer back.
//!
//! Two binaries share this library:
//! - `neurocourier` (src/main.rs): Telegram bot, long-polling.
//! - `whatsapp` (src/bin/whatsapp.rs): WhatsApp Cloud API webhook server.

pub mod config;
pub mod llm;
pub mod platform;
pub mod relay;
