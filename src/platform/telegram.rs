use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, MessageEntity, MessageEntityKind, ReplyParameters};
use tracing::{debug, info};

use crate::config::TelegramConfig;
use crate::platform::IncomingMessage;
use crate::relay::Relay;

/// Telegram rejects messages over 4096 chars; leave some headroom.
const MAX_CHUNK_LEN: usize = 4000;

/// Split long messages for Telegram's 4096 char limit
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        // Walk back to a valid UTF-8 char boundary so slicing doesn't panic
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        let actual_end = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .or_else(|| text[start..end].rfind(' '))
                .map(|pos| start + pos + 1)
                .unwrap_or(end)
        } else {
            end
        };

        chunks.push(text[start..actual_end].to_string());
        start = actual_end;
    }

    chunks
}

/// Reply text sent when the backend call fails.
pub fn error_reply(e: &anyhow::Error) -> String {
    format!("Error: {}", e)
}

/// True when the message opens with a bot command such as `/start`.
fn starts_with_command(entities: &[MessageEntity]) -> bool {
    entities
        .iter()
        .any(|e| e.offset == 0 && matches!(e.kind, MessageEntityKind::BotCommand))
}

/// Text messages that are not commands; everything else is left to the default handler.
fn relayable(msg: &Message) -> Option<IncomingMessage> {
    let text = msg.text()?;
    if starts_with_command(msg.entities().unwrap_or(&[])) {
        return None;
    }
    Some(IncomingMessage::text(msg.chat.id.0.to_string(), text))
}

/// Run the Telegram bot platform
pub async fn run(config: &TelegramConfig, relay: Arc<Relay>) -> Result<()> {
    let bot = Bot::new(&config.bot_token);

    info!("Starting Telegram platform...");

    let handler = Update::filter_message()
        .filter_map(|msg: Message| relayable(&msg))
        .endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![relay])
        .default_handler(|upd| async move {
            debug!("Ignoring update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(
    bot: Bot,
    msg: Message,
    incoming: IncomingMessage,
    relay: Arc<Relay>,
) -> ResponseResult<()> {
    info!("Telegram message from {}: {}", incoming.sender, incoming.text);

    bot.send_chat_action(msg.chat.id, ChatAction::Typing)
        .await
        .ok();

    let reply = match relay.respond(&incoming, error_reply).await {
        Some(reply) => reply,
        None => return Ok(()),
    };

    info!("Telegram reply to {}: {}", reply.recipient, reply.text);

    for chunk in split_message(&reply.text, MAX_CHUNK_LEN) {
        bot.send_message(msg.chat.id, chunk)
            .reply_parameters(ReplyParameters::new(msg.id))
            .await?;
    }

    Ok(())
}
