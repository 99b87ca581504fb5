//! Resilient messaging utilities with automatic retry for Telegram API
//! operations.
//!
//! Thin wrappers around the send/edit calls this bot performs, retried on
//! transient network failures with exponential backoff and jitter.

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatId, Message};

/// Send a message with automatic retry on network failures.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
) -> Result<Message> {
    let text = text.into();
    crate::utils::retry_telegram_operation(|| async {
        bot.send_message(chat_id, text.clone())
            .await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Edit an inline-placeholder message to plain text, with retry.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn edit_inline_text_resilient(
    bot: &Bot,
    inline_message_id: &str,
    text: &str,
) -> Result<()> {
    crate::utils::retry_telegram_operation(|| async {
        bot.edit_message_text_inline(inline_message_id.to_string(), text.to_string())
            .await
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("Telegram edit error: {e}"))
    })
    .await
}
