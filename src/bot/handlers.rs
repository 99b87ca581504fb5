//! The two-phase interaction protocol and the direct-message path.
//!
//! Phase 1 answers inline queries with an instant placeholder suggestion —
//! no browser or network work, because it fires on every keystroke. Phase 2
//! runs only once the user commits to a suggestion, and edits the
//! placeholder with the resolved media. A plain message with a link skips
//! the suggestion phase entirely.

use crate::bot::delivery::{DeliveryAdapter, DeliveryContext, DeliveryOutcome};
use crate::bot::resilient::{edit_inline_text_resilient, send_message_resilient};
use crate::config::{CANNOT_LOAD_NOTICE, NO_VIDEO_NOTICE};
use crate::resolver::MediaResolver;
use crate::utils;
use anyhow::Result;
use lazy_regex::regex;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{
    ChatAction, ChosenInlineResult, InlineKeyboardButton, InlineKeyboardMarkup, InlineQuery,
    InlineQueryResult, InlineQueryResultArticle, InputMessageContent, InputMessageContentText,
};
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

/// Supported bot commands.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Welcome message
    #[command(description = "Start the bot.")]
    Start,
    /// Usage help
    #[command(description = "Show what the bot can do.")]
    Help,
}

/// Welcome/usage text, shown for /start, /help and messages without a link
pub const WELCOME_TEXT: &str =
    "Send me link to TikTok video & I will download and send it back to you.";

/// Placeholder content shown until phase 2 replaces it
const PLACEHOLDER_TEXT: &str = "⏳ Fetching video, one moment...";
/// Title of the single inline suggestion
const SUGGESTION_TITLE: &str = "Send this video";

/// Handle /start and /help.
///
/// # Errors
///
/// Returns an error when the reply cannot be sent.
pub async fn command(bot: Bot, msg: Message, _cmd: Command) -> Result<()> {
    send_message_resilient(&bot, msg.chat.id, WELCOME_TEXT).await?;
    Ok(())
}

/// First http(s) URL in a message text, if any.
#[must_use]
pub fn extract_link(text: &str) -> Option<&str> {
    regex!(r"https?://\S+").find(text).map(|m| m.as_str())
}

/// Direct-message path: resolve the link and reply with the video at once.
///
/// There is nothing to defer here — sending the message already was the
/// user's commitment.
///
/// # Errors
///
/// Returns an error only when the failure notice itself cannot be sent.
pub async fn link_message(
    bot: Bot,
    msg: Message,
    resolver: Arc<MediaResolver>,
    delivery: Arc<DeliveryAdapter>,
) -> Result<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let Some(link) = extract_link(text) else {
        send_message_resilient(&bot, msg.chat.id, WELCOME_TEXT).await?;
        return Ok(());
    };

    let _ = bot
        .send_chat_action(msg.chat.id, ChatAction::UploadVideo)
        .await;

    match resolver.resolve(link).await {
        Ok(descriptor) => {
            let outcome = delivery
                .deliver(
                    &descriptor,
                    &DeliveryContext::DirectReply {
                        chat_id: msg.chat.id,
                    },
                )
                .await;
            if outcome != DeliveryOutcome::Delivered {
                warn!(link, ?outcome, "direct delivery did not complete");
                send_message_resilient(&bot, msg.chat.id, CANNOT_LOAD_NOTICE).await?;
            }
        }
        Err(e) => {
            warn!(link, error = %e, "direct-path resolution failed");
            send_message_resilient(&bot, msg.chat.id, CANNOT_LOAD_NOTICE).await?;
        }
    }
    Ok(())
}

/// Build the single placeholder suggestion for a query text.
///
/// Pure; exposed for tests. The result id is the deterministic fingerprint
/// of the link so Telegram de-duplicates repeated suggestions.
#[must_use]
pub fn build_suggestion(query_text: &str) -> InlineQueryResultArticle {
    let content =
        InputMessageContent::Text(InputMessageContentText::new(PLACEHOLDER_TEXT.to_string()));
    // Telegram only reports an editable inline-message handle for results
    // that carry a reply markup; the button disappears with the media edit.
    let keyboard = InlineKeyboardMarkup::new([[InlineKeyboardButton::callback(
        "Resolving…",
        "resolving",
    )]]);
    InlineQueryResultArticle::new(utils::fingerprint(query_text), SUGGESTION_TITLE, content)
        .description(query_text.to_string())
        .reply_markup(keyboard)
}

/// Phase 1: answer an inline query with one instant placeholder suggestion.
///
/// Must stay cheap — this fires on every keystroke. No resolution work
/// happens here.
///
/// # Errors
///
/// Returns an error when the answer cannot be sent.
pub async fn inline_query(bot: Bot, query: InlineQuery) -> Result<()> {
    let text = query.query.trim();
    if text.is_empty() {
        bot.answer_inline_query(query.id, Vec::<InlineQueryResult>::new())
            .await?;
        return Ok(());
    }

    let suggestion = build_suggestion(text);
    bot.answer_inline_query(query.id, vec![InlineQueryResult::Article(suggestion)])
        .cache_time(1)
        .await?;
    Ok(())
}

/// Phase 2: the user committed to a suggestion; resolve and deliver.
///
/// Correlation is by the id minted in phase 1: the fingerprint of the
/// event's link must match the chosen result id, otherwise the event is
/// dropped. Requires inline feedback to be enabled for the bot.
///
/// # Errors
///
/// Returns an error only when the failure notice itself cannot be sent.
pub async fn chosen_result(
    bot: Bot,
    chosen: ChosenInlineResult,
    resolver: Arc<MediaResolver>,
    delivery: Arc<DeliveryAdapter>,
) -> Result<()> {
    let link = chosen.query.trim();
    if utils::fingerprint(link) != chosen.result_id {
        warn!(
            link,
            result_id = chosen.result_id,
            "chosen result does not correlate with its suggestion; dropping"
        );
        return Ok(());
    }
    let Some(inline_message_id) = chosen.inline_message_id else {
        warn!(link, "chosen result carries no editable handle; dropping");
        return Ok(());
    };

    match resolver.resolve(link).await {
        Ok(descriptor) => {
            let outcome = delivery
                .deliver(
                    &descriptor,
                    &DeliveryContext::EditedSuggestion {
                        inline_message_id: inline_message_id.clone(),
                    },
                )
                .await;
            match outcome {
                DeliveryOutcome::Delivered => {
                    info!(link, "suggestion fulfilled");
                }
                other => {
                    warn!(link, outcome = ?other, "suggestion delivery did not complete");
                    edit_inline_text_resilient(&bot, &inline_message_id, NO_VIDEO_NOTICE).await?;
                }
            }
        }
        Err(e) => {
            warn!(link, error = %e, "phase-2 resolution failed");
            edit_inline_text_resilient(&bot, &inline_message_id, NO_VIDEO_NOTICE).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_link_finds_first_url() {
        assert_eq!(
            extract_link("check this https://vm.tiktok.com/ZMdRSxBL7/ out"),
            Some("https://vm.tiktok.com/ZMdRSxBL7/")
        );
        assert_eq!(
            extract_link("http://a.example/1 https://b.example/2"),
            Some("http://a.example/1")
        );
        assert_eq!(extract_link("no links here"), None);
    }

    #[test]
    fn test_suggestion_carries_placeholder_text_content() {
        let suggestion = build_suggestion("https://example.com/v/123");
        match &suggestion.input_message_content {
            InputMessageContent::Text(content) => {
                assert_eq!(content.message_text, PLACEHOLDER_TEXT);
            }
            other => panic!("placeholder must be plain text content, got {other:?}"),
        }
        // Without a reply markup Telegram reports no editable handle
        assert!(suggestion.reply_markup.is_some());
    }

    #[test]
    fn test_suggestion_id_is_deterministic_fingerprint() {
        let text = "https://example.com/v/123";
        let first = build_suggestion(text);
        let second = build_suggestion(text);
        assert_eq!(first.id, second.id);
        assert_eq!(first.id, utils::fingerprint(text));
        assert_ne!(first.id, build_suggestion("https://example.com/v/124").id);
    }
}
