//! Resilient messaging utilities with automatic retry for Telegram API operations.
//!
//! Status and reply messages go through these wrappers so that a transient
//! network failure does not lose a progress update. Delete calls never do:
//! the engine's executor owns their retry policy.

use anyhow::Result;
use oxide_purge_core::utils::{retry_transport_operation, truncate_str};
use teloxide::prelude::*;
use teloxide::types::{ChatId, Message, MessageId, ParseMode};
use teloxide::{ApiError, RequestError};

/// Telegram rejects texts above 4096 characters
const MAX_TEXT_CHARS: usize = 4000;

/// Result of an edit that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditStatus {
    /// Text replaced
    Edited,
    /// Telegram reported the text was already identical
    Unchanged,
    /// The message no longer exists
    Missing,
}

fn clamp(text: &str) -> String {
    if text.chars().count() > MAX_TEXT_CHARS {
        format!("{}...", truncate_str(text, MAX_TEXT_CHARS))
    } else {
        text.to_string()
    }
}

/// Send an HTML message with automatic retry on network failures.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
) -> Result<Message> {
    let text = clamp(&text.into());
    retry_transport_operation(|| async {
        bot.send_message(chat_id, text.clone())
            .parse_mode(ParseMode::Html)
            .await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Edit an HTML message with automatic retry on network failures.
///
/// "Not modified" and "not found" replies end the retry loop immediately.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn edit_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    text: &str,
) -> Result<EditStatus> {
    let text = clamp(text);
    retry_transport_operation(|| async {
        match bot
            .edit_message_text(chat_id, msg_id, text.clone())
            .parse_mode(ParseMode::Html)
            .await
        {
            Ok(_) => Ok(EditStatus::Edited),
            Err(e) => classify_edit_error(e),
        }
    })
    .await
}

fn classify_edit_error(error: RequestError) -> Result<EditStatus> {
    match error {
        RequestError::Api(ApiError::MessageNotModified) => Ok(EditStatus::Unchanged),
        RequestError::Api(ApiError::MessageToEditNotFound | ApiError::MessageIdInvalid) => {
            Ok(EditStatus::Missing)
        }
        other => Err(anyhow::anyhow!("Telegram edit error: {other}")),
    }
}
