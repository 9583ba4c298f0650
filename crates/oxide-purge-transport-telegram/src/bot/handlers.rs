use crate::bot::resilient::send_message_resilient;
use crate::bot::{MessageLog, TelegramPlatform, UnauthorizedCache};
use crate::config::BotSettings;
use anyhow::Result;
use oxide_purge_core::utils::format_elapsed;
use oxide_purge_core::{ChatId, MessageId, PurgeOutcome};
use oxide_purge_runtime::{spawn_purge, PurgeRequest, TelegramJobRegistry};
use std::sync::Arc;
use teloxide::{prelude::*, utils::command::BotCommands};
use tracing::{error, info, warn};

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

fn get_user_name(msg: &Message) -> String {
    if let Some(ref user) = msg.from {
        if let Some(ref username) = user.username {
            return username.clone();
        }
        if !user.first_name.is_empty() {
            return user.first_name.clone();
        }
    }
    "Unknown".to_string()
}

/// Supported commands for the bot
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Show the welcome message
    #[command(description = "Show the welcome message.")]
    Start,
    /// Show the command list
    #[command(description = "Show this help.")]
    Help,
    /// Delete recent messages, optionally limited to a count
    #[command(description = "Delete recent non-admin messages. Optional: how many to scan.")]
    DeleteAll(String),
    /// Stop the running deletion
    #[command(description = "Stop the running deletion in this chat.")]
    Cancel,
    /// Show bot statistics
    #[command(description = "Show bot statistics.")]
    Stats,
}

/// Parse the optional `/deleteall` argument.
///
/// # Errors
///
/// Returns the reply text for an argument that is not a positive integer.
pub fn parse_count(arg: &str) -> Result<Option<u64>, String> {
    let arg = arg.trim();
    if arg.is_empty() {
        return Ok(None);
    }
    match arg.parse::<u64>() {
        Ok(0) | Err(_) => Err(format!(
            "⚠️ <code>{}</code> is not a valid count. Usage: <code>/deleteall [count]</code>",
            html_escape::encode_text(arg)
        )),
        Ok(count) => Ok(Some(count)),
    }
}

/// Reply to `/deleteall` in a private chat
const GROUPS_ONLY: &str = "ℹ️ /deleteall only works in groups.";

fn welcome_text(skip_admins: bool) -> String {
    let scope = if skip_admins {
        "non-admin messages"
    } else {
        "messages"
    };
    format!(
        "👋 <b>Hi!</b> I can bulk-delete {scope} in this chat.\n\n\
        /deleteall - Delete all recent {scope}\n\
        /deleteall 500 - Only scan the last 500 messages\n\
        /cancel - Stop a running deletion\n\n\
        ⚠️ Make sure I have admin permissions with delete rights."
    )
}

async fn reply(bot: &Bot, msg: &Message, text: impl Into<String>) -> Result<()> {
    send_message_resilient(bot, msg.chat.id, text).await?;
    Ok(())
}

/// Administrators of the chat and users from `ALLOWED_USERS` may purge.
async fn is_authorized(bot: &Bot, msg: &Message, settings: &BotSettings) -> bool {
    let user_id = get_user_id_safe(msg);
    if settings.telegram.allowed_users().contains(&user_id) {
        return true;
    }
    // Anonymous administrators post as the group itself
    if msg
        .sender_chat
        .as_ref()
        .is_some_and(|chat| chat.id == msg.chat.id)
    {
        return true;
    }
    let Some(user) = msg.from.as_ref() else {
        return false;
    };
    match bot.get_chat_member(msg.chat.id, user.id).await {
        Ok(member) => member.kind.is_privileged(),
        Err(e) => {
            warn!(chat_id = msg.chat.id.0, user_id, error = %e, "Failed to check caller rank");
            false
        }
    }
}

/// Reply "not allowed" at most once per cooldown.
async fn deny(bot: &Bot, msg: &Message, cache: &UnauthorizedCache) -> Result<()> {
    let user_id = get_user_id_safe(msg);
    let user_name = get_user_name(msg);
    if cache.should_send(msg.chat.id.0, user_id, &user_name).await {
        info!("⛔️ Unauthorized purge attempt from user {user_id} ({user_name}).");
        reply(bot, msg, "⛔️ Only chat administrators can do that.").await?;
        cache.mark_sent(msg.chat.id.0, user_id).await;
    }
    Ok(())
}

/// Start handler
///
/// # Errors
///
/// Returns an error if the welcome message cannot be sent.
pub async fn start(bot: Bot, msg: Message, settings: Arc<BotSettings>) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    info!("User {user_id} initiated /start command.");
    reply(&bot, &msg, welcome_text(settings.purge.purge_skip_admins)).await
}

/// Help handler
///
/// # Errors
///
/// Returns an error if the help message cannot be sent.
pub async fn help(bot: Bot, msg: Message) -> Result<()> {
    let text = format!(
        "{}\n\n<i>Admin messages sent before I joined, or while I was offline, \
        cannot be told apart and will be deleted too.</i>",
        html_escape::encode_text(&Command::descriptions().to_string())
    );
    reply(&bot, &msg, text).await
}

/// `/deleteall` handler: checks the caller, claims the chat and spawns the job.
///
/// # Errors
///
/// Returns an error if a reply cannot be sent.
pub async fn delete_all(
    bot: Bot,
    msg: Message,
    arg: String,
    platform: Arc<TelegramPlatform>,
    registry: Arc<TelegramJobRegistry>,
    settings: Arc<BotSettings>,
    cache: Arc<UnauthorizedCache>,
) -> Result<()> {
    if msg.chat.is_private() {
        return reply(&bot, &msg, GROUPS_ONLY).await;
    }
    if !is_authorized(&bot, &msg, &settings).await {
        return deny(&bot, &msg, &cache).await;
    }
    let max_count = match parse_count(&arg) {
        Ok(count) => count,
        Err(text) => return reply(&bot, &msg, text).await,
    };
    let Some(guard) = registry.try_acquire(msg.chat.id.0) else {
        return reply(
            &bot,
            &msg,
            "⏳ A deletion is already running here. Use /cancel to stop it.",
        )
        .await;
    };

    let mut options = settings.purge.options();
    if max_count.is_some() {
        options.max_count = max_count;
    }
    info!(
        chat_id = msg.chat.id.0,
        user_id = get_user_id_safe(&msg),
        job_id = %guard.job_id(),
        max_count = ?options.max_count,
        "Starting purge"
    );

    let request = PurgeRequest {
        chat: ChatId(msg.chat.id.0),
        invoking: MessageId(msg.id.0),
        options,
    };
    let handle = spawn_purge(guard, platform, request, None);
    tokio::spawn(async move {
        match handle.await {
            Ok(outcome) => log_outcome(&outcome),
            Err(e) => error!(error = %e, "Purge task panicked"),
        }
    });
    Ok(())
}

fn log_outcome(outcome: &PurgeOutcome) {
    let elapsed = (outcome.finished_at - outcome.started_at)
        .to_std()
        .unwrap_or_default();
    info!(
        job_id = %outcome.job_id,
        deleted = outcome.counts.deleted,
        skipped = outcome.counts.skipped,
        errors = outcome.counts.errors,
        elapsed = %format_elapsed(elapsed),
        state = ?outcome.state,
        "Purge outcome"
    );
}

/// `/cancel` handler
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn cancel(
    bot: Bot,
    msg: Message,
    registry: Arc<TelegramJobRegistry>,
    settings: Arc<BotSettings>,
    cache: Arc<UnauthorizedCache>,
) -> Result<()> {
    if !is_authorized(&bot, &msg, &settings).await {
        return deny(&bot, &msg, &cache).await;
    }
    if registry.cancel(&msg.chat.id.0) {
        reply(&bot, &msg, "🛑 Stopping the deletion...").await
    } else {
        reply(&bot, &msg, "ℹ️ Nothing to cancel.").await
    }
}

/// Stats handler - running jobs, message log size and anti-spam counters
///
/// # Errors
///
/// Returns an error if the stats response cannot be sent.
pub async fn stats(
    bot: Bot,
    msg: Message,
    registry: Arc<TelegramJobRegistry>,
    log: Arc<MessageLog>,
    cache: Arc<UnauthorizedCache>,
) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    info!("Stats command received from user {user_id}.");

    let cooldown_mins = cache.cooldown().as_secs() / 60;
    let here = registry
        .get(&msg.chat.id.0)
        .map_or_else(String::new, |job| {
            format!(
                "• Running here since {} UTC\n",
                job.started_at.format("%H:%M:%S")
            )
        });
    let stats_text = format!(
        "<b>📊 Bot Statistics</b>\n\n\
        <b>Deletions:</b>\n\
        • Running jobs: {}\n\
        {here}\
        • Remembered messages: {}\n\n\
        <b>Anti-spam protection (Access Denied):</b>\n\
        • Cooldown period: {cooldown_mins} min.\n\
        • Cache entries: {}\n\
        • Blocked notifications: {}",
        registry.len(),
        log.entry_count(),
        cache.entry_count(),
        cache.silenced_count(),
    );

    reply(&bot, &msg, stats_text).await
}
