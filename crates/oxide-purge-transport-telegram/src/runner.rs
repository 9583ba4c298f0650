use crate::bot;
use crate::bot::handlers::Command;
use crate::bot::{MessageLog, TelegramPlatform, UnauthorizedCache};
use crate::config::{
    get_message_log_max_size, get_message_log_ttl, get_unauthorized_cache_max_size,
    get_unauthorized_cache_ttl, get_unauthorized_cooldown, BotSettings,
};
use oxide_purge_runtime::TelegramJobRegistry;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::{error, info};

/// Run the Telegram transport runtime.
pub async fn run_bot(settings: Arc<BotSettings>) {
    let bot = Bot::new(settings.telegram.telegram_token.clone());
    let message_log = init_message_log();
    let platform = Arc::new(TelegramPlatform::new(bot.clone(), Arc::clone(&message_log)));
    let registry = Arc::new(TelegramJobRegistry::new());
    let unauthorized_cache = init_unauthorized_cache();
    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![
            settings,
            message_log,
            platform,
            registry,
            unauthorized_cache
        ])
        // Plain chatter is only recorded, never answered
        .default_handler(|_| async {})
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn init_message_log() -> Arc<MessageLog> {
    let ttl = get_message_log_ttl();
    let max_size = get_message_log_max_size();
    info!("Initializing MessageLog (ttl: {}s, max_size: {})", ttl, max_size);
    Arc::new(MessageLog::new(ttl, max_size))
}

fn init_unauthorized_cache() -> Arc<UnauthorizedCache> {
    let cooldown = get_unauthorized_cooldown();
    let ttl = get_unauthorized_cache_ttl();
    let max_size = get_unauthorized_cache_max_size();

    info!(
        "Initializing UnauthorizedCache (cooldown: {}s, ttl: {}s, max_size: {})",
        cooldown, ttl, max_size
    );

    Arc::new(UnauthorizedCache::new(cooldown, ttl, max_size))
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(
            Update::filter_message()
                .inspect_async(|msg: Message, log: Arc<MessageLog>| async move {
                    log.record(&msg).await;
                })
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(handle_command),
                ),
        )
        .branch(
            Update::filter_edited_message()
                .inspect_async(|msg: Message, log: Arc<MessageLog>| async move {
                    log.record(&msg).await;
                })
                .endpoint(|| async { respond(()) }),
        )
        .branch(
            Update::filter_channel_post()
                .inspect_async(|msg: Message, log: Arc<MessageLog>| async move {
                    log.record(&msg).await;
                })
                .endpoint(|| async { respond(()) }),
        )
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    platform: Arc<TelegramPlatform>,
    registry: Arc<TelegramJobRegistry>,
    cache: Arc<UnauthorizedCache>,
    settings: Arc<BotSettings>,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start => bot::handlers::start(bot, msg, settings).await,
        Command::Help => bot::handlers::help(bot, msg).await,
        Command::DeleteAll(arg) => {
            bot::handlers::delete_all(bot, msg, arg, platform, registry, settings, cache).await
        }
        Command::Cancel => bot::handlers::cancel(bot, msg, registry, settings, cache).await,
        Command::Stats => {
            let log = Arc::clone(platform.message_log());
            bot::handlers::stats(bot, msg, registry, log, cache).await
        }
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}
