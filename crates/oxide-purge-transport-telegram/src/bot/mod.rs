/// Command handlers
pub mod handlers;
/// Author log backing message lookups
pub mod message_log;
/// `ChatPlatform` implementation for Telegram
pub mod platform;
/// Resilient messaging with automatic retry for Telegram API operations
pub mod resilient;
/// Unauthorized access flood protection
pub mod unauthorized_cache;

pub use message_log::MessageLog;
pub use platform::TelegramPlatform;
pub use unauthorized_cache::UnauthorizedCache;
