//! Telegram transport settings.

use config::ConfigError;
use oxide_purge_core::config::PurgeSettings;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Telegram transport settings loaded from environment variables.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TelegramSettings {
    /// Telegram Bot API token.
    pub telegram_token: String,
    /// Comma-separated list of user IDs allowed to purge any chat the bot administers.
    #[serde(rename = "allowed_users")]
    pub allowed_users_str: Option<String>,
}

/// Combined settings used by the Telegram transport layer.
#[derive(Clone)]
pub struct BotSettings {
    /// Engine settings shared across transport handlers.
    pub purge: Arc<PurgeSettings>,
    /// Telegram-specific settings.
    pub telegram: Arc<TelegramSettings>,
}

impl BotSettings {
    /// Create a new combined settings bundle.
    #[must_use]
    pub fn new(purge: PurgeSettings, telegram: TelegramSettings) -> Self {
        Self {
            purge: Arc::new(purge),
            telegram: Arc::new(telegram),
        }
    }
}

impl TelegramSettings {
    /// Create new settings by loading from environment and files.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        oxide_purge_core::config::build_config()?.try_deserialize()
    }

    /// Returns the set of explicitly allowed user IDs.
    #[must_use]
    pub fn allowed_users(&self) -> HashSet<i64> {
        self.allowed_users_str
            .as_ref()
            .map(|s| {
                s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                    .filter(|token| !token.is_empty())
                    .filter_map(|id| id.parse::<i64>().ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Cooldown period (seconds) between "Access Denied" messages for same user.
/// Default: 20 minutes.
pub const UNAUTHORIZED_COOLDOWN_SECS: u64 = 1200;
/// Time-to-live (seconds) for cache entries.
/// Default: 2 hours.
pub const UNAUTHORIZED_CACHE_TTL_SECS: u64 = 7200;
/// Maximum cache capacity (number of entries).
pub const UNAUTHORIZED_CACHE_MAX_SIZE: u64 = 10_000;

/// How long observed message authors are remembered.
/// Default: 2 days.
pub const MESSAGE_LOG_TTL_SECS: u64 = 172_800;
/// Maximum number of remembered messages across all chats.
pub const MESSAGE_LOG_MAX_SIZE: u64 = 1_000_000;

fn env_or(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Get unauthorized cooldown from env or default.
///
/// Environment variable: `UNAUTHORIZED_COOLDOWN_SECS`.
#[must_use]
pub fn get_unauthorized_cooldown() -> u64 {
    env_or("UNAUTHORIZED_COOLDOWN_SECS", UNAUTHORIZED_COOLDOWN_SECS)
}

/// Get unauthorized cache TTL from env or default.
///
/// Environment variable: `UNAUTHORIZED_CACHE_TTL_SECS`.
#[must_use]
pub fn get_unauthorized_cache_ttl() -> u64 {
    env_or("UNAUTHORIZED_CACHE_TTL_SECS", UNAUTHORIZED_CACHE_TTL_SECS)
}

/// Get unauthorized cache max size from env or default.
///
/// Environment variable: `UNAUTHORIZED_CACHE_MAX_SIZE`.
#[must_use]
pub fn get_unauthorized_cache_max_size() -> u64 {
    env_or("UNAUTHORIZED_CACHE_MAX_SIZE", UNAUTHORIZED_CACHE_MAX_SIZE)
}

/// Get message log TTL from env or default.
///
/// Environment variable: `MESSAGE_LOG_TTL_SECS`.
#[must_use]
pub fn get_message_log_ttl() -> u64 {
    env_or("MESSAGE_LOG_TTL_SECS", MESSAGE_LOG_TTL_SECS)
}

/// Get message log capacity from env or default.
///
/// Environment variable: `MESSAGE_LOG_MAX_SIZE`.
#[must_use]
pub fn get_message_log_max_size() -> u64 {
    env_or("MESSAGE_LOG_MAX_SIZE", MESSAGE_LOG_MAX_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_parsing() {
        let mut settings = TelegramSettings {
            telegram_token: "dummy".to_string(),
            allowed_users_str: None,
        };
        assert!(settings.allowed_users().is_empty());

        settings.allowed_users_str = Some("123,456".to_string());
        let allowed = settings.allowed_users();
        assert!(allowed.contains(&123));
        assert!(allowed.contains(&456));
        assert_eq!(allowed.len(), 2);

        settings.allowed_users_str = Some("333; 444 555".to_string());
        assert_eq!(settings.allowed_users().len(), 3);

        settings.allowed_users_str = Some("abc, 777".to_string());
        let allowed = settings.allowed_users();
        assert!(allowed.contains(&777));
        assert_eq!(allowed.len(), 1);
    }

    #[test]
    fn unset_env_falls_back_to_default() {
        assert_eq!(env_or("OXIDE_PURGE_TEST_UNSET_VARIABLE", 17), 17);
    }
}
