//! Configuration and settings management
//!
//! Loads settings from config files and environment variables and defines
//! engine constants.

use crate::purge::PurgeOptions;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Build the layered configuration shared by every crate.
///
/// Sources, later ones override earlier ones: `config/default`,
/// `config/{RUN_MODE}`, `config/local`, `APP__*` variables, plain variables.
///
/// # Errors
///
/// Returns a `ConfigError` if a present source cannot be parsed.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Not checked into git
        .add_source(File::with_name("config/local").required(false))
        // Eg. `APP__PURGE_BATCH_SIZE=50 ./target/app`
        .add_source(Environment::with_prefix("APP").separator("__"))
        // UPPER_SNAKE_CASE is mapped to snake_case; empty values count as unset
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

/// Bulk deletion settings loaded from the environment
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PurgeSettings {
    /// Identifiers processed between two status updates
    #[serde(default = "default_batch_size")]
    pub purge_batch_size: u64,
    /// Optional cap on identifiers examined per job
    #[serde(default)]
    pub purge_max_count: Option<u64>,
    /// Preserve messages written by administrators
    #[serde(default = "default_skip_admins")]
    pub purge_skip_admins: bool,
    /// Safety margin added to every platform-imposed wait
    #[serde(default = "default_rate_limit_margin_ms")]
    pub purge_rate_limit_margin_ms: u64,
    /// Re-issues of a throttled delete before it counts as an error
    #[serde(default = "default_rate_limit_retries")]
    pub purge_rate_limit_retries: u32,
    /// Consecutive failed deletes that abort the job
    #[serde(default = "default_max_consecutive_errors")]
    pub purge_max_consecutive_errors: u32,
    /// Pause after every status update
    #[serde(default = "default_batch_pause_ms")]
    pub purge_batch_pause_ms: u64,
    /// Delay before the final status message is removed (0 keeps it)
    #[serde(default = "default_status_grace_secs")]
    pub purge_status_grace_secs: u64,
    /// Optional wall-clock budget for one job
    #[serde(default)]
    pub purge_time_budget_secs: Option<u64>,
}

const fn default_batch_size() -> u64 {
    DEFAULT_BATCH_SIZE
}

const fn default_skip_admins() -> bool {
    true
}

const fn default_rate_limit_margin_ms() -> u64 {
    DEFAULT_RATE_LIMIT_MARGIN_MS
}

const fn default_rate_limit_retries() -> u32 {
    DEFAULT_RATE_LIMIT_RETRIES
}

const fn default_max_consecutive_errors() -> u32 {
    DEFAULT_MAX_CONSECUTIVE_ERRORS
}

const fn default_batch_pause_ms() -> u64 {
    DEFAULT_BATCH_PAUSE_MS
}

const fn default_status_grace_secs() -> u64 {
    DEFAULT_STATUS_GRACE_SECS
}

impl Default for PurgeSettings {
    fn default() -> Self {
        Self {
            purge_batch_size: DEFAULT_BATCH_SIZE,
            purge_max_count: None,
            purge_skip_admins: true,
            purge_rate_limit_margin_ms: DEFAULT_RATE_LIMIT_MARGIN_MS,
            purge_rate_limit_retries: DEFAULT_RATE_LIMIT_RETRIES,
            purge_max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
            purge_batch_pause_ms: DEFAULT_BATCH_PAUSE_MS,
            purge_status_grace_secs: DEFAULT_STATUS_GRACE_SECS,
            purge_time_budget_secs: None,
        }
    }
}

impl PurgeSettings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        build_config()?.try_deserialize()
    }

    /// Engine options derived from these settings
    #[must_use]
    pub fn options(&self) -> PurgeOptions {
        PurgeOptions {
            batch_size: self.purge_batch_size.max(1),
            max_count: self.purge_max_count,
            skip_admins: self.purge_skip_admins,
            rate_limit_margin: Duration::from_millis(self.purge_rate_limit_margin_ms),
            rate_limit_retries: self.purge_rate_limit_retries,
            max_consecutive_errors: self.purge_max_consecutive_errors,
            batch_pause: Duration::from_millis(self.purge_batch_pause_ms),
            status_grace: (self.purge_status_grace_secs > 0)
                .then(|| Duration::from_secs(self.purge_status_grace_secs)),
            time_budget: self.purge_time_budget_secs.map(Duration::from_secs),
        }
    }
}

/// Identifiers processed between two status updates
pub const DEFAULT_BATCH_SIZE: u64 = 30;
/// Extra wait on top of the platform's retry-after value
pub const DEFAULT_RATE_LIMIT_MARGIN_MS: u64 = 1000;
/// One bounded retry per throttled identifier
pub const DEFAULT_RATE_LIMIT_RETRIES: u32 = 1;
/// Consecutive transport failures tolerated before the job fails
pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: u32 = 20;
/// Pause after each status edit (platform edit-rate limit)
pub const DEFAULT_BATCH_PAUSE_MS: u64 = 1000;
/// Seconds the final summary stays visible
pub const DEFAULT_STATUS_GRACE_SECS: u64 = 5;

// Transport API retry configuration (status message send/edit)
/// Maximum retry attempts for transport API calls
pub const TRANSPORT_API_MAX_RETRIES: usize = 3;
/// Initial backoff for transport API retries
pub const TRANSPORT_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Maximum backoff for transport API retries
pub const TRANSPORT_API_MAX_BACKOFF_MS: u64 = 4000;
