//! Rate-limited delete executor
//!
//! Turns a single `delete_message` call into a tagged [`DeleteOutcome`].
//! Throttling is absorbed with a bounded number of re-issues; everything
//! else is reported to the walker as-is.

use super::PurgeOptions;
use crate::platform::{ChatId, ChatPlatform, MessageId, PlatformError};
use std::time::Duration;
use tracing::{debug, warn};

/// Result of deleting one identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Message removed
    Deleted,
    /// Message did not exist anymore
    AlreadyGone,
    /// The platform refuses to delete this message (service messages etc.)
    Forbidden,
    /// Still throttled after the retry cap; carries the last requested wait
    RateLimited(Duration),
    /// Unexpected failure
    TransportError(String),
}

/// Counter an outcome is charged to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tally {
    /// `deleted`
    Deleted,
    /// `skipped`
    Skipped,
    /// `errors`
    Errored,
}

impl DeleteOutcome {
    /// Counter this outcome increments
    #[must_use]
    pub const fn tally(&self) -> Tally {
        match self {
            Self::Deleted => Tally::Deleted,
            Self::AlreadyGone | Self::Forbidden => Tally::Skipped,
            Self::RateLimited(_) | Self::TransportError(_) => Tally::Errored,
        }
    }
}

impl From<Result<(), PlatformError>> for DeleteOutcome {
    fn from(result: Result<(), PlatformError>) -> Self {
        match result {
            Ok(()) => Self::Deleted,
            Err(PlatformError::NotFound) => Self::AlreadyGone,
            Err(PlatformError::Forbidden(_)) => Self::Forbidden,
            Err(PlatformError::RateLimited(wait)) => Self::RateLimited(wait),
            Err(PlatformError::Transport(reason)) => Self::TransportError(reason),
        }
    }
}

/// Issues delete calls one identifier at a time
pub struct DeleteExecutor<'a, P: ?Sized> {
    platform: &'a P,
    margin: Duration,
    retries: u32,
}

impl<'a, P> DeleteExecutor<'a, P>
where
    P: ChatPlatform + ?Sized,
{
    /// Create an executor using the retry policy from `options`
    #[must_use]
    pub fn new(platform: &'a P, options: &PurgeOptions) -> Self {
        Self {
            platform,
            margin: options.rate_limit_margin,
            retries: options.rate_limit_retries,
        }
    }

    /// Delete `id`, waiting out throttling at most `rate_limit_retries` times.
    ///
    /// Every re-issue happens no earlier than the platform-requested wait
    /// plus the configured margin.
    pub async fn delete(&self, chat: ChatId, id: MessageId) -> DeleteOutcome {
        let mut retries_left = self.retries;

        loop {
            let outcome = DeleteOutcome::from(self.platform.delete_message(chat, id).await);

            match outcome {
                DeleteOutcome::RateLimited(wait) if retries_left > 0 => {
                    retries_left -= 1;
                    let backoff = wait + self.margin;
                    warn!(
                        chat = %chat,
                        message_id = %id,
                        wait_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                        "Delete throttled, backing off before retry"
                    );
                    tokio::time::sleep(backoff).await;
                }
                DeleteOutcome::RateLimited(wait) => {
                    warn!(chat = %chat, message_id = %id, ?wait, "Delete still throttled, giving up on id");
                    return outcome;
                }
                DeleteOutcome::TransportError(ref reason) => {
                    warn!(chat = %chat, message_id = %id, error = %reason, "Delete failed");
                    return outcome;
                }
                _ => {
                    debug!(chat = %chat, message_id = %id, ?outcome, "Delete attempted");
                    return outcome;
                }
            }
        }
    }
}
