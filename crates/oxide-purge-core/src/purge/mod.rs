//! Bulk deletion engine
//!
//! Leaves first: [`roster`] resolves administrators, [`classifier`] protects
//! their messages, [`executor`] performs rate-limited deletes, [`walker`]
//! drives the descending cursor, [`progress`] owns the status message and
//! [`job`] sequences everything into one run.

pub mod classifier;
pub mod executor;
pub mod job;
pub mod progress;
pub mod roster;
pub mod walker;

pub use job::{run_bulk_deletion, JobState, PurgeJob};
pub use progress::PurgeEvent;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{
    DEFAULT_BATCH_PAUSE_MS, DEFAULT_BATCH_SIZE, DEFAULT_MAX_CONSECUTIVE_ERRORS,
    DEFAULT_RATE_LIMIT_MARGIN_MS, DEFAULT_RATE_LIMIT_RETRIES, DEFAULT_STATUS_GRACE_SECS,
};
use crate::platform::{ChatId, ChatMemberInfo, MemberRank, MessageId, UserId};

/// The bot's standing in one chat, captured once when the job starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatContext {
    /// Chat being purged
    pub chat: ChatId,
    /// The bot's own user id
    pub bot: UserId,
    /// The bot's rank in `chat`
    pub bot_rank: MemberRank,
    /// Whether the bot may delete other members' messages
    pub can_delete_messages: bool,
}

impl ChatContext {
    /// Snapshot `member`, the bot's membership in `chat`
    #[must_use]
    pub const fn new(chat: ChatId, member: &ChatMemberInfo) -> Self {
        Self {
            chat,
            bot: member.user,
            bot_rank: member.rank,
            can_delete_messages: member.can_delete_messages,
        }
    }

    /// Owners always qualify; administrators need the delete right.
    ///
    /// # Errors
    ///
    /// Returns [`PurgeError::PermissionDenied`] otherwise.
    pub fn ensure_can_purge(&self) -> Result<(), PurgeError> {
        match self.bot_rank {
            MemberRank::Owner => Ok(()),
            MemberRank::Administrator if self.can_delete_messages => Ok(()),
            MemberRank::Administrator => Err(PurgeError::PermissionDenied(
                "bot has no right to delete messages".to_string(),
            )),
            _ => Err(PurgeError::PermissionDenied(
                "bot is not an administrator".to_string(),
            )),
        }
    }
}

/// Fatal job errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurgeError {
    /// The bot lacks administrator rank or delete rights
    #[error("missing admin rights: {0}")]
    PermissionDenied(String),
    /// The administrator list could not be fetched
    #[error("admin list unavailable: {0}")]
    RosterUnavailable(String),
    /// Too many delete attempts failed in a row
    #[error("{consecutive} consecutive delete failures")]
    TooManyErrors {
        /// Length of the failure streak that tripped the threshold
        consecutive: u32,
    },
    /// The job ran past its wall-clock budget
    #[error("time budget exhausted after {elapsed:?}")]
    BudgetExhausted {
        /// Time spent before the walker stopped
        elapsed: Duration,
    },
}

/// How a job ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminalState {
    /// The cursor reached the floor
    Done,
    /// The caller cancelled the job
    Cancelled,
    /// The job stopped on a fatal error
    Failed(PurgeError),
}

impl TerminalState {
    /// Whether the job ended on a fatal error
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Per-job tallies
///
/// Every examined identifier lands in exactly one of `deleted`, `skipped`
/// or `errors`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeCounts {
    /// Identifiers the walker looked at
    pub examined: u64,
    /// Messages removed
    pub deleted: u64,
    /// Protected, already gone or undeletable messages
    pub skipped: u64,
    /// Failed delete attempts
    pub errors: u64,
}

impl PurgeCounts {
    /// Sum of the three outcome counters
    #[must_use]
    pub const fn processed(&self) -> u64 {
        self.deleted + self.skipped + self.errors
    }
}

/// Tunables of one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeOptions {
    /// Identifiers processed between two status updates
    pub batch_size: u64,
    /// Optional cap on identifiers examined
    pub max_count: Option<u64>,
    /// Preserve administrator messages
    pub skip_admins: bool,
    /// Added to every platform-imposed wait
    pub rate_limit_margin: Duration,
    /// Re-issues of a throttled delete
    pub rate_limit_retries: u32,
    /// Consecutive failures that abort the job
    pub max_consecutive_errors: u32,
    /// Pause after each status update
    pub batch_pause: Duration,
    /// Remove the final status message after this delay
    pub status_grace: Option<Duration>,
    /// Wall-clock budget of the whole job
    pub time_budget: Option<Duration>,
}

impl Default for PurgeOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_count: None,
            skip_admins: true,
            rate_limit_margin: Duration::from_millis(DEFAULT_RATE_LIMIT_MARGIN_MS),
            rate_limit_retries: DEFAULT_RATE_LIMIT_RETRIES,
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
            batch_pause: Duration::from_millis(DEFAULT_BATCH_PAUSE_MS),
            status_grace: Some(Duration::from_secs(DEFAULT_STATUS_GRACE_SECS)),
            time_budget: None,
        }
    }
}

/// Result of [`run_bulk_deletion`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeOutcome {
    /// Job identifier used in logs
    pub job_id: Uuid,
    /// Bot rights seen at start; `None` if the check itself failed
    pub context: Option<ChatContext>,
    /// Final tallies
    pub counts: PurgeCounts,
    /// How the job ended
    pub state: TerminalState,
    /// First identifier of the scan
    pub start: MessageId,
    /// Exclusive lower bound of the scan
    pub floor: MessageId,
    /// Job start time
    pub started_at: DateTime<Utc>,
    /// Job end time
    pub finished_at: DateTime<Utc>,
}
