//! Descending cursor walk over message identifiers
//!
//! The walker examines every identifier between `start` and the exclusive
//! `floor` exactly once, newest first, and charges each one to a single
//! counter in [`PurgeCounts`].

use super::classifier::is_protected;
use super::executor::{DeleteExecutor, DeleteOutcome, Tally};
use super::progress::StatusReport;
use super::roster::AdminRoster;
use super::{PurgeCounts, PurgeError, PurgeOptions};
use crate::platform::{ChatId, ChatPlatform, MessageId, MessageRecord, PlatformError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Strictly decreasing iterator over message identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageCursor {
    next: i64,
    floor: i64,
}

impl MessageCursor {
    /// Cursor yielding `start, start - 1, ..., floor + 1`
    #[must_use]
    pub fn new(start: MessageId, floor: MessageId) -> Self {
        Self {
            next: i64::from(start.0),
            floor: i64::from(floor.0),
        }
    }

    /// Scan bounds for a job invoked from `invoking`.
    ///
    /// The scan starts right below the invoking message. The floor is
    /// exclusive: `1` without a cap, otherwise `start - max_count` but never
    /// below `1`.
    #[must_use]
    pub fn bounds(invoking: MessageId, max_count: Option<u64>) -> (MessageId, MessageId) {
        let start = (i64::from(invoking.0) - 1).max(0);
        let floor = match max_count {
            Some(cap) => start
                .saturating_sub(i64::try_from(cap).unwrap_or(i64::MAX))
                .max(1),
            None => 1,
        };
        (to_message_id(start), to_message_id(floor))
    }

    /// Identifiers not yet yielded
    #[must_use]
    pub fn remaining(&self) -> u64 {
        u64::try_from(self.next - self.floor).unwrap_or(0)
    }
}

fn to_message_id(value: i64) -> MessageId {
    MessageId(i32::try_from(value).unwrap_or(i32::MAX))
}

impl Iterator for MessageCursor {
    type Item = MessageId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next <= self.floor {
            return None;
        }
        let id = to_message_id(self.next);
        self.next -= 1;
        Some(id)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.remaining()).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

/// Why the walk stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkEnd {
    /// The cursor passed the floor
    Exhausted,
    /// The cancellation token fired
    Cancelled,
    /// Consecutive-error threshold or time budget tripped
    Aborted(PurgeError),
}

/// Drives the cursor, classifying and deleting one identifier at a time
pub struct Walker<'a, P: ?Sized> {
    platform: &'a P,
    chat: ChatId,
    options: &'a PurgeOptions,
    roster: Option<&'a AdminRoster>,
    executor: DeleteExecutor<'a, P>,
    cancellation: &'a CancellationToken,
}

impl<'a, P> Walker<'a, P>
where
    P: ChatPlatform + ?Sized,
{
    /// Create a walker; pass `roster: None` to delete administrator messages too
    #[must_use]
    pub fn new(
        platform: &'a P,
        chat: ChatId,
        options: &'a PurgeOptions,
        roster: Option<&'a AdminRoster>,
        cancellation: &'a CancellationToken,
    ) -> Self {
        Self {
            platform,
            chat,
            options,
            roster,
            executor: DeleteExecutor::new(platform, options),
            cancellation,
        }
    }

    /// Walk `cursor` to completion or until an abort condition trips.
    pub async fn walk(
        &self,
        cursor: MessageCursor,
        report: &mut StatusReport<'_, P>,
        counts: &mut PurgeCounts,
    ) -> WalkEnd {
        let started = Instant::now();
        let mut consecutive_errors: u32 = 0;

        for id in cursor {
            if self.cancellation.is_cancelled() {
                info!(chat = %self.chat, message_id = %id, "Purge cancelled");
                return WalkEnd::Cancelled;
            }
            if let Some(budget) = self.options.time_budget {
                let elapsed = started.elapsed();
                if elapsed >= budget {
                    warn!(chat = %self.chat, ?elapsed, "Purge time budget exhausted");
                    return WalkEnd::Aborted(PurgeError::BudgetExhausted { elapsed });
                }
            }
            if report.message_id() == Some(id) {
                continue;
            }

            counts.examined += 1;
            match self.process(id).await {
                Tally::Deleted => {
                    counts.deleted += 1;
                    consecutive_errors = 0;
                }
                Tally::Skipped => {
                    counts.skipped += 1;
                    consecutive_errors = 0;
                }
                Tally::Errored => {
                    counts.errors += 1;
                    consecutive_errors += 1;
                    let limit = self.options.max_consecutive_errors;
                    if limit > 0 && consecutive_errors >= limit {
                        warn!(
                            chat = %self.chat,
                            consecutive = consecutive_errors,
                            "Too many consecutive delete failures"
                        );
                        return WalkEnd::Aborted(PurgeError::TooManyErrors {
                            consecutive: consecutive_errors,
                        });
                    }
                }
            }

            if report.tick(counts).await && !self.options.batch_pause.is_zero() {
                tokio::time::sleep(self.options.batch_pause).await;
            }
        }

        WalkEnd::Exhausted
    }

    async fn process(&self, id: MessageId) -> Tally {
        match self.lookup(id).await {
            Err(PlatformError::NotFound) => {
                debug!(chat = %self.chat, message_id = %id, "Message already gone");
                DeleteOutcome::AlreadyGone.tally()
            }
            Err(PlatformError::RateLimited(wait)) => {
                warn!(
                    chat = %self.chat,
                    message_id = %id,
                    ?wait,
                    "Lookup still throttled, leaving id untouched"
                );
                Tally::Errored
            }
            Ok(record) => {
                if self.roster.is_some_and(|roster| is_protected(&record, roster)) {
                    debug!(chat = %self.chat, message_id = %id, "Keeping admin message");
                    return Tally::Skipped;
                }
                self.executor.delete(self.chat, id).await.tally()
            }
            Err(e) => {
                debug!(chat = %self.chat, message_id = %id, error = %e, "Author unresolved");
                self.executor.delete(self.chat, id).await.tally()
            }
        }
    }

    /// Fetch the author of `id`, backing off like the executor when throttled.
    async fn lookup(&self, id: MessageId) -> Result<MessageRecord, PlatformError> {
        let mut retries_left = self.options.rate_limit_retries;

        loop {
            match self.platform.get_message(self.chat, id).await {
                Err(PlatformError::RateLimited(wait)) if retries_left > 0 => {
                    retries_left -= 1;
                    let backoff = wait + self.options.rate_limit_margin;
                    warn!(
                        chat = %self.chat,
                        message_id = %id,
                        wait_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                        "Lookup throttled, backing off before retry"
                    );
                    tokio::time::sleep(backoff).await;
                }
                other => return other,
            }
        }
    }
}
