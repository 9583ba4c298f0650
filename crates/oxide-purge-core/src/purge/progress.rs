//! Status message and progress subscription
//!
//! One status message per job: opened when the walk starts, edited every
//! `batch_size` examined identifiers, finalized with a summary and
//! optionally removed after a grace delay. Edit failures never affect the
//! job. The same updates are mirrored to an optional subscriber channel.

use super::job::JobState;
use super::{PurgeCounts, PurgeError, TerminalState};
use crate::platform::{ChatId, ChatPlatform, MessageId};
use crate::utils::format_elapsed;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Progress notifications for subscribers rendering their own UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurgeEvent {
    /// The job entered a new state
    State(JobState),
    /// Periodic update, same cadence as the status message edits
    Progress(PurgeCounts),
    /// The job reached a terminal state
    Finished {
        /// Final tallies
        counts: PurgeCounts,
        /// How the job ended
        state: TerminalState,
    },
}

/// Publish `event` to the subscriber, if any.
///
/// Never waits: a full channel drops the event and a closed one is ignored,
/// so a stalled subscriber cannot hold the job back.
pub(crate) fn publish(observer: Option<&Sender<PurgeEvent>>, event: PurgeEvent) {
    let Some(tx) = observer else {
        return;
    };
    match tx.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(event)) => {
            debug!(?event, "Progress subscriber lagging, event dropped");
        }
        Err(TrySendError::Closed(_)) => debug!("Progress subscriber dropped"),
    }
}

/// Handle to the job's status message
pub struct StatusReport<'a, P: ?Sized> {
    platform: &'a P,
    chat: ChatId,
    message_id: Option<MessageId>,
    last_text: String,
    batch_size: u64,
    observer: Option<Sender<PurgeEvent>>,
    started: Instant,
}

impl<'a, P> StatusReport<'a, P>
where
    P: ChatPlatform + ?Sized,
{
    /// Send the initial status message.
    ///
    /// If sending fails the job keeps running without a visible status;
    /// subscribers still receive every update.
    pub async fn open(
        platform: &'a P,
        chat: ChatId,
        batch_size: u64,
        skip_admins: bool,
        observer: Option<Sender<PurgeEvent>>,
    ) -> Self {
        let text = render_start(skip_admins);
        let message_id = match platform.send_message(chat, &text).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(chat = %chat, error = %e, "Failed to send status message");
                None
            }
        };

        Self {
            platform,
            chat,
            message_id,
            last_text: text,
            batch_size: batch_size.max(1),
            observer,
            started: Instant::now(),
        }
    }

    /// Id of the status message, if it was sent
    #[must_use]
    pub const fn message_id(&self) -> Option<MessageId> {
        self.message_id
    }

    /// Report if `counts` just completed a batch. Returns `true` when a report was made.
    pub async fn tick(&mut self, counts: &PurgeCounts) -> bool {
        if counts.examined == 0 || counts.examined % self.batch_size != 0 {
            return false;
        }
        self.report(counts).await;
        true
    }

    /// Edit the status message to show `counts`.
    pub async fn report(&mut self, counts: &PurgeCounts) {
        publish(self.observer.as_ref(), PurgeEvent::Progress(*counts));
        self.edit(render_progress(counts)).await;
    }

    /// Final edit with the completion summary.
    pub async fn finalize(&mut self, counts: &PurgeCounts, state: &TerminalState) {
        let text = render_summary(counts, state, self.started.elapsed());
        self.edit(text).await;
        publish(
            self.observer.as_ref(),
            PurgeEvent::Finished {
                counts: *counts,
                state: state.clone(),
            },
        );
    }

    /// Delete the status message after `grace`.
    pub async fn discard(self, grace: Duration) {
        let Some(id) = self.message_id else {
            return;
        };
        tokio::time::sleep(grace).await;
        if let Err(e) = self.platform.delete_message(self.chat, id).await {
            debug!(chat = %self.chat, error = %e, "Status message cleanup skipped");
        }
    }

    async fn edit(&mut self, text: String) {
        let Some(id) = self.message_id else {
            return;
        };
        if text == self.last_text {
            return;
        }
        match self.platform.edit_message_text(self.chat, id, &text).await {
            Ok(()) => self.last_text = text,
            Err(e) => debug!(chat = %self.chat, error = %e, "Status update skipped"),
        }
    }
}

/// Text of a freshly opened status message
#[must_use]
pub fn render_start(skip_admins: bool) -> String {
    if skip_admins {
        "⚡ <b>Starting deletion</b> (skipping admin messages)...".to_string()
    } else {
        "⚡ <b>Starting deletion</b> (including admin messages)...".to_string()
    }
}

/// Periodic progress line
#[must_use]
pub fn render_progress(counts: &PurgeCounts) -> String {
    format!(
        "⏳ Deleted <b>{}</b> messages, skipped {}, errors {}...",
        counts.deleted, counts.skipped, counts.errors
    )
}

/// Final summary for a job that reached `state`
#[must_use]
pub fn render_summary(counts: &PurgeCounts, state: &TerminalState, elapsed: Duration) -> String {
    let tallies = format!(
        "Deleted <b>{}</b> messages, skipped {}, errors {} ({})",
        counts.deleted,
        counts.skipped,
        counts.errors,
        format_elapsed(elapsed)
    );
    match state {
        TerminalState::Done => format!("✅ <b>Finished!</b> {tallies}"),
        TerminalState::Cancelled => format!("🛑 <b>Cancelled.</b> {tallies}"),
        TerminalState::Failed(e) => format!(
            "❌ <b>Stopped:</b> {}\n{tallies}",
            html_escape::encode_text(&e.to_string())
        ),
    }
}

/// The single explanatory message of a job that failed before running
#[must_use]
pub fn render_fatal(error: &PurgeError) -> String {
    match error {
        PurgeError::PermissionDenied(reason) => format!(
            "❌ I need admin privileges with delete rights to delete messages!\n<i>{}</i>",
            html_escape::encode_text(reason)
        ),
        PurgeError::RosterUnavailable(reason) => format!(
            "⚠️ Could not load the admin list, nothing was deleted.\n<i>{}</i>",
            html_escape::encode_text(reason)
        ),
        other => format!("❌ {}", html_escape::encode_text(&other.to_string())),
    }
}
