//! Job orchestration
//!
//! `Idle → CheckingPermissions → FetchingRoster → Running → Finalizing`, then
//! one of `Done`, `Cancelled` or `Failed`. Failures before `Running` post a
//! single explanatory message and never open a status message.

use super::progress::{publish, render_fatal, PurgeEvent, StatusReport};
use super::roster::{resolve_roster, AdminRoster};
use super::walker::{MessageCursor, WalkEnd, Walker};
use super::{ChatContext, PurgeCounts, PurgeError, PurgeOptions, PurgeOutcome, TerminalState};
use crate::platform::{ChatId, ChatPlatform, MessageId};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Orchestrator states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Created, not started
    Idle,
    /// Verifying the bot's own rights
    CheckingPermissions,
    /// Loading the administrator roster
    FetchingRoster,
    /// Walking the cursor
    Running,
    /// Writing the summary
    Finalizing,
    /// Walk completed
    Done,
    /// Stopped by the caller
    Cancelled,
    /// Stopped on a fatal error
    Failed,
}

impl From<&TerminalState> for JobState {
    fn from(state: &TerminalState) -> Self {
        match state {
            TerminalState::Done => Self::Done,
            TerminalState::Cancelled => Self::Cancelled,
            TerminalState::Failed(_) => Self::Failed,
        }
    }
}

/// One bulk deletion run in one chat
pub struct PurgeJob<'a, P: ?Sized> {
    platform: &'a P,
    chat: ChatId,
    invoking: MessageId,
    options: PurgeOptions,
    cancellation: CancellationToken,
    observer: Option<Sender<PurgeEvent>>,
    job_id: Uuid,
    state: JobState,
    context: Option<ChatContext>,
}

impl<'a, P> PurgeJob<'a, P>
where
    P: ChatPlatform + ?Sized,
{
    /// Prepare a job deleting messages older than `invoking` in `chat`
    #[must_use]
    pub fn new(platform: &'a P, chat: ChatId, invoking: MessageId, options: PurgeOptions) -> Self {
        Self {
            platform,
            chat,
            invoking,
            options,
            cancellation: CancellationToken::new(),
            observer: None,
            job_id: Uuid::new_v4(),
            state: JobState::Idle,
            context: None,
        }
    }

    /// Stop the walk once `token` fires
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Mirror state changes and progress reports to `tx`
    #[must_use]
    pub fn with_progress(mut self, tx: Sender<PurgeEvent>) -> Self {
        self.observer = Some(tx);
        self
    }

    /// Reuse an identifier assigned by the caller (e.g. a job registry)
    #[must_use]
    pub const fn with_job_id(mut self, job_id: Uuid) -> Self {
        self.job_id = job_id;
        self
    }

    /// Job identifier used in logs
    #[must_use]
    pub const fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> JobState {
        self.state
    }

    /// Run the job to a terminal state.
    ///
    /// Never fails: fatal conditions are reported through
    /// [`PurgeOutcome::state`].
    #[instrument(skip(self), fields(job_id = %self.job_id, chat = %self.chat, invoking = %self.invoking))]
    pub async fn run(mut self) -> PurgeOutcome {
        let started_at = Utc::now();
        let (start, floor) = MessageCursor::bounds(self.invoking, self.options.max_count);
        let mut counts = PurgeCounts::default();

        let state = match self.prepare().await {
            Ok(roster) => {
                self.execute(roster.as_ref(), MessageCursor::new(start, floor), &mut counts)
                    .await
            }
            Err(e) => {
                self.announce_failure(&e).await;
                let state = TerminalState::Failed(e);
                self.transition(JobState::from(&state));
                publish(
                    self.observer.as_ref(),
                    PurgeEvent::Finished {
                        counts,
                        state: state.clone(),
                    },
                );
                state
            }
        };

        info!(
            deleted = counts.deleted,
            skipped = counts.skipped,
            errors = counts.errors,
            examined = counts.examined,
            state = ?state,
            "Purge finished"
        );

        PurgeOutcome {
            job_id: self.job_id,
            context: self.context,
            counts,
            state,
            start,
            floor,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Permission check and roster fetch. `None` roster means admins are not spared.
    async fn prepare(&mut self) -> Result<Option<AdminRoster>, PurgeError> {
        self.transition(JobState::CheckingPermissions);
        let context = self.check_permissions().await?;
        debug!(bot = %context.bot, rank = ?context.bot_rank, "Bot rights verified");
        self.context = Some(context);

        if !self.options.skip_admins {
            return Ok(None);
        }
        self.transition(JobState::FetchingRoster);
        resolve_roster(self.platform, self.chat).await.map(Some)
    }

    async fn check_permissions(&self) -> Result<ChatContext, PurgeError> {
        let bot = self
            .platform
            .bot_user_id()
            .await
            .map_err(|e| PurgeError::PermissionDenied(format!("cannot identify bot: {e}")))?;
        let member = self
            .platform
            .get_chat_member(self.chat, bot)
            .await
            .map_err(|e| PurgeError::PermissionDenied(format!("cannot read bot membership: {e}")))?;

        let context = ChatContext::new(self.chat, &member);
        context.ensure_can_purge()?;
        Ok(context)
    }

    async fn execute(
        &mut self,
        roster: Option<&AdminRoster>,
        cursor: MessageCursor,
        counts: &mut PurgeCounts,
    ) -> TerminalState {
        self.transition(JobState::Running);
        info!(
            remaining = cursor.remaining(),
            admins = roster.map_or(0, AdminRoster::len),
            "Purge running"
        );

        let mut report = StatusReport::open(
            self.platform,
            self.chat,
            self.options.batch_size,
            self.options.skip_admins,
            self.observer.clone(),
        )
        .await;

        let walker = Walker::new(
            self.platform,
            self.chat,
            &self.options,
            roster,
            &self.cancellation,
        );
        let state = match walker.walk(cursor, &mut report, counts).await {
            WalkEnd::Exhausted => TerminalState::Done,
            WalkEnd::Cancelled => TerminalState::Cancelled,
            WalkEnd::Aborted(e) => TerminalState::Failed(e),
        };

        self.transition(JobState::Finalizing);
        report.finalize(counts, &state).await;
        self.transition(JobState::from(&state));

        if let Some(grace) = self.options.status_grace.filter(|_| !state.is_failed()) {
            report.discard(grace).await;
        }
        state
    }

    async fn announce_failure(&self, error: &PurgeError) {
        warn!(error = %error, "Purge aborted before running");
        if let Err(e) = self
            .platform
            .send_message(self.chat, &render_fatal(error))
            .await
        {
            warn!(error = %e, "Failed to explain purge failure");
        }
    }

    fn transition(&mut self, next: JobState) {
        info!(from = ?self.state, to = ?next, "Purge state change");
        self.state = next;
        publish(self.observer.as_ref(), PurgeEvent::State(next));
    }
}

/// Run one bulk deletion with default cancellation and no subscriber
pub async fn run_bulk_deletion<P>(
    platform: &P,
    chat: ChatId,
    invoking: MessageId,
    options: &PurgeOptions,
) -> PurgeOutcome
where
    P: ChatPlatform + ?Sized,
{
    PurgeJob::new(platform, chat, invoking, options.clone())
        .run()
        .await
}
