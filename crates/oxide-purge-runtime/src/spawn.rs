use oxide_purge_core::purge::PurgeEvent;
use oxide_purge_core::{ChatId, ChatPlatform, MessageId, PurgeJob, PurgeOptions, PurgeOutcome};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tracing::info;

use crate::job_registry::JobGuard;

/// What to purge
#[derive(Debug, Clone)]
pub struct PurgeRequest {
    /// Target chat
    pub chat: ChatId,
    /// The command message; everything older is scanned
    pub invoking: MessageId,
    /// Job tunables
    pub options: PurgeOptions,
}

/// Spawn a purge job on the Tokio runtime.
///
/// The job inherits the guard's identifier and cancellation token, and the
/// guard is held until the job (including the status grace delay) finishes.
pub fn spawn_purge<P, Id>(
    guard: JobGuard<Id>,
    platform: Arc<P>,
    request: PurgeRequest,
    progress: Option<Sender<PurgeEvent>>,
) -> JoinHandle<PurgeOutcome>
where
    P: ChatPlatform + ?Sized + 'static,
    Id: Hash + Eq + Clone + Send + Sync + Debug + 'static,
{
    tokio::spawn(async move {
        let mut job = PurgeJob::new(
            platform.as_ref(),
            request.chat,
            request.invoking,
            request.options,
        )
        .with_job_id(guard.job_id())
        .with_cancellation(guard.cancellation());
        if let Some(tx) = progress {
            job = job.with_progress(tx);
        }

        let outcome = job.run().await;
        info!(
            chat = %request.chat,
            job_id = %outcome.job_id,
            deleted = outcome.counts.deleted,
            "Purge task completed"
        );
        drop(guard);
        outcome
    })
}
