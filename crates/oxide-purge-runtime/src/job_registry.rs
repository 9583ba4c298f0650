//! Job registry
//!
//! Guarantees at most one running purge per chat. A slot is held by a
//! [`JobGuard`] and released when the guard is dropped, whatever way the
//! job ends (including panics inside the spawned task).

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Bookkeeping for a running job
#[derive(Debug, Clone)]
pub struct ActiveJob {
    /// Job identifier, shared with the engine's log spans
    pub job_id: Uuid,
    /// Fired by [`JobRegistry::cancel`]
    pub cancellation: CancellationToken,
    /// When the slot was acquired
    pub started_at: DateTime<Utc>,
}

type Slots<Id> = Arc<Mutex<HashMap<Id, ActiveJob>>>;

/// Registry of running jobs keyed by chat
///
/// Generic over the chat key so transports can use their own identifiers.
pub struct JobRegistry<Id: Hash + Eq + Clone + Send + Debug + 'static> {
    slots: Slots<Id>,
}

impl<Id: Hash + Eq + Clone + Send + Debug + 'static> Clone for JobRegistry<Id> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<Id: Hash + Eq + Clone + Send + Debug + 'static> Default for JobRegistry<Id> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Id: Hash + Eq + Clone + Send + Debug + 'static> JobRegistry<Id> {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Id, ActiveJob>> {
        lock_slots(&self.slots)
    }

    /// Claim the slot for `id`.
    ///
    /// Returns `None` while another job for the same key is running.
    #[must_use]
    pub fn try_acquire(&self, id: Id) -> Option<JobGuard<Id>> {
        let mut slots = self.lock();
        if let Some(active) = slots.get(&id) {
            debug!(chat = ?id, job_id = %active.job_id, "Purge already running");
            return None;
        }

        let job = ActiveJob {
            job_id: Uuid::new_v4(),
            cancellation: CancellationToken::new(),
            started_at: Utc::now(),
        };
        slots.insert(id.clone(), job.clone());
        info!(chat = ?id, job_id = %job.job_id, "Purge slot acquired");

        Some(JobGuard {
            id,
            job,
            slots: Arc::clone(&self.slots),
        })
    }

    /// Request cancellation of the job running for `id`
    ///
    /// Returns `true` if a job was found.
    pub fn cancel(&self, id: &Id) -> bool {
        if let Some(active) = self.lock().get(id) {
            active.cancellation.cancel();
            info!(chat = ?id, job_id = %active.job_id, "Cancellation requested for purge");
            true
        } else {
            warn!(chat = ?id, "No running purge to cancel");
            false
        }
    }

    /// Snapshot of the job running for `id`
    #[must_use]
    pub fn get(&self, id: &Id) -> Option<ActiveJob> {
        self.lock().get(id).cloned()
    }

    /// Check if a job is running for `id`
    #[must_use]
    pub fn is_running(&self, id: &Id) -> bool {
        self.lock().contains_key(id)
    }

    /// Number of running jobs
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if no job is running
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

fn lock_slots<Id>(slots: &Mutex<HashMap<Id, ActiveJob>>) -> MutexGuard<'_, HashMap<Id, ActiveJob>> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Exclusive claim on one chat; releases the slot on drop
#[derive(Debug)]
pub struct JobGuard<Id: Hash + Eq + Clone + Send + Debug + 'static> {
    id: Id,
    job: ActiveJob,
    slots: Slots<Id>,
}

impl<Id: Hash + Eq + Clone + Send + Debug + 'static> JobGuard<Id> {
    /// Key this guard holds
    pub const fn id(&self) -> &Id {
        &self.id
    }

    /// Job identifier assigned at acquisition
    #[must_use]
    pub const fn job_id(&self) -> Uuid {
        self.job.job_id
    }

    /// Token the job must poll
    #[must_use]
    pub fn cancellation(&self) -> CancellationToken {
        self.job.cancellation.clone()
    }
}

impl<Id: Hash + Eq + Clone + Send + Debug + 'static> Drop for JobGuard<Id> {
    fn drop(&mut self) {
        let mut slots = lock_slots(&self.slots);
        // Only remove our own entry
        if slots
            .get(&self.id)
            .is_some_and(|active| active.job_id == self.job.job_id)
        {
            slots.remove(&self.id);
            debug!(chat = ?self.id, job_id = %self.job.job_id, "Purge slot released");
        }
    }
}

/// Registry keyed by Telegram chat id
pub type TelegramJobRegistry = JobRegistry<i64>;
