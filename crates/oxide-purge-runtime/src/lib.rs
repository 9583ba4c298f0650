#![deny(missing_docs)]
//! Oxide Purge runtime helpers.
//!
//! Transport-agnostic job bookkeeping: one active purge per chat, spawned on
//! the Tokio runtime and cancellable from another command.

/// Per-chat job registry.
pub mod job_registry;
/// Spawning purge jobs under a registry slot.
pub mod spawn;

pub use job_registry::{ActiveJob, JobGuard, JobRegistry, TelegramJobRegistry};
pub use spawn::{spawn_purge, PurgeRequest};
