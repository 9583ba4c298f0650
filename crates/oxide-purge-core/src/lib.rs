#![deny(missing_docs)]
//! Oxide Purge core library.
//!
//! Platform-agnostic bulk deletion engine: admin roster resolution, message
//! classification, rate-limited deletes, the descending cursor walk and
//! progress reporting.

/// Configuration management.
pub mod config;
/// Abstract messaging platform contract consumed by the engine.
pub mod platform;
/// Bulk deletion engine.
pub mod purge;
/// Utility functions.
pub mod utils;

#[cfg(test)]
mod testing;

pub use platform::{ChatId, ChatPlatform, MessageId, PlatformError, UserId};
pub use purge::{
    run_bulk_deletion, ChatContext, PurgeCounts, PurgeError, PurgeEvent, PurgeJob, PurgeOptions,
    PurgeOutcome, TerminalState,
};
