//! Admin roster resolution
//!
//! The roster is fetched once per job and frozen before the first delete
//! decision. Promotions or demotions during the run are not observed.

use super::PurgeError;
use crate::platform::{ChatId, ChatPlatform, UserId};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Administrator user ids of one chat at job start
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminRoster {
    admins: HashSet<UserId>,
}

impl AdminRoster {
    /// Build a roster from known administrator ids
    #[must_use]
    pub fn from_ids(ids: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            admins: ids.into_iter().collect(),
        }
    }

    /// Whether `user` held administrator rank when the roster was fetched
    #[must_use]
    pub fn contains(&self, user: UserId) -> bool {
        self.admins.contains(&user)
    }

    /// Number of administrators
    #[must_use]
    pub fn len(&self) -> usize {
        self.admins.len()
    }

    /// True for an empty roster
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.admins.is_empty()
    }
}

/// Fetch the administrator list of `chat` exactly once.
///
/// # Errors
///
/// Returns `PurgeError::RosterUnavailable` if the platform call fails or no
/// privileged member is listed.
pub async fn resolve_roster<P>(platform: &P, chat: ChatId) -> Result<AdminRoster, PurgeError>
where
    P: ChatPlatform + ?Sized,
{
    let members = platform.get_chat_administrators(chat).await.map_err(|e| {
        warn!(chat = %chat, error = %e, "Failed to fetch chat administrators");
        PurgeError::RosterUnavailable(e.to_string())
    })?;

    let roster = AdminRoster::from_ids(
        members
            .into_iter()
            .filter(|m| m.rank.is_privileged())
            .map(|m| m.user),
    );

    if roster.is_empty() {
        warn!(chat = %chat, "Administrator list came back empty");
        return Err(PurgeError::RosterUnavailable(
            "administrator list is empty".to_string(),
        ));
    }

    debug!(chat = %chat, admins = roster.len(), "Admin roster frozen");
    Ok(roster)
}
