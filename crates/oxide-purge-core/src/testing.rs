//! Fixtures shared by unit tests.

use crate::platform::{ChatMemberInfo, MemberRank, UserId};
use crate::purge::PurgeOptions;
use std::time::Duration;

/// Membership of the bot account (`UserId(42)`)
pub fn bot_member(rank: MemberRank, can_delete_messages: bool) -> ChatMemberInfo {
    ChatMemberInfo {
        user: UserId(42),
        rank,
        can_delete_messages,
    }
}

/// Options without pauses or grace delays
pub fn quiet_options() -> PurgeOptions {
    PurgeOptions {
        batch_pause: Duration::ZERO,
        status_grace: None,
        ..PurgeOptions::default()
    }
}
