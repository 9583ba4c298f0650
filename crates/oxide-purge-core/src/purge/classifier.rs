//! Message classification against the frozen admin roster.

use super::roster::AdminRoster;
use crate::platform::{MessageAuthor, MessageRecord};

/// Whether `message` must survive the purge.
///
/// Messages posted on behalf of a chat (anonymous administrators, linked
/// channels) and messages from roster members are protected. Unresolved
/// authors are not: the executor handles whatever the delete call reports.
#[must_use]
pub fn is_protected(message: &MessageRecord, roster: &AdminRoster) -> bool {
    match message.author {
        MessageAuthor::Chat(_) => true,
        MessageAuthor::User(user) => roster.contains(user),
        MessageAuthor::Unknown => false,
    }
}
