//! Author lookup for observed messages
//!
//! The Bot API cannot fetch an arbitrary message by id, so the purge engine
//! resolves authors from this log instead. Every message the bot sees is
//! recorded; deleted messages leave a tombstone so later lookups report
//! them as gone.

use moka::future::Cache;
use oxide_purge_core::platform::{MessageAuthor, MessageRecord};
use oxide_purge_core::{ChatId, MessageId, PlatformError, UserId};
use std::time::Duration;
use teloxide::types::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    Seen(MessageAuthor),
    Deleted,
}

/// Bounded, expiring map of `(chat, message)` to author
#[derive(Clone)]
pub struct MessageLog {
    cache: Cache<(i64, i32), Entry>,
}

impl MessageLog {
    /// Create a log keeping entries for `ttl_secs`, at most `max_capacity` of them
    #[must_use]
    pub fn new(ttl_secs: u64, max_capacity: u64) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(Duration::from_secs(ttl_secs))
                .build(),
        }
    }

    /// Record an incoming or edited message
    pub async fn record(&self, msg: &Message) {
        self.record_parts(ChatId(msg.chat.id.0), MessageId(msg.id.0), author_of(msg))
            .await;
    }

    /// Record a message from its parts
    pub async fn record_parts(&self, chat: ChatId, id: MessageId, author: MessageAuthor) {
        let key = (chat.0, id.0);
        // A late edit must not resurrect a deleted message
        if self.cache.get(&key).await == Some(Entry::Deleted) {
            return;
        }
        self.cache.insert(key, Entry::Seen(author)).await;
    }

    /// Mark a message as deleted
    pub async fn tombstone(&self, chat: ChatId, id: MessageId) {
        self.cache.insert((chat.0, id.0), Entry::Deleted).await;
    }

    /// Resolve a message. Unseen messages have an `Unknown` author.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::NotFound` for tombstoned messages.
    pub async fn lookup(&self, chat: ChatId, id: MessageId) -> Result<MessageRecord, PlatformError> {
        match self.cache.get(&(chat.0, id.0)).await {
            Some(Entry::Deleted) => Err(PlatformError::NotFound),
            Some(Entry::Seen(author)) => Ok(MessageRecord { id, author }),
            None => Ok(MessageRecord {
                id,
                author: MessageAuthor::Unknown,
            }),
        }
    }

    /// Approximate number of remembered messages
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

/// Attribution of a Telegram message.
///
/// `sender_chat` wins over `from`: anonymous administrators and channel
/// posts carry a placeholder user in `from`.
#[must_use]
pub fn author_of(msg: &Message) -> MessageAuthor {
    if let Some(chat) = &msg.sender_chat {
        return MessageAuthor::Chat(ChatId(chat.id.0));
    }
    msg.from
        .as_ref()
        .map_or(MessageAuthor::Unknown, |user| {
            MessageAuthor::User(UserId(user.id.0))
        })
}
