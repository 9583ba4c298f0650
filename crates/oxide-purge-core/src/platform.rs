//! Messaging platform contract
//!
//! The engine only talks to the remote chat service through [`ChatPlatform`].
//! Transports (Telegram today) translate their native errors into the tagged
//! [`PlatformError`] so that nothing downstream inspects error text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Chat identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChatId(pub i64);

/// User identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

/// Message identifier, unique within one chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub i32);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors reported by a platform call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The target message (or chat member) does not exist or was already removed
    #[error("not found")]
    NotFound,
    /// The platform refuses the operation for this specific target
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// The call was throttled; retry no earlier than the given duration
    #[error("rate limited (retry after {0:?})")]
    RateLimited(Duration),
    /// Network, authentication or any other unexpected failure
    #[error("transport error: {0}")]
    Transport(String),
}

/// Rank of a chat member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberRank {
    /// Chat creator
    Owner,
    /// Promoted administrator
    Administrator,
    /// Regular member
    Member,
    /// Member with restrictions
    Restricted,
    /// User who left the chat
    Left,
    /// User banned from the chat
    Banned,
}

impl MemberRank {
    /// Owners and administrators hold elevated rank
    #[must_use]
    pub const fn is_privileged(self) -> bool {
        matches!(self, Self::Owner | Self::Administrator)
    }
}

/// Membership snapshot returned by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMemberInfo {
    /// Member user id
    pub user: UserId,
    /// Member rank
    pub rank: MemberRank,
    /// Whether the member may delete other users' messages
    pub can_delete_messages: bool,
}

/// Who a message is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageAuthor {
    /// Sent by a user account
    User(UserId),
    /// Sent on behalf of a chat (anonymous administrator or linked channel)
    Chat(ChatId),
    /// The author could not be resolved
    Unknown,
}

/// Minimal message view needed for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Message id
    pub id: MessageId,
    /// Message author
    pub author: MessageAuthor,
}

/// Interface for messaging platforms
///
/// Message texts passed to [`ChatPlatform::send_message`] and
/// [`ChatPlatform::edit_message_text`] are Telegram-style HTML.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// User id of the account the engine acts as
    async fn bot_user_id(&self) -> Result<UserId, PlatformError>;
    /// Membership of `user` in `chat`
    async fn get_chat_member(
        &self,
        chat: ChatId,
        user: UserId,
    ) -> Result<ChatMemberInfo, PlatformError>;
    /// All administrators (including the owner) of `chat`
    async fn get_chat_administrators(
        &self,
        chat: ChatId,
    ) -> Result<Vec<ChatMemberInfo>, PlatformError>;
    /// Look up a message; `PlatformError::NotFound` when it no longer exists
    async fn get_message(&self, chat: ChatId, id: MessageId)
        -> Result<MessageRecord, PlatformError>;
    /// Delete a single message
    async fn delete_message(&self, chat: ChatId, id: MessageId) -> Result<(), PlatformError>;
    /// Send a new message and return its id
    async fn send_message(&self, chat: ChatId, text: &str) -> Result<MessageId, PlatformError>;
    /// Replace the text of an existing message
    async fn edit_message_text(
        &self,
        chat: ChatId,
        id: MessageId,
        text: &str,
    ) -> Result<(), PlatformError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privileged_ranks() {
        assert!(MemberRank::Owner.is_privileged());
        assert!(MemberRank::Administrator.is_privileged());
        assert!(!MemberRank::Member.is_privileged());
        assert!(!MemberRank::Restricted.is_privileged());
        assert!(!MemberRank::Left.is_privileged());
        assert!(!MemberRank::Banned.is_privileged());
    }

    #[test]
    fn rate_limit_error_mentions_wait() {
        let err = PlatformError::RateLimited(Duration::from_secs(3));
        assert!(err.to_string().contains("3s"));
    }
}
