//! `ChatPlatform` implementation over the Telegram Bot API

use super::message_log::MessageLog;
use super::resilient::{edit_message_resilient, send_message_resilient, EditStatus};
use async_trait::async_trait;
use oxide_purge_core::platform::{ChatMemberInfo, MemberRank, MessageRecord};
use oxide_purge_core::{ChatId, ChatPlatform, MessageId, PlatformError, UserId};
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{
    ChatId as TgChatId, ChatMember, ChatMemberKind, MessageId as TgMessageId, UserId as TgUserId,
};
use teloxide::{ApiError, RequestError};
use tokio::sync::OnceCell;
use tracing::debug;

/// Telegram-backed platform used by purge jobs
pub struct TelegramPlatform {
    bot: Bot,
    log: Arc<MessageLog>,
    bot_id: OnceCell<UserId>,
}

impl TelegramPlatform {
    /// Wrap `bot`, resolving authors from `log`
    #[must_use]
    pub fn new(bot: Bot, log: Arc<MessageLog>) -> Self {
        Self {
            bot,
            log,
            bot_id: OnceCell::new(),
        }
    }

    /// Author log shared with the update dispatcher
    #[must_use]
    pub const fn message_log(&self) -> &Arc<MessageLog> {
        &self.log
    }
}

/// Translate a Bot API error into the engine's error taxonomy
#[must_use]
pub fn map_request_error(error: &RequestError) -> PlatformError {
    match error {
        RequestError::RetryAfter(wait) => PlatformError::RateLimited(wait.duration()),
        RequestError::Api(
            ApiError::MessageToDeleteNotFound
            | ApiError::MessageToEditNotFound
            | ApiError::MessageIdInvalid,
        ) => PlatformError::NotFound,
        RequestError::Api(ApiError::MessageCantBeDeleted) => {
            PlatformError::Forbidden(error.to_string())
        }
        other => PlatformError::Transport(other.to_string()),
    }
}

/// Rank of a member as seen by the engine
#[must_use]
pub fn rank_of(kind: &ChatMemberKind) -> MemberRank {
    if kind.is_owner() {
        MemberRank::Owner
    } else if kind.is_administrator() {
        MemberRank::Administrator
    } else if kind.is_restricted() {
        MemberRank::Restricted
    } else if kind.is_left() {
        MemberRank::Left
    } else if kind.is_banned() {
        MemberRank::Banned
    } else {
        MemberRank::Member
    }
}

fn member_info(member: &ChatMember) -> ChatMemberInfo {
    ChatMemberInfo {
        user: UserId(member.user.id.0),
        rank: rank_of(&member.kind),
        can_delete_messages: member.kind.can_delete_messages(),
    }
}

#[async_trait]
impl ChatPlatform for TelegramPlatform {
    async fn bot_user_id(&self) -> Result<UserId, PlatformError> {
        self.bot_id
            .get_or_try_init(|| async {
                let me = self
                    .bot
                    .get_me()
                    .await
                    .map_err(|e| map_request_error(&e))?;
                Ok(UserId(me.user.id.0))
            })
            .await
            .copied()
    }

    async fn get_chat_member(
        &self,
        chat: ChatId,
        user: UserId,
    ) -> Result<ChatMemberInfo, PlatformError> {
        self.bot
            .get_chat_member(TgChatId(chat.0), TgUserId(user.0))
            .await
            .map(|member| member_info(&member))
            .map_err(|e| map_request_error(&e))
    }

    async fn get_chat_administrators(
        &self,
        chat: ChatId,
    ) -> Result<Vec<ChatMemberInfo>, PlatformError> {
        let admins = self
            .bot
            .get_chat_administrators(TgChatId(chat.0))
            .await
            .map_err(|e| map_request_error(&e))?;
        Ok(admins.iter().map(member_info).collect())
    }

    async fn get_message(
        &self,
        chat: ChatId,
        id: MessageId,
    ) -> Result<MessageRecord, PlatformError> {
        self.log.lookup(chat, id).await
    }

    async fn delete_message(&self, chat: ChatId, id: MessageId) -> Result<(), PlatformError> {
        let result = self
            .bot
            .delete_message(TgChatId(chat.0), TgMessageId(id.0))
            .await
            .map(|_| ())
            .map_err(|e| map_request_error(&e));

        if matches!(result, Ok(()) | Err(PlatformError::NotFound)) {
            self.log.tombstone(chat, id).await;
        }
        result
    }

    async fn send_message(&self, chat: ChatId, text: &str) -> Result<MessageId, PlatformError> {
        send_message_resilient(&self.bot, TgChatId(chat.0), text)
            .await
            .map(|msg| MessageId(msg.id.0))
            .map_err(|e| PlatformError::Transport(e.to_string()))
    }

    async fn edit_message_text(
        &self,
        chat: ChatId,
        id: MessageId,
        text: &str,
    ) -> Result<(), PlatformError> {
        match edit_message_resilient(&self.bot, TgChatId(chat.0), TgMessageId(id.0), text).await {
            Ok(EditStatus::Edited | EditStatus::Unchanged) => Ok(()),
            Ok(EditStatus::Missing) => {
                debug!(chat = %chat, message_id = %id, "Status message is gone");
                Err(PlatformError::NotFound)
            }
            Err(e) => Err(PlatformError::Transport(e.to_string())),
        }
    }
}
