//! Scripted in-memory chat used by the engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use oxide_purge_core::platform::{ChatMemberInfo, MemberRank, MessageAuthor, MessageRecord};
use oxide_purge_core::purge::PurgeOptions;
use oxide_purge_core::{ChatId, ChatPlatform, MessageId, PlatformError, UserId};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const CHAT: ChatId = ChatId(-100_123);
pub const BOT: UserId = UserId(42);
pub const ADMIN: UserId = UserId(1);
pub const MEMBER: UserId = UserId(2);

/// Everything the engine asked the platform to do, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetMessage(MessageId),
    Delete(MessageId, Instant),
    Send(MessageId, String),
    Edit(MessageId, String),
}

pub struct ScriptedPlatform {
    bot_rank: MemberRank,
    bot_can_delete: bool,
    admins: Result<Vec<UserId>, PlatformError>,
    messages: Mutex<HashMap<i32, MessageAuthor>>,
    fetch_errors: HashMap<i32, PlatformError>,
    fetch_failures: Mutex<HashMap<i32, VecDeque<PlatformError>>>,
    delete_failures: Mutex<HashMap<i32, VecDeque<PlatformError>>>,
    status_id: MessageId,
    cancel_after_deletes: Option<(usize, CancellationToken)>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedPlatform {
    /// Chat where the bot is an administrator with delete rights
    pub fn new() -> Self {
        Self {
            bot_rank: MemberRank::Administrator,
            bot_can_delete: true,
            admins: Ok(vec![ADMIN, BOT]),
            messages: Mutex::new(HashMap::new()),
            fetch_errors: HashMap::new(),
            fetch_failures: Mutex::new(HashMap::new()),
            delete_failures: Mutex::new(HashMap::new()),
            status_id: MessageId(10_000),
            cancel_after_deletes: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn bot_rank(mut self, rank: MemberRank, can_delete: bool) -> Self {
        self.bot_rank = rank;
        self.bot_can_delete = can_delete;
        self
    }

    pub fn admins_unavailable(mut self) -> Self {
        self.admins = Err(PlatformError::Transport("admins timed out".to_string()));
        self
    }

    pub fn messages(self, ids: impl IntoIterator<Item = i32>, author: UserId) -> Self {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(ids.into_iter().map(|id| (id, MessageAuthor::User(author))));
        self
    }

    pub fn channel_post(self, id: i32) -> Self {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, MessageAuthor::Chat(CHAT));
        self
    }

    pub fn fetch_error(mut self, id: i32, error: PlatformError) -> Self {
        self.fetch_errors.insert(id, error);
        self
    }

    /// Make the next `errors.len()` lookups of `id` fail, in order
    pub fn fetch_failures(self, id: i32, errors: impl IntoIterator<Item = PlatformError>) -> Self {
        self.fetch_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, errors.into_iter().collect());
        self
    }

    /// Make the next `errors.len()` deletes of `id` fail, in order
    pub fn delete_failures(self, id: i32, errors: impl IntoIterator<Item = PlatformError>) -> Self {
        self.delete_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, errors.into_iter().collect());
        self
    }

    pub fn status_id(mut self, id: i32) -> Self {
        self.status_id = MessageId(id);
        self
    }

    pub fn cancel_after_deletes(mut self, deletes: usize, token: CancellationToken) -> Self {
        self.cancel_after_deletes = Some((deletes, token));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn delete_attempts(&self) -> Vec<(MessageId, Instant)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Delete(id, at) => Some((id, at)),
                _ => None,
            })
            .collect()
    }

    pub fn fetched(&self, id: i32) -> bool {
        self.calls().contains(&Call::GetMessage(MessageId(id)))
    }

    pub fn lookups(&self, id: i32) -> usize {
        self.calls()
            .iter()
            .filter(|call| **call == Call::GetMessage(MessageId(id)))
            .count()
    }

    pub fn remaining(&self) -> usize {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(call);
    }
}

#[async_trait]
impl ChatPlatform for ScriptedPlatform {
    async fn bot_user_id(&self) -> Result<UserId, PlatformError> {
        Ok(BOT)
    }

    async fn get_chat_member(
        &self,
        _chat: ChatId,
        user: UserId,
    ) -> Result<ChatMemberInfo, PlatformError> {
        Ok(ChatMemberInfo {
            user,
            rank: self.bot_rank,
            can_delete_messages: self.bot_can_delete,
        })
    }

    async fn get_chat_administrators(
        &self,
        _chat: ChatId,
    ) -> Result<Vec<ChatMemberInfo>, PlatformError> {
        let admins = self.admins.clone()?;
        Ok(admins
            .into_iter()
            .map(|user| ChatMemberInfo {
                user,
                rank: MemberRank::Administrator,
                can_delete_messages: true,
            })
            .collect())
    }

    async fn get_message(
        &self,
        _chat: ChatId,
        id: MessageId,
    ) -> Result<MessageRecord, PlatformError> {
        self.record(Call::GetMessage(id));
        let scripted = self
            .fetch_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&id.0)
            .and_then(VecDeque::pop_front);
        if let Some(error) = scripted {
            return Err(error);
        }
        if let Some(error) = self.fetch_errors.get(&id.0) {
            return Err(error.clone());
        }
        let author = *self
            .messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id.0)
            .ok_or(PlatformError::NotFound)?;
        Ok(MessageRecord { id, author })
    }

    async fn delete_message(&self, _chat: ChatId, id: MessageId) -> Result<(), PlatformError> {
        self.record(Call::Delete(id, Instant::now()));

        let scripted = self
            .delete_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&id.0)
            .and_then(VecDeque::pop_front);
        if let Some(error) = scripted {
            return Err(error);
        }

        let removed = id == self.status_id
            || self
                .messages
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&id.0)
                .is_some();
        if let Some((after, token)) = &self.cancel_after_deletes {
            if self.delete_attempts().len() >= *after {
                token.cancel();
            }
        }
        if removed {
            Ok(())
        } else {
            Err(PlatformError::NotFound)
        }
    }

    async fn send_message(&self, _chat: ChatId, text: &str) -> Result<MessageId, PlatformError> {
        self.record(Call::Send(self.status_id, text.to_string()));
        Ok(self.status_id)
    }

    async fn edit_message_text(
        &self,
        _chat: ChatId,
        id: MessageId,
        text: &str,
    ) -> Result<(), PlatformError> {
        self.record(Call::Edit(id, text.to_string()));
        Ok(())
    }
}

/// Options with no pauses, no grace delay and the given batch size
pub fn options(batch_size: u64) -> PurgeOptions {
    PurgeOptions {
        batch_size,
        batch_pause: Duration::ZERO,
        status_grace: None,
        ..PurgeOptions::default()
    }
}
