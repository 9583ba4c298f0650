//! Denial throttling for unauthorized purge attempts
//!
//! Group members who are not administrators sometimes spam `/deleteall`.
//! Each (chat, user) pair gets at most one "not allowed" reply per cooldown;
//! further attempts are dropped silently and only counted.

use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Remembers when each (chat, user) pair was last told "not allowed"
#[derive(Clone)]
pub struct UnauthorizedCache {
    /// (chat_id, user_id) -> time of the last denial reply
    cache: Cache<(i64, i64), Instant>,
    cooldown: Duration,
    silenced_count: Arc<AtomicU64>,
}

impl UnauthorizedCache {
    /// Creates a new `UnauthorizedCache`
    ///
    /// * `cooldown_secs` - Seconds between denial replies to the same user in one chat
    /// * `ttl_secs` - Time-to-live for cache entries (auto-cleanup)
    /// * `max_capacity` - Maximum number of entries in cache
    ///
    /// # Examples
    ///
    /// ```
    /// use oxide_purge_transport_telegram::bot::UnauthorizedCache;
    ///
    /// let cache = UnauthorizedCache::new(1200, 7200, 10_000);
    /// assert_eq!(cache.cooldown().as_secs(), 1200);
    /// ```
    #[must_use]
    pub fn new(cooldown_secs: u64, ttl_secs: u64, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(ttl_secs.max(cooldown_secs)))
            .build();

        Self {
            cache,
            cooldown: Duration::from_secs(cooldown_secs),
            silenced_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Whether a denial reply may be sent to `user_id` in `chat_id` now
    ///
    /// Silenced attempts are counted; every 100th is logged.
    pub async fn should_send(&self, chat_id: i64, user_id: i64, user_name: &str) -> bool {
        let Some(last) = self.cache.get(&(chat_id, user_id)).await else {
            return true;
        };
        if last.elapsed() >= self.cooldown {
            return true;
        }

        let count = self.silenced_count.fetch_add(1, Ordering::Relaxed) + 1;
        if count.is_multiple_of(100) {
            debug!(
                chat_id,
                user_id,
                user_name,
                silenced = count,
                "Silenced unauthorized purge attempts"
            );
        }
        false
    }

    /// Start the cooldown for `user_id` in `chat_id`
    pub async fn mark_sent(&self, chat_id: i64, user_id: i64) {
        self.cache.insert((chat_id, user_id), Instant::now()).await;
    }

    /// Returns the current number of entries in the cache
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Returns the total number of silenced attempts
    #[must_use]
    pub fn silenced_count(&self) -> u64 {
        self.silenced_count.load(Ordering::Relaxed)
    }

    /// Returns the configured cooldown duration
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_attempt_should_send() {
        let cache = UnauthorizedCache::new(60, 120, 100);
        assert!(cache.should_send(-100, 12345, "TestUser").await);
    }

    #[tokio::test]
    async fn test_cooldown_blocks_second_attempt() {
        let cache = UnauthorizedCache::new(60, 120, 100);

        assert!(cache.should_send(-100, 12345, "TestUser").await);
        cache.mark_sent(-100, 12345).await;

        assert!(!cache.should_send(-100, 12345, "TestUser").await);
    }

    #[tokio::test]
    async fn test_chats_and_users_are_independent() {
        let cache = UnauthorizedCache::new(60, 120, 100);
        cache.mark_sent(-100, 111).await;

        assert!(cache.should_send(-100, 222, "User2").await);
        assert!(cache.should_send(-200, 111, "User1").await);
    }

    #[tokio::test]
    async fn test_zero_cooldown_never_silences() {
        let cache = UnauthorizedCache::new(0, 120, 100);
        cache.mark_sent(-100, 111).await;

        assert!(cache.should_send(-100, 111, "User1").await);
        assert_eq!(cache.silenced_count(), 0);
    }

    #[tokio::test]
    async fn test_silenced_count_increments() {
        let cache = UnauthorizedCache::new(60, 120, 100);
        cache.mark_sent(-100, 12345).await;

        for _ in 0..5 {
            cache.should_send(-100, 12345, "TestUser").await;
        }

        assert_eq!(cache.silenced_count(), 5);
    }

    #[tokio::test]
    async fn test_entry_count() {
        let cache = UnauthorizedCache::new(60, 120, 100);

        cache.mark_sent(-100, 111).await;
        cache.mark_sent(-100, 222).await;
        cache.cache.run_pending_tasks().await;

        assert_eq!(cache.entry_count(), 2);
    }
}
