//! Small helpers shared by the engine and transports.

use anyhow::Result;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;

/// Safely truncates a string to a maximum character length (not bytes).
///
/// This is UTF-8 safe and will not panic on multi-byte characters.
///
/// # Examples
///
/// ```
/// use oxide_purge_core::utils::truncate_str;
/// let s = "Привет, мир!";
/// assert_eq!(truncate_str(s, 6), "Привет");
/// ```
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

/// Retry a transport API operation with exponential backoff.
///
/// Meant for status message sends and edits, which may fail on transient
/// network errors. Delete calls are never routed through here: the delete
/// executor owns their retry policy.
///
/// - Initial delay: 500ms
/// - Max delay: 4s
/// - Max attempts: 3
///
/// # Examples
///
/// ```no_run
/// use oxide_purge_core::utils::retry_transport_operation;
/// use anyhow::Result;
///
/// async fn send() -> Result<i32> {
///     Ok(1)
/// }
///
/// # async fn example() -> Result<()> {
/// let id = retry_transport_operation(|| async { send().await }).await?;
/// # Ok(())
/// # }
/// ```
pub async fn retry_transport_operation<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    use crate::config::{
        TRANSPORT_API_INITIAL_BACKOFF_MS, TRANSPORT_API_MAX_BACKOFF_MS, TRANSPORT_API_MAX_RETRIES,
    };

    let retry_strategy = ExponentialBackoff::from_millis(TRANSPORT_API_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TRANSPORT_API_MAX_BACKOFF_MS))
        .map(jitter)
        .take(TRANSPORT_API_MAX_RETRIES);

    Retry::spawn(retry_strategy, operation).await.map_err(|e| {
        warn!(
            "Transport API operation failed after {} attempts: {}",
            TRANSPORT_API_MAX_RETRIES, e
        );
        e
    })
}

/// Formats a duration as `1h 02m 03s` / `2m 05s` / `7s` for status texts.
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m {seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}
