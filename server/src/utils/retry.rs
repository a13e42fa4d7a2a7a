//! Async retry utilities with exponential backoff

use std::time::Duration;

/// Default maximum attempts for the realtime subscribe handshake
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay in milliseconds for exponential backoff
pub const DEFAULT_BASE_DELAY_MS: u64 = 100;

/// Retry an async operation with exponential backoff.
///
/// Only errors for which `should_retry` returns true are retried; anything
/// else is returned immediately. Returns the operation's value on success,
/// or `Err((error, attempts))` after the final attempt fails.
pub async fn retry_with_backoff_async<F, Fut, T, E>(
    max_attempts: u32,
    base_delay_ms: u64,
    mut operation: F,
    should_retry: impl Fn(&E) -> bool,
) -> Result<T, (E, u32)>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempts >= max_attempts || !should_retry(&e) {
                    return Err((e, attempts));
                }
                let delay = Duration::from_millis(base_delay_ms * 2_u64.pow(attempts - 1));
                tracing::warn!(
                    error = %e,
                    attempt = attempts,
                    delay_ms = delay.as_millis(),
                    "Retrying after transient error"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
