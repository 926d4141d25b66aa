//! Shared retry utilities for tracker and storage operations.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{ConstantBuilder, ExponentialBuilder, Retryable};

/// Maximum backoff delay in milliseconds for transient request failures.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Initial backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1_000;

/// Maximum retries for a single tracker request.
pub const MAX_REQUEST_RETRIES: usize = 3;

/// Exponential backoff for a single tracker request: 1s doubling to 60s,
/// [`MAX_REQUEST_RETRIES`] retries, jittered.
#[must_use]
pub fn request_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(INITIAL_BACKOFF_MS))
        .with_max_delay(Duration::from_millis(MAX_BACKOFF_MS))
        .with_max_times(MAX_REQUEST_RETRIES)
        .with_jitter()
}

/// Fixed-interval backoff used while the quota endpoint itself is failing.
#[must_use]
pub fn quota_backoff(delay: Duration, attempts: usize) -> ConstantBuilder {
    ConstantBuilder::default()
        .with_delay(delay)
        .with_max_times(attempts)
}

/// Run `operation`, retrying errors accepted by `is_retryable` with
/// [`request_backoff`].
///
/// `what` names the operation in log lines.
pub async fn with_retry<T, E, F, Fut, IsRetryable>(
    mut operation: F,
    is_retryable: IsRetryable,
    what: &str,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error,
    IsRetryable: Fn(&E) -> bool,
{
    let attempt = AtomicU32::new(0);

    let retry_op = || {
        attempt.fetch_add(1, Ordering::SeqCst);
        operation()
    };

    retry_op
        .retry(request_backoff())
        .notify(|err, dur| {
            tracing::debug!(
                operation = what,
                attempt = attempt.load(Ordering::SeqCst),
                retry_in_ms = dur.as_millis() as u64,
                error = %err,
                "Transient failure, retrying"
            );
        })
        .when(is_retryable)
        .await
}
