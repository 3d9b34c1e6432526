//! Retry logic with exponential backoff.
//!
//! Provides retry wrappers using the `backon` crate with
//! configurable backoff policies.

use std::{future::Future, time::Duration};

use backon::{ExponentialBuilder, Retryable};
use rand::Rng;

use crate::error::{ClientError, Result};

/// Backoff policy for transient failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempt budget, including the first try.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub multiplier: f64,
    /// Jitter factor in `[0, 1]`, applied as ±factor randomness.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

/// Execute an async operation with retry using exponential backoff.
///
/// The operation is retried according to the provided [`RetryPolicy`] if it
/// fails with a retryable error (as determined by
/// [`ClientError::is_retryable`]). Non-retryable errors are returned
/// immediately; exhausting the budget on a retryable error yields
/// [`ClientError::RetryExhausted`].
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    // backon's max_times is the number of retries, not total attempts.
    let max_retries = policy.max_attempts.saturating_sub(1) as usize;

    let backoff = ExponentialBuilder::new()
        .with_min_delay(policy.initial_backoff)
        .with_max_delay(policy.max_backoff)
        .with_factor(policy.multiplier as f32)
        .with_max_times(max_retries);

    // Track attempt count for error reporting
    let attempt_count = std::sync::atomic::AtomicU32::new(0);
    let jitter_factor = policy.jitter;

    operation
        .retry(backoff)
        // Jitter is applied to the slept duration itself, not just the
        // logged one, so concurrent clients spread their retries out.
        .sleep(move |dur: Duration| tokio::time::sleep(apply_jitter(dur, jitter_factor)))
        .when(|e: &ClientError| e.is_retryable())
        .notify(|err: &ClientError, dur: Duration| {
            let attempt = attempt_count.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
            tracing::debug!(
                attempt = attempt,
                base_backoff_ms = dur.as_millis() as u64,
                error = %err,
                "retrying after backoff"
            );
        })
        .await
        .map_err(|e| {
            if e.is_retryable() {
                let attempts = attempt_count.load(std::sync::atomic::Ordering::SeqCst) + 1;
                ClientError::RetryExhausted { attempts, last_error: e.to_string() }
            } else {
                e
            }
        })
}

/// Apply jitter to a duration.
///
/// Jitter adds randomness in the range `[dur * (1 - factor), dur * (1 + factor)]`
/// to prevent thundering herd when multiple clients retry simultaneously.
fn apply_jitter(dur: Duration, factor: f64) -> Duration {
    if factor <= 0.0 {
        return dur;
    }

    let factor = factor.clamp(0.0, 1.0);
    let mut rng = rand::thread_rng();

    let base_nanos = dur.as_nanos() as f64;
    let min_nanos = base_nanos * (1.0 - factor);
    let max_nanos = base_nanos * (1.0 + factor);

    let jittered_nanos = rng.gen_range(min_nanos..=max_nanos);
    Duration::from_nanos(jittered_nanos as u64)
}
