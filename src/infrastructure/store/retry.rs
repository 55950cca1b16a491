//! Optimistic-lock retry wrapper.
//!
//! The canonical pattern for every store mutation: run the caller's
//! transaction, and when it loses a version race, back off and rerun it.
//! Exposing it as a higher-order operation means new mutations inherit the
//! behavior without re-implementing it. Only conflicts are retried;
//! everything else propagates immediately.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::domain::models::RetryConfig;
use crate::domain::ForemanResult;

/// Execute `operation` up to `policy.max_attempts` times, retrying only on
/// [`ForemanError::OptimisticLock`](crate::domain::ForemanError) with
/// exponential backoff plus ±10 % jitter.
pub async fn with_optimistic_retry<T, F, Fut>(
    policy: RetryConfig,
    mut operation: F,
) -> ForemanResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ForemanResult<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_conflict() && attempt + 1 < policy.max_attempts => {
                let delay = backoff_with_jitter(policy, attempt);
                tracing::debug!(
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "optimistic lock conflict, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Exponential backoff: base * 2^attempt capped at the policy max, with a
/// uniform ±10 % jitter so concurrent invocations desynchronize.
fn backoff_with_jitter(policy: RetryConfig, attempt: u32) -> Duration {
    let base = policy
        .base_delay_ms
        .saturating_mul(2_u64.saturating_pow(attempt))
        .min(policy.max_delay_ms);
    let jitter_span = base / 10;
    if jitter_span == 0 {
        return Duration::from_millis(base);
    }
    let offset = rand::rng().random_range(0..=jitter_span * 2);
    Duration::from_millis(base - jitter_span + offset)
}
