//! Governed requests with exponential backoff

use crate::adapters::georef::ApiResult;
use crate::config::RetryConfig;
use crate::core::rate::RateGovernor;
use crate::domain::Result;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Runs `operation` under a governor permit, retrying retryable failures
///
/// Every attempt acquires its own permit. Transport errors, 429 and 5xx are
/// retried up to `retry.max_retries` times; other failures return at once.
///
/// The outer `Result` only fails on cancellation; the inner one carries the
/// last API error.
pub async fn call_with_retry<T, F, Fut>(
    governor: &RateGovernor,
    retry: &RetryConfig,
    operation: F,
) -> Result<ApiResult<T>>
where
    F: Fn() -> Fut,
    Fut: Future<Output = ApiResult<T>>,
{
    let max_attempts = retry.max_retries + 1;
    let mut attempt = 0;

    loop {
        attempt += 1;
        let result = {
            let _permit = governor.acquire().await?;
            operation().await
        };

        match result {
            Ok(value) => return Ok(Ok(value)),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = backoff_delay(retry, attempt);
                crate::log_retry_attempt!(attempt, max_attempts, e);
                tracing::debug!(delay_ms = delay.as_millis() as u64, "Backing off");
                governor.pause(delay).await?;
            }
            Err(e) => return Ok(Err(e)),
        }
    }
}

/// `initial × multiplier^(attempt-1)`, capped, plus up to 25% jitter
fn backoff_delay(retry: &RetryConfig, attempt: usize) -> Duration {
    let exponent = attempt.saturating_sub(1) as i32;
    let base = retry.initial_delay_ms as f64 * retry.backoff_multiplier.powi(exponent);
    let delay_ms = (base as u64).min(retry.max_delay_ms);
    let jitter = if delay_ms >= 4 {
        rand::thread_rng().gen_range(0..=delay_ms / 4)
    } else {
        0
    };
    Duration::from_millis(delay_ms + jitter)
}
