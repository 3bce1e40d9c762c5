//! Retry policy for outbound provider calls.
//!
//! An explicit policy object (max attempts, backoff function, retryable
//! predicate) wrapping an async operation, testable without network I/O.
//! Retry decisions delegate to [`ClientError::is_retryable`]: network
//! errors, 5xx and 429 retry; validation and auth failures never do.

use domain::{ClientError, ClientResult};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Exponential-backoff-with-jitter retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum retries after the initial attempt; 0 disables retrying.
    pub max_retries: u32,

    /// Base delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,

    /// Upper bound on any single delay, in milliseconds.
    pub max_delay_ms: u64,

    /// Exponential growth factor between retries.
    pub multiplier: f64,

    /// Symmetric jitter ratio; 0.2 spreads each delay across ±20%.
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            multiplier: 2.0,
            jitter_ratio: 0.2,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    pub fn with_base_delay(mut self, ms: u64) -> Self {
        self.base_delay_ms = ms;
        self
    }

    pub fn with_max_delay(mut self, ms: u64) -> Self {
        self.max_delay_ms = ms;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter_ratio = 0.0;
        self
    }

    /// Delay before retry `attempt` (1-based):
    /// `base * multiplier^(attempt-1) * (1 ± jitter_ratio)`, capped at
    /// `max_delay_ms`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let raw = self.base_delay_ms as f64 * self.multiplier.powi(exponent);
        let capped = raw.min(self.max_delay_ms as f64);

        let jittered = if self.jitter_ratio > 0.0 {
            let spread = (rand::random::<f64>() * 2.0 - 1.0) * self.jitter_ratio;
            capped * (1.0 + spread)
        } else {
            capped
        };

        Duration::from_millis(jittered.max(0.0) as u64)
    }
}

/// Run `operation` under `policy`, sleeping between retryable failures.
///
/// Returns the first success, or the last error once the policy is
/// exhausted or a non-retryable error is seen.
pub async fn retry_with_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> ClientResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ClientResult<T>>,
{
    let mut last_error: Option<ClientError> = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let delay = policy.backoff_delay(attempt);
            warn!(
                operation = operation_name,
                attempt,
                max_retries = policy.max_retries,
                delay_ms = delay.as_millis() as u64,
                "retrying after backoff"
            );
            tokio::time::sleep(delay).await;
        }

        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    info!(
                        operation = operation_name,
                        attempt, "operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                debug!(
                    operation = operation_name,
                    attempt,
                    classification = err.classification(),
                    error = %err,
                    "operation failed"
                );

                if !err.is_retryable() {
                    error!(
                        operation = operation_name,
                        classification = err.classification(),
                        "non-retryable error, aborting"
                    );
                    return Err(err);
                }
                last_error = Some(err);
            }
        }
    }

    let final_error = last_error.unwrap_or_else(|| {
        ClientError::Unknown(format!(
            "{operation_name} failed with no recorded error after {} retries",
            policy.max_retries
        ))
    });
    error!(
        operation = operation_name,
        max_retries = policy.max_retries,
        error = %final_error,
        "retries exhausted"
    );
    Err(final_error)
}
