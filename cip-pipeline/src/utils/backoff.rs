//! Retry with exponential backoff for external calls
//!
//! Only transient collaborator errors are retried. The wait before retry `n`
//! (1-based) is `min(2^n, max_backoff)` seconds.

use crate::types::{CollaboratorError, CollaboratorResult};
use std::future::Future;
use std::time::Duration;

/// Backoff policy for one collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub max_backoff: Duration,
}

impl BackoffPolicy {
    pub fn new(max_attempts: u32, max_backoff_secs: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base: Duration::from_secs(1),
            max_backoff: Duration::from_secs(max_backoff_secs),
        }
    }

    /// Wait before the retry following failed attempt `attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(31));
        self.base.saturating_mul(factor).min(self.max_backoff)
    }
}

/// Run `operation` until it succeeds, fails permanently or attempts run out
pub async fn retry_transient<F, Fut, T>(
    operation_name: &str,
    policy: BackoffPolicy,
    mut operation: F,
) -> CollaboratorResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CollaboratorResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient error, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                if err.is_transient() {
                    tracing::error!(operation = operation_name, attempt, error = %err, "Retries exhausted");
                }
                return Err(err);
            }
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(3, 60)
    }
}

/// Short-hand used by tests and callers that need no real waiting
pub fn immediate(max_attempts: u32) -> BackoffPolicy {
    BackoffPolicy {
        max_attempts: max_attempts.max(1),
        base: Duration::ZERO,
        max_backoff: Duration::ZERO,
    }
}
