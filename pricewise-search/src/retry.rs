//! Bounded exponential backoff for marketplace calls.
//!
//! Adapters wrap each remote call in [`run_with_retry`]. Only errors whose
//! `retryable` flag is set are attempted again; a backend-supplied
//! retry-after hint replaces the computed delay, capped at `max_delay_ms`.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::MarketplaceError;
use crate::types::MarketplaceId;

/// Default total attempts, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default base delay between attempts.
pub const DEFAULT_BASE_DELAY_MS: u64 = 200;
/// Default cap on a single delay.
pub const DEFAULT_MAX_DELAY_MS: u64 = 2_000;
/// Default backoff multiplier.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Retry policy for one adapter.
///
/// # Examples
///
/// ```
/// use pricewise_search::RetryPolicy;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.max_attempts, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first. Values below 1 behave as 1.
    pub max_attempts: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds (caps exponential growth and
    /// retry-after hints).
    pub max_delay_ms: u64,
    /// Backoff multiplier (2.0 for doubling).
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    pub fn with_backoff_multiplier(mut self, backoff_multiplier: f64) -> Self {
        self.backoff_multiplier = backoff_multiplier;
        self
    }

    /// Delay before retry number `attempt` (1-based).
    ///
    /// Formula: min(base * multiplier^(attempt-1), max_delay) + jitter,
    /// where jitter is between 0 and 10% of the delay.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base = self.base_delay_ms as f64;
        let max = self.max_delay_ms as f64;
        let exp = self
            .backoff_multiplier
            .powi(i32::try_from(attempt - 1).unwrap_or(i32::MAX));
        let delay = (base * exp).min(max);

        let jitter = delay * (rand::random::<f64>() * 0.1);
        Duration::from_millis((delay + jitter) as u64)
    }

    /// Delay before the next attempt, preferring the error's retry-after hint.
    fn next_delay(&self, attempt: u32, err: &MarketplaceError) -> Duration {
        match err.retry_after() {
            Some(hint) => hint.min(Duration::from_millis(self.max_delay_ms)),
            None => self.delay_for_attempt(attempt),
        }
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are exhausted. Returns the last error on failure.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    marketplace: &MarketplaceId,
    mut op: F,
) -> Result<T, MarketplaceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, MarketplaceError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.retryable && attempt < max_attempts => {
                let delay = policy.next_delay(attempt, &err);
                tracing::debug!(
                    marketplace = %marketplace,
                    attempt,
                    kind = %err.kind,
                    delay_ms = delay.as_millis() as u64,
                    "retrying marketplace call"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                if attempt > 1 {
                    tracing::warn!(
                        marketplace = %marketplace,
                        attempts = attempt,
                        error = %err,
                        "marketplace call failed after retries"
                    );
                }
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn mid() -> MarketplaceId {
        MarketplaceId::parse("MLC").expect("valid")
    }

    #[test]
    fn defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(policy.base_delay_ms, DEFAULT_BASE_DELAY_MS);
        assert_eq!(policy.max_delay_ms, DEFAULT_MAX_DELAY_MS);
    }

    #[test]
    fn delay_zero_attempt() {
        assert_eq!(RetryPolicy::default().delay_for_attempt(0), Duration::ZERO);
    }

    #[test]
    fn delay_grows_and_is_capped() {
        let policy = RetryPolicy::default()
            .with_base_delay_ms(100)
            .with_max_delay_ms(350);
        let first = policy.delay_for_attempt(1).as_millis();
        assert!((100..=110).contains(&first));
        let second = policy.delay_for_attempt(2).as_millis();
        assert!((200..=220).contains(&second));
        let capped = policy.delay_for_attempt(10).as_millis();
        assert!((350..=385).contains(&capped));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_retryable_until_success() {
        let calls = AtomicU32::new(0);
        let result = run_with_retry(&RetryPolicy::default(), &mid(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(MarketplaceError::unreachable(mid(), "connection reset"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.expect("third attempt succeeds"), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = run_with_retry(&RetryPolicy::default(), &mid(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(MarketplaceError::timeout(mid(), "slow")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_fails_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = run_with_retry(&RetryPolicy::default(), &mid(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(MarketplaceError::auth_failed(mid(), "bad token")) }
        })
        .await;
        assert_eq!(result.unwrap_err().kind, crate::MarketplaceErrorKind::AuthFailed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_hint_is_capped() {
        let policy = RetryPolicy::default().with_max_delay_ms(500);
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();
        let _ = run_with_retry(&policy.with_max_attempts(2), &mid(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<(), _>(
                    MarketplaceError::rate_limited(mid(), "429")
                        .with_retry_after(Duration::from_secs(60)),
                )
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(started.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn no_retry_policy_runs_once() {
        let calls = AtomicU32::new(0);
        let _: Result<(), _> = run_with_retry(&RetryPolicy::no_retry(), &mid(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(MarketplaceError::timeout(mid(), "slow")) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
