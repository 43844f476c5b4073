//! Bounded retry with exponential backoff for indexer calls.

use std::future::Future;
use std::time::Duration;

use micro_core::constants::{
    DEFAULT_INDEXER_TIMEOUT_SECS, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BACKOFF_MS,
    DEFAULT_RETRY_MAX_BACKOFF_MS,
};
use micro_core::error::{IndexerError, WalletError};
use tracing::warn;

/// How indexer calls are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per call, including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Sleep before the first retry; doubled after every failure.
    pub initial_backoff: Duration,
    /// Upper bound on a single sleep.
    pub max_backoff: Duration,
    /// Deadline of every single attempt.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            initial_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
            max_backoff: Duration::from_millis(DEFAULT_RETRY_MAX_BACKOFF_MS),
            timeout: Duration::from_secs(DEFAULT_INDEXER_TIMEOUT_SECS),
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn no_retry(timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            timeout,
            ..Self::default()
        }
    }

    /// Backoff slept after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// Every attempt is cut off after [`timeout`](Self::timeout). The final
    /// failure surfaces as [`WalletError::IndexerUnavailable`].
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, WalletError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, IndexerError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match tokio::time::timeout(self.timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(IndexerError::Timeout),
            };
            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.backoff(attempt);
                    warn!(%what, attempt, error = %e, ?delay, "Indexer call failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(WalletError::IndexerUnavailable {
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }
}
