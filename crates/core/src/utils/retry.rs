//! Bounded retry with exponential backoff for store calls.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use log::{debug, warn};

use crate::errors::{Error, Result, StoreError};

/// How often and how long a store call may be attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Backoff before the second attempt.
    pub base_delay: Duration,
    /// Cap for one backoff sleep.
    pub max_delay: Duration,
    /// Deadline applied to each attempt.
    pub timeout: Duration,
}

impl RetryPolicy {
    /// Doubling backoff from `base_delay`, capped at `max_delay`, with one
    /// sleep per retry.
    pub fn backoff(&self) -> ExponentialBuilder {
        let retries = self.max_attempts.max(1) - 1;
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_max_delay(self.max_delay)
            .with_factor(2.0)
            .with_max_times(retries as usize)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        crate::config::EngineConfig::default().retry_policy()
    }
}

/// Runs `op` under the policy's deadline, retrying transient failures.
///
/// Timeouts count as transient. Non-transient errors are returned at once.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let deadline = policy.timeout;
    let attempt = || {
        let call = op();
        async move {
            match tokio::time::timeout(deadline, call).await {
                Ok(result) => result,
                Err(_) => Err(Error::Store(StoreError::Timeout(format!(
                    "{} exceeded {:?}",
                    label, deadline
                )))),
            }
        }
    };

    let result = attempt
        .retry(policy.backoff())
        .when(Error::is_transient)
        .notify(|err: &Error, delay: Duration| {
            debug!("{} failed: {}; retrying in {:?}", label, err, delay);
        })
        .await;

    if let Err(err) = &result {
        if err.is_transient() {
            warn!(
                "{} failed after {} attempt(s): {}",
                label,
                policy.max_attempts.max(1),
                err
            );
        }
    }
    result
}
