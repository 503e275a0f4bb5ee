//! Bounded retry for units of work that lose a race

use std::future::Future;
use std::time::Duration;

use crate::config::FulfillmentConfig;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Wait `backoff * attempt` before the next attempt
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&FulfillmentConfig::default())
    }
}

impl From<&FulfillmentConfig> for RetryPolicy {
    fn from(config: &FulfillmentConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

/// Run `attempt` until it succeeds, fails with a non-retryable error, or the
/// policy runs out of attempts. Exhaustion surfaces as `AppError::Conflict`.
pub async fn with_retries<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut attempt: F,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    for n in 1..=max_attempts {
        match attempt().await {
            Err(err) if err.is_retryable() => {
                tracing::warn!(operation, attempt = n, max_attempts, error = %err, "Retrying after contention");
                if n < max_attempts {
                    tokio::time::sleep(policy.backoff * n).await;
                }
            }
            result => return result,
        }
    }

    Err(AppError::Conflict {
        resource: operation.to_string(),
        message: format!(
            "Could not complete {} after {} attempts due to concurrent updates, please retry",
            operation, max_attempts
        ),
    })
}
