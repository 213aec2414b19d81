use std::future::Future;
use std::time::Duration;

use super::StoreError;

/// Bounded retry for transient store failures.
///
/// Attempt `n` that fails transiently is followed by a sleep of
/// `base_delay * n`. Any other error is returned immediately.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    pub async fn run<T, F, Fut>(&self, op: &str, mut call: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match call().await {
                Err(StoreError::Transient(reason)) if attempt < max_attempts => {
                    let delay = self.base_delay * attempt;
                    tracing::warn!(
                        op,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        %reason,
                        "transient store failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(last @ StoreError::Transient(_)) => {
                    tracing::warn!(op, attempts = attempt, "store retries exhausted");
                    return Err(StoreError::Exhausted {
                        attempts: attempt,
                        last: Box::new(last),
                    });
                }
                other => return other,
            }
        }
    }
}
