use std::future::Future;
use std::time::Duration;

use crate::error::LedgerError;

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Runs `op` until it succeeds, fails with a non-transient error, or the attempts run out.
    /// The wait before attempt `n + 1` is `backoff_step * n`.
    pub async fn run<T, F, Fut>(&self, op_name: &str, mut op: F) -> Result<T, LedgerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    log::warn!(
                        "{} failed on attempt {}/{}, retrying: {}",
                        op_name,
                        attempt,
                        self.max_attempts,
                        e
                    );

                    tokio::time::sleep(self.backoff_step * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn upstream(status: u16) -> LedgerError {
        LedgerError::Upstream {
            status: Some(status),
            message: String::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_with_linear_backoff() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result = RetryPolicy::default()
            .run("test op", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(upstream(502))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_millis(1500));
        assert!(start.elapsed() < Duration::from_millis(1600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = RetryPolicy::default()
            .run("test op", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(LedgerError::StoreContention(String::from(
                    "could not obtain lock on row",
                )))
            })
            .await;

        assert!(matches!(result, Err(LedgerError::StoreContention(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_does_not_retry_permanent_errors() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = RetryPolicy::default()
            .run("test op", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(upstream(404))
            })
            .await;

        assert_eq!(result, Err(upstream(404)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
