use std::{fmt, future::Future, time::Duration};

use futures::future::join_all;
use rand::Rng;

/// Fraction of the backoff delay added as random jitter, at most.
const MAX_JITTER: f64 = 0.1;

/// How often and how patiently to retry a fallible operation.
pub struct RetryOptions<E> {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Errors for which this returns `false` are returned immediately
    pub should_retry: fn(&E) -> bool,
}

impl<E> Clone for RetryOptions<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for RetryOptions<E> {}

impl<E> fmt::Debug for RetryOptions<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .finish_non_exhaustive()
    }
}

impl<E> Default for RetryOptions<E> {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            should_retry: |_| true,
        }
    }
}

impl<E> RetryOptions<E> {
    /// Delay before the attempt following `attempt` (1-based), without jitter.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_secs_f64();
        let exp = base * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        Duration::from_secs_f64(exp.min(self.max_delay.as_secs_f64()))
    }

    fn jittered_delay(&self, attempt: u32) -> Duration {
        let delay = self.backoff_delay(attempt);
        let jitter = rand::rng().random_range(0.0..=MAX_JITTER);
        delay.mul_f64(1.0 + jitter)
    }
}

/// Run `operation` until it succeeds, the error is not retryable, or
/// `max_attempts` is reached. The last error is returned on exhaustion.
pub async fn retry<T, E, F, Fut>(mut operation: F, options: &RetryOptions<E>) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let max_attempts = options.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= max_attempts || !(options.should_retry)(&err) => {
                return Err(err);
            }
            Err(err) => {
                let delay = options.jittered_delay(attempt);
                tracing::debug!(
                    attempt,
                    max_attempts,
                    ?delay,
                    error = %err,
                    "operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Outcome of one operation in [`retry_batch`], tagged with its input position.
#[derive(Debug)]
pub struct BatchAttempt<T, E> {
    pub index: usize,
    pub result: Result<T, E>,
}

/// Retry each operation independently, running `concurrency` of them at a
/// time. Results come back in input order and one exhausted operation never
/// stops the others.
pub async fn retry_batch<T, E, F, Fut>(
    operations: Vec<F>,
    options: &RetryOptions<E>,
    concurrency: usize,
) -> Vec<BatchAttempt<T, E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let concurrency = concurrency.max(1);
    let mut attempts = Vec::with_capacity(operations.len());
    let mut operations = operations.into_iter().enumerate().peekable();

    while operations.peek().is_some() {
        let chunk: Vec<_> = operations.by_ref().take(concurrency).collect();
        let results = join_all(chunk.into_iter().map(|(index, op)| async move {
            BatchAttempt {
                index,
                result: retry(op, options).await,
            }
        }))
        .await;
        attempts.extend(results);
    }

    attempts
}
