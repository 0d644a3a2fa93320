//! Retry with exponential backoff and a per-provider circuit breaker.

mod circuit_breaker;
mod policy;
mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerOptions, CircuitError, CircuitState};
pub use retry::{retry, retry_batch, BatchAttempt, RetryOptions};
