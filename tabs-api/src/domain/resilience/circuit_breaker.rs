use std::{
    fmt,
    future::Future,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use thiserror::Error;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerOptions {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// Time since the last failure before a probe call is admitted
    pub recovery_timeout: Duration,
    /// A closed circuit forgets old failures once this much time has passed
    pub monitoring_period: Duration,
}

impl Default for CircuitBreakerOptions {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            monitoring_period: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through.
    Closed,
    /// Calls are rejected without reaching the provider.
    Open,
    /// One probe call is in flight or allowed.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum CircuitError<E> {
    #[error("{name} is temporarily unavailable, retry in {retry_after:?}")]
    Open { name: String, retry_after: Duration },
    #[error("{0}")]
    Inner(E),
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failures: u32,
    last_failure: Option<Instant>,
    probe_started: Option<Instant>,
}

/// Stateful circuit breaker guarding one external provider.
///
/// Opens after `failure_threshold` consecutive failures and rejects calls
/// until `recovery_timeout` has passed since the last failure. Then exactly
/// one probe is let through; its outcome closes or reopens the circuit.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    options: CircuitBreakerOptions,
    state: Mutex<BreakerState>,
}

enum Admission {
    Call,
    Probe,
    Reject(Duration),
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, options: CircuitBreakerOptions) -> Self {
        Self {
            name: name.into(),
            options,
            state: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failures: 0,
                last_failure: None,
                probe_started: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failures
    }

    pub fn reset(&self) {
        let mut state = self.lock();
        state.state = CircuitState::Closed;
        state.failures = 0;
        state.last_failure = None;
        state.probe_started = None;
    }

    /// Run `operation` through the breaker.
    ///
    /// While open, the operation is not invoked and `CircuitError::Open` is
    /// returned instead.
    pub async fn call<T, E, F, Fut>(&self, operation: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let admission = self.admit();
        if let Admission::Reject(retry_after) = admission {
            return Err(CircuitError::Open {
                name: self.name.clone(),
                retry_after,
            });
        }

        match operation().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                self.on_failure(matches!(admission, Admission::Probe));
                Err(CircuitError::Inner(err))
            }
        }
    }

    fn admit(&self) -> Admission {
        let now = Instant::now();
        let mut state = self.lock();

        match state.state {
            CircuitState::Closed => {
                let stale = state
                    .last_failure
                    .is_some_and(|at| now.duration_since(at) >= self.options.monitoring_period);
                if stale {
                    state.failures = 0;
                    state.last_failure = None;
                }
                Admission::Call
            }
            CircuitState::Open => {
                let since_failure = state
                    .last_failure
                    .map_or(self.options.recovery_timeout, |at| now.duration_since(at));
                if since_failure >= self.options.recovery_timeout {
                    tracing::info!(breaker = %self.name, "circuit half-open, admitting probe");
                    state.state = CircuitState::HalfOpen;
                    state.probe_started = Some(now);
                    Admission::Probe
                } else {
                    Admission::Reject(self.options.recovery_timeout - since_failure)
                }
            }
            CircuitState::HalfOpen => {
                // A probe that never reported back must not wedge the circuit.
                let stuck = state
                    .probe_started
                    .map_or(true, |at| now.duration_since(at) >= self.options.recovery_timeout);
                if stuck {
                    state.probe_started = Some(now);
                    Admission::Probe
                } else {
                    Admission::Reject(self.options.recovery_timeout)
                }
            }
        }
    }

    fn on_success(&self) {
        let mut state = self.lock();
        if state.state != CircuitState::Closed {
            tracing::info!(breaker = %self.name, "circuit closed");
        }
        state.state = CircuitState::Closed;
        state.failures = 0;
        state.last_failure = None;
        state.probe_started = None;
    }

    fn on_failure(&self, was_probe: bool) {
        let mut state = self.lock();
        state.failures += 1;
        state.last_failure = Some(Instant::now());

        if was_probe || state.state == CircuitState::HalfOpen {
            tracing::warn!(breaker = %self.name, "probe failed, circuit reopened");
            state.state = CircuitState::Open;
            state.probe_started = None;
        } else if state.state == CircuitState::Closed
            && state.failures >= self.options.failure_threshold
        {
            tracing::warn!(
                breaker = %self.name,
                failures = state.failures,
                "failure threshold reached, circuit opened"
            );
            state.state = CircuitState::Open;
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
