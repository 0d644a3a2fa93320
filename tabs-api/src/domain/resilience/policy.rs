//! Retry presets for each kind of external call made during enrichment.

use std::time::Duration;

use super::RetryOptions;
use crate::domain::ProviderError;

impl RetryOptions<ProviderError> {
    /// Screenshot capture. A bad URL or unknown host will never render.
    pub fn screenshot() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            should_retry: retry_screenshot,
        }
    }

    /// Summarize, categorize and embed calls. Quota and rate-limit signals
    /// need a longer cool-off than backoff gives, so they are not retried.
    pub fn ai() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
            backoff_multiplier: 2.0,
            should_retry: retry_ai,
        }
    }

    /// Page fetches and other import work.
    pub fn import() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            should_retry: retry_import,
        }
    }
}

fn retry_screenshot(err: &ProviderError) -> bool {
    !(err.is_circuit_open() || err.is_invalid_target() || err.is_validation())
}

fn retry_ai(err: &ProviderError) -> bool {
    !(err.is_circuit_open() || err.is_rate_limited() || err.is_validation())
}

fn retry_import(err: &ProviderError) -> bool {
    !err.is_circuit_open() && err.is_transient()
}
