use std::time::Duration;

use page_fetch::FetchError;
use thiserror::Error;

use super::resilience::CircuitError;

/// Errors returned by external collaborators (screenshot service, page
/// fetcher, AI assistant, embedding model).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("could not resolve host '{0}'")]
    UnresolvableHost(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("rejected request: {0}")]
    Validation(String),
    #[error("{0} is temporarily unavailable")]
    Unavailable(String),
    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Classify an error message from an AI provider.
    ///
    /// The genai client only surfaces provider failures as text, so the
    /// status codes and Google error reasons are matched by substring.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();

        if lower.contains("quota") || lower.contains("resource_exhausted") {
            Self::QuotaExceeded(message)
        } else if lower.contains("429") || lower.contains("rate limit") || lower.contains("rate_limit") {
            Self::RateLimited(message)
        } else if lower.contains("400") || lower.contains("invalid_argument") {
            Self::Validation(message)
        } else {
            Self::Network(message)
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::QuotaExceeded(_))
            || matches!(self, Self::Http { status: 429, .. })
    }

    /// The target itself is bad; no provider will ever succeed on it.
    pub fn is_invalid_target(&self) -> bool {
        matches!(self, Self::InvalidUrl(_) | Self::UnresolvableHost(_))
    }

    /// A 4xx-class rejection of the request itself.
    pub fn is_validation(&self) -> bool {
        match self {
            Self::Validation(_) | Self::InvalidUrl(_) => true,
            Self::Http { status, .. } => (400..500).contains(status) && *status != 408 && *status != 429,
            _ => false,
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Network failures, timeouts and 5xx responses.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Network(_) => true,
            Self::Http { status, .. } => *status >= 500 || *status == 408,
            _ => false,
        }
    }
}

impl From<FetchError> for ProviderError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::InvalidUrl { url, reason } => Self::InvalidUrl(format!("{url}: {reason}")),
            FetchError::UnresolvableHost(host) => Self::UnresolvableHost(host),
            FetchError::Timeout(after) => Self::Timeout(after),
            FetchError::Status { status, url } => Self::Http {
                status,
                message: url,
            },
            FetchError::Network(message) => Self::Network(message),
            FetchError::InvalidResponse(message) => Self::InvalidResponse(message),
        }
    }
}

impl From<CircuitError<ProviderError>> for ProviderError {
    fn from(err: CircuitError<ProviderError>) -> Self {
        match err {
            CircuitError::Open { name, .. } => Self::Unavailable(name),
            CircuitError::Inner(inner) => inner,
        }
    }
}
