use std::{error::Error, time::Duration};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("could not resolve host '{0}'")]
    UnresolvableHost(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

impl FetchError {
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// HTTP status code, if the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether trying the same request again could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::InvalidUrl { .. } | Self::UnresolvableHost(_) | Self::InvalidResponse(_) => false,
            Self::Timeout(_) | Self::Network(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 408,
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error, host: &str, timeout: Duration) -> Self {
        if err.is_timeout() {
            return Self::Timeout(timeout);
        }

        let detail = innermost_message(&err);
        if err.is_connect() && looks_like_dns_failure(&detail) {
            return Self::UnresolvableHost(host.to_string());
        }

        if let Some(status) = err.status() {
            return Self::Status {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            };
        }

        if err.is_decode() {
            return Self::InvalidResponse(detail);
        }

        Self::Network(detail)
    }
}

/// reqwest wraps hyper which wraps the resolver; the useful text is at the bottom.
fn innermost_message(err: &reqwest::Error) -> String {
    let mut current: &dyn Error = err;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}

fn looks_like_dns_failure(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    ["dns error", "failed to lookup address", "name or service not known", "no such host"]
        .iter()
        .any(|needle| message.contains(needle))
}
