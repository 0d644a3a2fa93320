use std::time::Duration;

use url::Url;

use crate::{extract, FetchError};

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0";

/// Default single-shot fetch budget.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Title and readable text extracted from a page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageContent {
    pub title: Option<String>,
    pub content: String,
}

/// Fetches pages and reduces them to [`PageContent`].
///
/// Each fetch is a single attempt bounded by `timeout`; retrying is left to
/// the caller so that it can apply its own policy.
#[derive(Clone)]
pub struct PageClient {
    http: reqwest::Client,
    timeout: Duration,
    max_content_chars: usize,
}

impl PageClient {
    pub fn new(timeout: Duration, max_content_chars: usize) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            http,
            timeout,
            max_content_chars,
        })
    }

    pub async fn fetch(&self, url: &str) -> Result<PageContent, FetchError> {
        let parsed = parse_http_url(url)?;
        let host = parsed.host_str().unwrap_or_default().to_string();

        tracing::debug!(%host, path = parsed.path(), "fetching page");

        let resp = self
            .http
            .get(parsed.clone())
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, &host, self.timeout))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: parsed.to_string(),
            });
        }

        let html = resp
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(e, &host, self.timeout))?;

        Ok(PageContent {
            title: extract::extract_title(&html),
            content: extract::extract_text(&html, self.max_content_chars),
        })
    }
}

/// Parse and validate that `url` is an absolute http(s) URL with a host.
pub fn parse_http_url(url: &str) -> Result<Url, FetchError> {
    let mut url = url.trim().to_string();
    if url.starts_with("//") {
        url = format!("https:{}", url);
    }

    let parsed = Url::parse(&url).map_err(|e| FetchError::invalid_url(&url, e.to_string()))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(FetchError::invalid_url(
            &url,
            format!("scheme '{}' not supported", parsed.scheme()),
        ));
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(FetchError::invalid_url(&url, "missing host"));
    }

    Ok(parsed)
}
