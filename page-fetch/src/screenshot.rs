use std::time::Duration;

use serde::Deserialize;

use crate::{client::parse_http_url, FetchError};

/// The three renderings a screenshot service produces for one page.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotSet {
    pub thumbnail_url: String,
    pub preview_url: String,
    pub full_height_url: String,
}

/// Client for an HTTP screenshot service.
///
/// The service is called as `GET {endpoint}?url={page}` and answers with a
/// JSON [`ScreenshotSet`] pointing at the stored images.
#[derive(Clone)]
pub struct ScreenshotClient {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl ScreenshotClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            timeout,
        })
    }

    pub async fn capture(&self, page_url: &str) -> Result<ScreenshotSet, FetchError> {
        let page = parse_http_url(page_url)?;
        let host = page.host_str().unwrap_or_default().to_string();

        let resp = self
            .http
            .get(&self.endpoint)
            .query(&[("url", page.as_str())])
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, &host, self.timeout))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: page.to_string(),
            });
        }

        resp.json::<ScreenshotSet>()
            .await
            .map_err(|e| FetchError::InvalidResponse(e.to_string()))
    }
}
