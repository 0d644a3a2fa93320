//! Ports for the external collaborators the pipeline drives.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::ProviderError;

pub use page_fetch::PageContent;

/// The stored renderings of a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Screenshots {
    pub thumbnail: String,
    pub preview: String,
    pub full_height: String,
}

/// Assistant output for one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[async_trait]
pub trait ScreenshotProvider: Send + Sync {
    async fn capture(&self, url: &str) -> Result<Screenshots, ProviderError>;
}

#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Fetch `url` once and reduce it to its title and readable text.
    async fn extract(&self, url: &str) -> Result<PageContent, ProviderError>;
}

#[async_trait]
pub trait Assistant: Send + Sync {
    async fn summarize(&self, url: &str, content: &str) -> Result<Summary, ProviderError>;

    /// A single category label for the page.
    async fn categorize(&self, url: &str, content: &str) -> Result<String, ProviderError>;
}

#[async_trait]
impl<T: ScreenshotProvider + ?Sized> ScreenshotProvider for Arc<T> {
    async fn capture(&self, url: &str) -> Result<Screenshots, ProviderError> {
        (**self).capture(url).await
    }
}

#[async_trait]
impl<T: ContentExtractor + ?Sized> ContentExtractor for Arc<T> {
    async fn extract(&self, url: &str) -> Result<PageContent, ProviderError> {
        (**self).extract(url).await
    }
}

#[async_trait]
impl<T: Assistant + ?Sized> Assistant for Arc<T> {
    async fn summarize(&self, url: &str, content: &str) -> Result<Summary, ProviderError> {
        (**self).summarize(url, content).await
    }

    async fn categorize(&self, url: &str, content: &str) -> Result<String, ProviderError> {
        (**self).categorize(url, content).await
    }
}
