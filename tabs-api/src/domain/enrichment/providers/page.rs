//! Adapters from the `page-fetch` clients to the pipeline ports.

use async_trait::async_trait;
use page_fetch::{PageClient, ScreenshotClient};

use crate::domain::enrichment::traits::{
    ContentExtractor, PageContent, ScreenshotProvider, Screenshots,
};
use crate::domain::ProviderError;

#[async_trait]
impl ContentExtractor for PageClient {
    async fn extract(&self, url: &str) -> Result<PageContent, ProviderError> {
        Ok(self.fetch(url).await?)
    }
}

#[async_trait]
impl ScreenshotProvider for ScreenshotClient {
    async fn capture(&self, url: &str) -> Result<Screenshots, ProviderError> {
        let set = ScreenshotClient::capture(self, url).await?;
        Ok(Screenshots {
            thumbnail: set.thumbnail_url,
            preview: set.preview_url,
            full_height: set.full_height_url,
        })
    }
}
