//! Mock providers for pipeline tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::domain::enrichment::traits::{
    Assistant, ContentExtractor, PageContent, ScreenshotProvider, Screenshots, Summary,
};
use crate::domain::ProviderError;

/// Shared failure script: fail the first `failures` calls (all calls when `None`).
#[derive(Clone)]
struct Script {
    error: Option<ProviderError>,
    failures: Option<usize>,
    call_count: Arc<AtomicUsize>,
}

impl Script {
    fn ok() -> Self {
        Self {
            error: None,
            failures: None,
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn failing(error: ProviderError, failures: Option<usize>) -> Self {
        Self {
            error: Some(error),
            failures,
            ..Self::ok()
        }
    }

    fn next(&self) -> Result<(), ProviderError> {
        let n = self.call_count.fetch_add(1, Ordering::SeqCst);
        match (&self.error, self.failures) {
            (Some(error), None) => Err(error.clone()),
            (Some(error), Some(limit)) if n < limit => Err(error.clone()),
            _ => Ok(()),
        }
    }

    fn calls(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub struct MockScreenshotProvider {
    script: Script,
}

impl MockScreenshotProvider {
    pub fn new() -> Self {
        Self {
            script: Script::ok(),
        }
    }

    pub fn failing(error: ProviderError) -> Self {
        Self {
            script: Script::failing(error, None),
        }
    }

    /// Fail the first `times` calls, then succeed.
    pub fn failing_times(times: usize, error: ProviderError) -> Self {
        Self {
            script: Script::failing(error, Some(times)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.script.calls()
    }
}

#[async_trait]
impl ScreenshotProvider for MockScreenshotProvider {
    async fn capture(&self, url: &str) -> Result<Screenshots, ProviderError> {
        self.script.next()?;
        Ok(Screenshots {
            thumbnail: format!("https://cdn.test/thumb?u={url}"),
            preview: format!("https://cdn.test/preview?u={url}"),
            full_height: format!("https://cdn.test/full?u={url}"),
        })
    }
}

#[derive(Clone)]
pub struct MockContentExtractor {
    page: PageContent,
    script: Script,
}

impl MockContentExtractor {
    pub fn returning(title: &str, content: &str) -> Self {
        Self {
            page: PageContent {
                title: Some(title.to_string()),
                content: content.to_string(),
            },
            script: Script::ok(),
        }
    }

    pub fn failing(error: ProviderError) -> Self {
        Self {
            page: PageContent::default(),
            script: Script::failing(error, None),
        }
    }

    pub fn call_count(&self) -> usize {
        self.script.calls()
    }
}

#[async_trait]
impl ContentExtractor for MockContentExtractor {
    async fn extract(&self, _url: &str) -> Result<PageContent, ProviderError> {
        self.script.next()?;
        Ok(self.page.clone())
    }
}

/// Counts summarize and categorize calls together.
#[derive(Clone)]
pub struct MockAssistant {
    summary: String,
    category: String,
    script: Script,
}

impl MockAssistant {
    pub fn new(summary: &str, category: &str) -> Self {
        Self {
            summary: summary.to_string(),
            category: category.to_string(),
            script: Script::ok(),
        }
    }

    pub fn failing(error: ProviderError) -> Self {
        Self {
            script: Script::failing(error, None),
            ..Self::new("", "")
        }
    }

    pub fn call_count(&self) -> usize {
        self.script.calls()
    }
}

#[async_trait]
impl Assistant for MockAssistant {
    async fn summarize(&self, _url: &str, _content: &str) -> Result<Summary, ProviderError> {
        self.script.next()?;
        Ok(Summary {
            summary: self.summary.clone(),
            tags: vec!["docs".to_string()],
        })
    }

    async fn categorize(&self, _url: &str, _content: &str) -> Result<String, ProviderError> {
        self.script.next()?;
        Ok(self.category.clone())
    }
}
