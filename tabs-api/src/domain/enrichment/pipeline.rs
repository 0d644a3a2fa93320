use std::{future::Future, sync::Arc, time::Duration};

use page_fetch::truncate_chars;

use super::traits::{Assistant, ContentExtractor, PageContent, ScreenshotProvider};
use super::types::{ProcessType, StageFlags, TabOutcome};
use crate::domain::models::{OwnerId, Tab, TabId, TabUpdate};
use crate::domain::resilience::{retry, CircuitBreaker, CircuitBreakerOptions, RetryOptions};
use crate::domain::search::{Embedder, EmbeddingTask};
use crate::domain::ProviderError;
use crate::repositories::{RepositoryError, TabRepository};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("tab {0} not found")]
    TabNotFound(TabId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Single-shot budget for fetching a page
    pub fetch_timeout: Duration,
    /// Budget for each screenshot, assistant or embedding call
    pub provider_timeout: Duration,
    /// Page text included in the embedding input
    pub embedding_content_chars: usize,
    pub breaker: CircuitBreakerOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(10),
            provider_timeout: Duration::from_secs(30),
            embedding_content_chars: 2_000,
            breaker: CircuitBreakerOptions::default(),
        }
    }
}

/// The external collaborators, one per stage.
#[derive(Clone)]
pub struct Providers {
    pub screenshots: Arc<dyn ScreenshotProvider>,
    pub content: Arc<dyn ContentExtractor>,
    pub assistant: Arc<dyn Assistant>,
    pub embedder: Arc<dyn Embedder>,
}

struct Breakers {
    screenshots: CircuitBreaker,
    content: CircuitBreaker,
    assistant: CircuitBreaker,
    embedder: CircuitBreaker,
}

impl Breakers {
    fn new(options: CircuitBreakerOptions) -> Self {
        Self {
            screenshots: CircuitBreaker::new("screenshot service", options),
            content: CircuitBreaker::new("content extraction", options),
            assistant: CircuitBreaker::new("assistant", options),
            embedder: CircuitBreaker::new("embedding service", options),
        }
    }
}

/// Enriches one tab at a time: screenshot, content extraction,
/// summarize and categorize, embedding.
///
/// A failing stage is logged and leaves its fields unset; later stages
/// still run. Each stage's fields are stored as soon as the stage finishes.
pub struct EnrichmentPipeline {
    repository: Arc<dyn TabRepository>,
    providers: Providers,
    breakers: Breakers,
    config: PipelineConfig,
}

impl EnrichmentPipeline {
    pub fn new(
        repository: Arc<dyn TabRepository>,
        providers: Providers,
        config: PipelineConfig,
    ) -> Self {
        Self {
            repository,
            providers,
            breakers: Breakers::new(config.breaker),
            config,
        }
    }

    /// Run the requested stages for one tab. Never returns an error; anything
    /// unexpected becomes a failed outcome.
    pub async fn process_tab(
        &self,
        id: &TabId,
        owner: &OwnerId,
        process: ProcessType,
    ) -> TabOutcome {
        match self.run(id, owner, process).await {
            Ok(flags) => TabOutcome::success(id.clone(), flags),
            Err(e) => {
                tracing::error!(tab_id = %id, error = %e, "tab enrichment failed");
                TabOutcome::failed(id.clone(), e)
            }
        }
    }

    async fn run(
        &self,
        id: &TabId,
        owner: &OwnerId,
        process: ProcessType,
    ) -> Result<StageFlags, PipelineError> {
        let tab = self
            .repository
            .get_tab(id, owner)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound(_) => PipelineError::TabNotFound(id.clone()),
                other => PipelineError::Repository(other),
            })?;

        let mut flags = StageFlags::default();

        if process.screenshot {
            flags.screenshots = self.screenshot_stage(&tab).await?;
        }

        let page = if process.needs_content() {
            self.content_stage(&tab).await?
        } else {
            None
        };

        let title = page
            .as_ref()
            .and_then(|p| p.title.clone())
            .or_else(|| tab.title.clone());
        let content = page
            .map(|p| p.content)
            .filter(|c| !c.trim().is_empty())
            .or_else(|| tab.content.clone())
            .unwrap_or_default();
        let mut summary = tab.summary.clone();

        if process.ai {
            let (stored, produced) = self.ai_stage(&tab, &content).await?;
            flags.ai = stored;
            if produced.is_some() {
                summary = produced;
            }
        }

        if process.embeddings {
            let input = compose_embedding_input(
                title.as_deref(),
                summary.as_deref(),
                &content,
                &tab.url,
                self.config.embedding_content_chars,
            );
            flags.embeddings = self.embedding_stage(&tab, &input).await?;
        }

        tracing::info!(
            tab_id = %id,
            screenshots = flags.screenshots,
            ai = flags.ai,
            embeddings = flags.embeddings,
            "tab enriched"
        );
        Ok(flags)
    }

    async fn screenshot_stage(&self, tab: &Tab) -> Result<bool, PipelineError> {
        let screenshots = self.providers.screenshots.as_ref();
        let result = self
            .guarded(
                &self.breakers.screenshots,
                &RetryOptions::screenshot(),
                self.config.provider_timeout,
                || screenshots.capture(&tab.url),
            )
            .await;

        match result {
            Ok(shots) => {
                let update = TabUpdate {
                    thumbnail_url: Some(shots.thumbnail),
                    screenshot_url: Some(shots.preview),
                    full_screenshot_url: Some(shots.full_height),
                    ..Default::default()
                };
                self.store(&tab.id, &update).await?;
                Ok(true)
            }
            Err(e) => {
                soft_failure(&tab.id, "screenshot", &e);
                Ok(false)
            }
        }
    }

    async fn content_stage(&self, tab: &Tab) -> Result<Option<PageContent>, PipelineError> {
        let content = self.providers.content.as_ref();
        let result = self
            .guarded(
                &self.breakers.content,
                &RetryOptions::import(),
                self.config.fetch_timeout,
                || content.extract(&tab.url),
            )
            .await;

        match result {
            Ok(page) => {
                let keep_title = tab.title.as_deref().is_some_and(|t| !t.trim().is_empty());
                let update = TabUpdate {
                    title: page.title.clone().filter(|_| !keep_title),
                    content: Some(page.content.clone()).filter(|c| !c.trim().is_empty()),
                    ..Default::default()
                };
                self.store(&tab.id, &update).await?;
                Ok(Some(page))
            }
            Err(e) => {
                soft_failure(&tab.id, "content extraction", &e);
                Ok(None)
            }
        }
    }

    /// Returns whether a summary was stored, and the summary itself.
    /// Categorization fails independently of summarization.
    async fn ai_stage(
        &self,
        tab: &Tab,
        content: &str,
    ) -> Result<(bool, Option<String>), PipelineError> {
        let assistant = self.providers.assistant.as_ref();
        let policy = RetryOptions::ai();
        let timeout = self.config.provider_timeout;

        let summarize = self.guarded(&self.breakers.assistant, &policy, timeout, || {
            assistant.summarize(&tab.url, content)
        });
        let categorize = self.guarded(&self.breakers.assistant, &policy, timeout, || {
            assistant.categorize(&tab.url, content)
        });
        let (summary, category) = tokio::join!(summarize, categorize);

        let mut update = TabUpdate::default();
        let summary = match summary {
            Ok(s) => {
                update.summary = Some(s.summary.clone());
                update.tags = Some(s.tags);
                Some(s.summary)
            }
            Err(e) => {
                soft_failure(&tab.id, "summarize", &e);
                None
            }
        };
        match category {
            Ok(c) => update.category = Some(c),
            Err(e) => soft_failure(&tab.id, "categorize", &e),
        }

        self.store(&tab.id, &update).await?;
        Ok((summary.is_some(), summary))
    }

    async fn embedding_stage(&self, tab: &Tab, input: &str) -> Result<bool, PipelineError> {
        let embedder = self.providers.embedder.as_ref();
        let result = self
            .guarded(
                &self.breakers.embedder,
                &RetryOptions::ai(),
                self.config.provider_timeout,
                || embedder.embed(input, EmbeddingTask::RetrievalDocument),
            )
            .await;

        match result {
            Ok(vector) if !vector.is_empty() => {
                let update = TabUpdate {
                    embedding: Some(vector),
                    ..Default::default()
                };
                self.store(&tab.id, &update).await?;
                Ok(true)
            }
            Ok(_) => {
                soft_failure(
                    &tab.id,
                    "embedding",
                    &ProviderError::InvalidResponse("empty embedding".into()),
                );
                Ok(false)
            }
            Err(e) => {
                soft_failure(&tab.id, "embedding", &e);
                Ok(false)
            }
        }
    }

    /// Retry policy around the provider's breaker around a per-call timeout.
    async fn guarded<T, F, Fut>(
        &self,
        breaker: &CircuitBreaker,
        policy: &RetryOptions<ProviderError>,
        timeout: Duration,
        operation: F,
    ) -> Result<T, ProviderError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let operation = &operation;
        retry(
            move || async move {
                breaker
                    .call(move || async move {
                        match tokio::time::timeout(timeout, operation()).await {
                            Ok(result) => result,
                            Err(_) => Err(ProviderError::Timeout(timeout)),
                        }
                    })
                    .await
                    .map_err(ProviderError::from)
            },
            policy,
        )
        .await
    }

    /// Persist a stage's fields. A vanished tab is tolerated.
    async fn store(&self, id: &TabId, update: &TabUpdate) -> Result<(), PipelineError> {
        if update.is_empty() {
            return Ok(());
        }
        let rows = self.repository.update_tab(id, update).await?;
        if rows == 0 {
            tracing::warn!(tab_id = %id, "update affected 0 rows, tab was probably deleted");
        }
        Ok(())
    }
}

fn soft_failure(id: &TabId, stage: &'static str, error: &ProviderError) {
    tracing::warn!(tab_id = %id, stage, error = %error, "enrichment stage failed");
}

/// Title, summary and the start of the page text, in that order. Falls back
/// to the URL when nothing else is known.
pub fn compose_embedding_input(
    title: Option<&str>,
    summary: Option<&str>,
    content: &str,
    url: &str,
    max_content_chars: usize,
) -> String {
    let content = truncate_chars(content.trim(), max_content_chars);
    let parts: Vec<&str> = [title, summary, Some(content.as_str())]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();

    if parts.is_empty() {
        url.to_string()
    } else {
        parts.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::enrichment::providers::{
        MockAssistant, MockContentExtractor, MockScreenshotProvider,
    };
    use crate::domain::search::embedder::MockEmbedder;
    use crate::repositories::MemoryTabStore;

    struct Fixture {
        store: MemoryTabStore,
        screenshots: MockScreenshotProvider,
        content: MockContentExtractor,
        assistant: MockAssistant,
        embedder: MockEmbedder,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: MemoryTabStore::new(),
                screenshots: MockScreenshotProvider::new(),
                content: MockContentExtractor::returning("Stripe Docs", "Accept payments online."),
                assistant: MockAssistant::new("Payments API docs", "Finance"),
                embedder: MockEmbedder::returning(vec![0.1, 0.2, 0.3]),
            }
        }

        fn pipeline(&self) -> EnrichmentPipeline {
            EnrichmentPipeline::new(
                Arc::new(self.store.clone()),
                Providers {
                    screenshots: Arc::new(self.screenshots.clone()),
                    content: Arc::new(self.content.clone()),
                    assistant: Arc::new(self.assistant.clone()),
                    embedder: Arc::new(self.embedder.clone()),
                },
                PipelineConfig::default(),
            )
        }

        async fn seed(&self, id: &str) -> TabId {
            self.store
                .insert(Tab::new(id, "owner", "https://stripe.com/docs"))
                .await;
            TabId::new(id)
        }
    }

    fn owner() -> OwnerId {
        OwnerId::new("owner")
    }

    #[tokio::test(start_paused = true)]
    async fn full_run_stores_every_stage() {
        let fx = Fixture::new();
        let id = fx.seed("t1").await;

        let outcome = fx.pipeline().process_tab(&id, &owner(), ProcessType::FULL).await;

        assert!(outcome.is_success());
        assert_eq!(
            outcome.updates,
            StageFlags {
                screenshots: true,
                ai: true,
                embeddings: true
            }
        );
        let tab = fx.store.get(&id).await.unwrap();
        assert_eq!(tab.title.as_deref(), Some("Stripe Docs"));
        assert_eq!(tab.summary.as_deref(), Some("Payments API docs"));
        assert_eq!(tab.category.as_deref(), Some("Finance"));
        assert!(tab.thumbnail_url.is_some());
        assert_eq!(tab.embedding, Some(vec![0.1, 0.2, 0.3]));
    }

    #[tokio::test(start_paused = true)]
    async fn screenshot_failure_is_soft() {
        let mut fx = Fixture::new();
        fx.screenshots = MockScreenshotProvider::failing(ProviderError::UnresolvableHost(
            "stripe.com".into(),
        ));
        let id = fx.seed("t1").await;

        let outcome = fx.pipeline().process_tab(&id, &owner(), ProcessType::FULL).await;

        assert!(outcome.is_success());
        assert!(!outcome.updates.screenshots);
        assert!(outcome.updates.ai);
        assert!(outcome.updates.embeddings);
        // Unresolvable hosts are never retried.
        assert_eq!(fx.screenshots.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let mut fx = Fixture::new();
        fx.screenshots = MockScreenshotProvider::failing_times(2, ProviderError::Network("reset".into()));
        let id = fx.seed("t1").await;

        let process: ProcessType = "screenshots".parse().unwrap();
        let outcome = fx.pipeline().process_tab(&id, &owner(), process).await;

        assert!(outcome.updates.screenshots);
        assert_eq!(fx.screenshots.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn embedding_input_uses_title_summary_and_content() {
        let fx = Fixture::new();
        let id = fx.seed("t1").await;

        fx.pipeline().process_tab(&id, &owner(), ProcessType::FULL).await;

        let calls = fx.embedder.calls();
        assert_eq!(calls.len(), 1);
        let (input, task) = &calls[0];
        assert_eq!(*task, EmbeddingTask::RetrievalDocument);
        assert_eq!(input, "Stripe Docs\n\nPayments API docs\n\nAccept payments online.");
    }

    #[tokio::test(start_paused = true)]
    async fn content_failure_falls_back_to_existing_fields() {
        let mut fx = Fixture::new();
        fx.content = MockContentExtractor::failing(ProviderError::Http {
            status: 404,
            message: "not found".into(),
        });
        let mut tab = Tab::new("t1", "owner", "https://stripe.com/docs");
        tab.title = Some("Saved title".into());
        fx.store.insert(tab).await;

        let process: ProcessType = "embeddings".parse().unwrap();
        let outcome = fx
            .pipeline()
            .process_tab(&TabId::new("t1"), &owner(), process)
            .await;

        assert!(outcome.updates.embeddings);
        assert_eq!(fx.content.call_count(), 1);
        assert_eq!(fx.embedder.calls()[0].0, "Saved title");
        assert_eq!(fx.screenshots.call_count(), 0);
        assert_eq!(fx.assistant.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_assistant_is_not_retried() {
        let mut fx = Fixture::new();
        fx.assistant = MockAssistant::failing(ProviderError::RateLimited("429".into()));
        let id = fx.seed("t1").await;

        let process: ProcessType = "ai".parse().unwrap();
        let outcome = fx.pipeline().process_tab(&id, &owner(), process).await;

        assert!(outcome.is_success());
        assert!(!outcome.updates.ai);
        // One summarize call and one categorize call.
        assert_eq!(fx.assistant.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_tab_is_a_hard_failure() {
        let fx = Fixture::new();
        let outcome = fx
            .pipeline()
            .process_tab(&TabId::new("nope"), &owner(), ProcessType::FULL)
            .await;

        assert!(!outcome.is_success());
        assert!(outcome.error.unwrap().contains("not found"));
        assert_eq!(fx.screenshots.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn open_breaker_skips_provider_calls() {
        let mut fx = Fixture::new();
        fx.screenshots = MockScreenshotProvider::failing(ProviderError::Http {
            status: 503,
            message: "down".into(),
        });
        let pipeline = fx.pipeline();
        let process: ProcessType = "screenshots".parse().unwrap();

        // Two tabs with three attempts each: the breaker opens at five failures.
        for id in ["a", "b"] {
            let id = fx.seed(id).await;
            pipeline.process_tab(&id, &owner(), process).await;
        }
        assert_eq!(fx.screenshots.call_count(), 5);

        let id = fx.seed("c").await;
        let outcome = pipeline.process_tab(&id, &owner(), process).await;
        assert!(outcome.is_success());
        assert!(!outcome.updates.screenshots);
        assert_eq!(fx.screenshots.call_count(), 5);
    }

    #[test]
    fn embedding_input_truncates_content_and_falls_back_to_url() {
        let long = "x".repeat(5_000);
        let input = compose_embedding_input(Some("T"), None, &long, "https://a.b", 2_000);
        assert_eq!(input.chars().count(), 1 + 2 + 2_000);

        assert_eq!(
            compose_embedding_input(None, Some("  "), "", "https://a.b", 2_000),
            "https://a.b"
        );
    }
}
