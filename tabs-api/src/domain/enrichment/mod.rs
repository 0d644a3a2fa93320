//! Tab enrichment: screenshots, page content, AI summary and category, and
//! document embeddings, run per tab and in batches.
//!
//! # Architecture
//!
//! - [`EnrichmentPipeline`] - runs the requested stages for one tab, each
//!   provider call wrapped in retry, a circuit breaker and a timeout
//! - [`BatchOrchestrator`] - drives the pipeline over many tabs in chunks
//! - [`EnrichmentWorker`] - queues batches and runs them in the background
//!
//! Providers sit behind the ports in `traits` so tests can swap in mocks.
//!
//! # Example
//!
//! ```ignore
//! let pipeline = Arc::new(EnrichmentPipeline::new(repository, providers, PipelineConfig::default()));
//! let orchestrator = BatchOrchestrator::new(pipeline, BatchConfig::default());
//!
//! let report = orchestrator
//!     .process_batch(&ids, &owner, ProcessType::FULL, Pacing::RateLimited)
//!     .await?;
//! ```

mod orchestrator;
mod pipeline;
mod traits;
mod types;
mod worker;

pub mod providers;

pub use orchestrator::{BatchConfig, BatchError, BatchOrchestrator};
pub use pipeline::{compose_embedding_input, EnrichmentPipeline, PipelineConfig, PipelineError, Providers};
pub use traits::{Assistant, ContentExtractor, PageContent, ScreenshotProvider, Screenshots, Summary};
pub use types::{
    BatchReport, OutcomeStatus, Pacing, ProcessType, StageFlags, TabOutcome, UnknownStage,
};
pub use worker::{BatchJob, BatchRequest, EnrichmentWorker, JobHandle, JobState, WorkerError};
