use std::{sync::Arc, time::Duration};

use futures::future::join_all;

use super::pipeline::EnrichmentPipeline;
use super::types::{BatchReport, Pacing, ProcessType};
use crate::domain::models::{OwnerId, TabId};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum BatchError {
    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Tabs in flight at once
    pub chunk_size: usize,
    pub max_reported_errors: usize,
    /// Pause between chunks under `Pacing::RateLimited`
    pub rate_limit_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: 5,
            max_reported_errors: 10,
            rate_limit_delay: Duration::from_secs(2),
        }
    }
}

/// Runs the pipeline over many tabs, one chunk at a time.
///
/// Tabs within a chunk run concurrently; the next chunk starts only after
/// every tab of the previous one has resolved.
#[derive(Clone)]
pub struct BatchOrchestrator {
    pipeline: Arc<EnrichmentPipeline>,
    config: BatchConfig,
}

impl BatchOrchestrator {
    pub fn new(pipeline: Arc<EnrichmentPipeline>, config: BatchConfig) -> Self {
        Self { pipeline, config }
    }

    pub async fn process_batch(
        &self,
        ids: &[TabId],
        owner: &OwnerId,
        process: ProcessType,
        pacing: Pacing,
    ) -> Result<BatchReport, BatchError> {
        self.process_batch_with_progress(ids, owner, process, pacing, |_| {})
            .await
    }

    /// Like [`process_batch`](Self::process_batch), calling `on_chunk` with
    /// the running report after each chunk.
    pub async fn process_batch_with_progress<F>(
        &self,
        ids: &[TabId],
        owner: &OwnerId,
        process: ProcessType,
        pacing: Pacing,
        mut on_chunk: F,
    ) -> Result<BatchReport, BatchError>
    where
        F: FnMut(&BatchReport),
    {
        validate(ids, owner, process)?;

        let chunk_size = self.config.chunk_size.max(1);
        let chunk_count = ids.len().div_ceil(chunk_size);
        let mut report = BatchReport::default();

        tracing::info!(
            owner = %owner,
            tabs = ids.len(),
            chunks = chunk_count,
            ?process,
            "starting enrichment batch"
        );

        for (index, chunk) in ids.chunks(chunk_size).enumerate() {
            if index > 0 && pacing == Pacing::RateLimited {
                tokio::time::sleep(self.config.rate_limit_delay).await;
            }

            let outcomes = join_all(
                chunk
                    .iter()
                    .map(|id| self.pipeline.process_tab(id, owner, process)),
            )
            .await;

            for outcome in outcomes {
                report.record(outcome, self.config.max_reported_errors);
            }

            tracing::debug!(
                chunk = index + 1,
                of = chunk_count,
                processed = report.processed,
                "chunk finished"
            );
            on_chunk(&report);
        }

        tracing::info!(
            processed = report.processed,
            successful = report.successful,
            failed = report.failed,
            "enrichment batch finished"
        );
        Ok(report)
    }
}

pub(crate) fn validate(ids: &[TabId], owner: &OwnerId, process: ProcessType) -> Result<(), BatchError> {
    if ids.is_empty() {
        return Err(BatchError::Validation("tabIds must not be empty".into()));
    }
    if ids.iter().any(TabId::is_blank) {
        return Err(BatchError::Validation("tabIds must not contain blank ids".into()));
    }
    if owner.is_blank() {
        return Err(BatchError::Validation("ownerId is required".into()));
    }
    if process.is_empty() {
        return Err(BatchError::Validation("processType selects no stages".into()));
    }
    Ok(())
}
