//! Background enrichment: a bounded queue of batch jobs with pollable status.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::{mpsc, oneshot, Semaphore};

use super::orchestrator::{validate, BatchError, BatchOrchestrator};
use super::types::{BatchReport, Pacing, ProcessType};
use crate::domain::models::{BatchId, OwnerId, TabId};

/// Finished jobs are forgotten after this long.
const JOB_RETENTION: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum WorkerError {
    #[error(transparent)]
    Invalid(#[from] BatchError),
    #[error("enrichment queue is full")]
    QueueFull,
    #[error("enrichment worker has shut down")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
}

/// Progress of one background batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchJob {
    pub id: BatchId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_batch_id: Option<String>,
    pub owner_id: OwnerId,
    pub process_type: ProcessType,
    pub state: JobState,
    pub total: usize,
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub errors: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub finished_at: Option<OffsetDateTime>,
}

impl BatchJob {
    fn absorb(&mut self, report: &BatchReport) {
        self.processed = report.processed;
        self.successful = report.successful;
        self.failed = report.failed;
        self.errors = report.errors.clone();
    }
}

#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub tab_ids: Vec<TabId>,
    pub owner: OwnerId,
    pub process: ProcessType,
    pub pacing: Pacing,
    pub import_batch_id: Option<String>,
}

/// Returned by [`EnrichmentWorker::submit`]. Awaiting `done` yields the
/// final report; dropping it does not cancel the job.
pub struct JobHandle {
    pub id: BatchId,
    pub done: oneshot::Receiver<BatchReport>,
}

struct QueuedJob {
    id: BatchId,
    request: BatchRequest,
    done: oneshot::Sender<BatchReport>,
}

type JobRegistry = Arc<Mutex<HashMap<BatchId, BatchJob>>>;

/// Runs submitted batches in the background, at most `concurrency` at a time.
#[derive(Clone)]
pub struct EnrichmentWorker {
    sender: mpsc::Sender<QueuedJob>,
    jobs: JobRegistry,
}

impl EnrichmentWorker {
    /// Start the worker loop on the current runtime.
    pub fn spawn(orchestrator: BatchOrchestrator, concurrency: usize, queue_capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let jobs: JobRegistry = Arc::default();

        tokio::spawn(run_worker(
            orchestrator,
            receiver,
            Arc::new(Semaphore::new(concurrency.max(1))),
            jobs.clone(),
        ));

        Self { sender, jobs }
    }

    /// Validate and enqueue a batch without waiting for it to run.
    pub fn submit(&self, request: BatchRequest) -> Result<JobHandle, WorkerError> {
        validate(&request.tab_ids, &request.owner, request.process)?;

        let id = BatchId::generate();
        let job = BatchJob {
            id: id.clone(),
            import_batch_id: request.import_batch_id.clone(),
            owner_id: request.owner.clone(),
            process_type: request.process,
            state: JobState::Queued,
            total: request.tab_ids.len(),
            processed: 0,
            successful: 0,
            failed: 0,
            errors: vec![],
            created_at: OffsetDateTime::now_utc(),
            finished_at: None,
        };

        {
            let mut jobs = lock(&self.jobs);
            prune_finished(&mut jobs);
            jobs.insert(id.clone(), job);
        }

        let (done, receiver) = oneshot::channel();
        let queued = QueuedJob {
            id: id.clone(),
            request,
            done,
        };

        if let Err(e) = self.sender.try_send(queued) {
            lock(&self.jobs).remove(&id);
            return Err(match e {
                mpsc::error::TrySendError::Full(_) => WorkerError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => WorkerError::Closed,
            });
        }

        tracing::info!(batch_id = %id, "enrichment batch queued");
        Ok(JobHandle { id, done: receiver })
    }

    /// Current status of a job, if it is still known.
    pub fn job(&self, id: &BatchId) -> Option<BatchJob> {
        lock(&self.jobs).get(id).cloned()
    }
}

async fn run_worker(
    orchestrator: BatchOrchestrator,
    mut receiver: mpsc::Receiver<QueuedJob>,
    permits: Arc<Semaphore>,
    jobs: JobRegistry,
) {
    while let Some(job) = receiver.recv().await {
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        let orchestrator = orchestrator.clone();
        let jobs = jobs.clone();

        tokio::spawn(async move {
            let _permit = permit;
            run_job(&orchestrator, &jobs, job).await;
        });
    }
    tracing::info!("enrichment worker stopped");
}

async fn run_job(orchestrator: &BatchOrchestrator, jobs: &JobRegistry, job: QueuedJob) {
    let QueuedJob { id, request, done } = job;
    update(jobs, &id, |job| job.state = JobState::Running);

    let result = orchestrator
        .process_batch_with_progress(
            &request.tab_ids,
            &request.owner,
            request.process,
            request.pacing,
            |report| update(jobs, &id, |job| job.absorb(report)),
        )
        .await;

    match result {
        Ok(report) => {
            update(jobs, &id, |job| {
                job.absorb(&report);
                job.state = JobState::Completed;
                job.finished_at = Some(OffsetDateTime::now_utc());
            });
            let _ = done.send(report);
        }
        Err(e) => {
            tracing::error!(batch_id = %id, error = %e, "enrichment batch rejected");
            update(jobs, &id, |job| {
                job.errors = vec![e.to_string()];
                job.state = JobState::Failed;
                job.finished_at = Some(OffsetDateTime::now_utc());
            });
        }
    }
}

fn update(jobs: &JobRegistry, id: &BatchId, apply: impl FnOnce(&mut BatchJob)) {
    if let Some(job) = lock(jobs).get_mut(id) {
        apply(job);
    }
}

fn prune_finished(jobs: &mut HashMap<BatchId, BatchJob>) {
    let cutoff = OffsetDateTime::now_utc() - JOB_RETENTION;
    jobs.retain(|_, job| job.finished_at.map_or(true, |at| at > cutoff));
}

fn lock(jobs: &JobRegistry) -> MutexGuard<'_, HashMap<BatchId, BatchJob>> {
    jobs.lock().unwrap_or_else(PoisonError::into_inner)
}
