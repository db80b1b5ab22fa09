use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    error::GradeError,
    grade::{FailureKind, Grade},
    resilient::ResilientInvoker,
};

use super::job::Job;
use super::summary::BatchSummary;

const DEFAULT_MAX_WORKERS: usize = 4;
const DEFAULT_BATCH_SIZE: usize = 5;
const DEFAULT_INTER_BATCH_WAIT: Duration = Duration::from_secs(5);

/// Fans prompts out over a bounded worker pool and returns grades in input order.
///
/// Every call returns exactly one [`Grade`] per prompt. Per-row failures,
/// including a panicking worker, are recorded in their slot and never abort the
/// rest of the batch.
pub struct BatchEvaluator {
    invoker: Arc<ResilientInvoker>,
    max_workers: usize,
    batch_size: usize,
    inter_batch_wait: Duration,
    cancel: CancellationToken,
}

impl BatchEvaluator {
    pub fn new(invoker: Arc<ResilientInvoker>) -> Self {
        Self {
            invoker,
            max_workers: DEFAULT_MAX_WORKERS,
            batch_size: DEFAULT_BATCH_SIZE,
            inter_batch_wait: DEFAULT_INTER_BATCH_WAIT,
            cancel: CancellationToken::new(),
        }
    }

    /// Worker count used by [`evaluate`](Self::evaluate). Zero is treated as one.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// Prompts per request in batched mode. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_inter_batch_wait(mut self, wait: Duration) -> Self {
        self.inter_batch_wait = wait;
        self
    }

    /// Uses `token` to stop submitting work. Rows not yet started when it fires
    /// are graded `Failed { Cancelled }`.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn invoker(&self) -> &Arc<ResilientInvoker> {
        &self.invoker
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Evaluates `prompts` with the configured worker count.
    pub async fn evaluate<S: AsRef<str>>(&self, prompts: &[S]) -> Vec<Grade> {
        self.evaluate_all(prompts, self.max_workers).await
    }

    /// Evaluates every prompt with at most `max_workers` in flight.
    ///
    /// The pool never grows past one worker per prompt.
    pub async fn evaluate_all<S: AsRef<str>>(
        &self,
        prompts: &[S],
        max_workers: usize,
    ) -> Vec<Grade> {
        let workers = max_workers.clamp(1, prompts.len().max(1));
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut handles: Vec<Option<JoinHandle<Grade>>> = Vec::with_capacity(prompts.len());

        log::debug!("dispatching {} prompts over {workers} workers", prompts.len());

        for (index, prompt) in prompts.iter().enumerate() {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                log::info!("batch cancelled, {} rows not submitted", prompts.len() - index);
                handles.resize_with(prompts.len(), || None);
                break;
            };

            let job = Job::new(index, prompt.as_ref());
            let invoker = Arc::clone(&self.invoker);
            handles.push(Some(tokio::spawn(async move {
                let _permit = permit;
                job.run(&invoker).await
            })));
        }

        let grades = join_all(handles.into_iter().enumerate().map(|(index, handle)| async move {
            match handle {
                Some(handle) => handle.await.unwrap_or_else(|err| {
                    log::warn!("worker for row {index} stopped: {err}");
                    Grade::Failed {
                        kind: FailureKind::Internal,
                        message: format!("worker stopped: {err}"),
                    }
                }),
                None => Grade::failed(&GradeError::Cancelled),
            }
        }))
        .await;

        BatchSummary::from_grades(&grades).log();
        grades
    }

    /// Evaluates prompts `batch_size` at a time, one request per chunk, pausing
    /// `inter_batch_wait` between chunks.
    pub async fn evaluate_batched<S: AsRef<str>>(&self, prompts: &[S]) -> Vec<Grade> {
        let mut grades = Vec::with_capacity(prompts.len());
        let chunks = prompts.chunks(self.batch_size);
        let total_chunks = chunks.len();

        for (chunk_idx, chunk) in chunks.enumerate() {
            if chunk_idx > 0 && !self.pause_between_chunks().await {
                break;
            }
            if self.cancel.is_cancelled() {
                break;
            }
            log::debug!(
                "evaluating chunk {}/{total_chunks} ({} prompts)",
                chunk_idx + 1,
                chunk.len()
            );
            grades.extend(self.invoker.invoke_batch(chunk).await);
        }

        if grades.len() < prompts.len() {
            log::info!(
                "batch cancelled, {} rows not submitted",
                prompts.len() - grades.len()
            );
            grades.resize_with(prompts.len(), || Grade::failed(&GradeError::Cancelled));
        }

        BatchSummary::from_grades(&grades).log();
        grades
    }

    /// Returns false when cancelled during the pause.
    async fn pause_between_chunks(&self) -> bool {
        if self.inter_batch_wait.is_zero() {
            return !self.cancel.is_cancelled();
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.inter_batch_wait) => true,
        }
    }
}
