//! In-process job queue for deployments without Redis.
//!
//! Jobs live in a channel and are lost on restart. A fixed number of workers
//! drain it with the same retry policy as the Redis worker.
//!
//! The channel is unbounded: running jobs enqueue their follow-ups onto it,
//! and a worker must never wait for room while it holds a worker slot.

use std::{future::Future, sync::Arc};

use async_trait::async_trait;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, error, info};
use vitrine_common::{AppError, AppResult};
use vitrine_federation::{Job, JobExecutor, JobQueue};

use crate::{
    job::QueuedJob,
    retry::{NextStep, RetryConfig, run_attempt},
};

/// Sending half of the in-process queue.
#[derive(Clone)]
pub struct LocalJobQueue {
    sender: mpsc::UnboundedSender<QueuedJob>,
}

impl LocalJobQueue {
    /// A queue and the receiver to hand to [`LocalWorkerPool::new`].
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<QueuedJob>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn push(&self, job: QueuedJob) -> AppResult<()> {
        self.sender
            .send(job)
            .map_err(|_| AppError::Queue("local worker pool has stopped".to_string()))
    }
}

#[async_trait]
impl JobQueue for LocalJobQueue {
    async fn enqueue(&self, job: Job, max_attempts: usize) -> AppResult<()> {
        let name = job.name();
        self.push(QueuedJob::new(job, max_attempts))?;
        debug!(job = name, "Queued job");
        Ok(())
    }
}

/// Bounded pool of workers executing jobs from a [`LocalJobQueue`].
pub struct LocalWorkerPool {
    jobs: mpsc::UnboundedReceiver<QueuedJob>,
    queue: LocalJobQueue,
    executor: JobExecutor,
    retry: RetryConfig,
    concurrency: usize,
}

impl LocalWorkerPool {
    #[must_use]
    pub fn new(
        jobs: mpsc::UnboundedReceiver<QueuedJob>,
        queue: LocalJobQueue,
        executor: JobExecutor,
        retry: RetryConfig,
        concurrency: usize,
    ) -> Self {
        Self {
            jobs,
            queue,
            executor,
            retry,
            concurrency: concurrency.clamp(1, Semaphore::MAX_PERMITS),
        }
    }

    /// Execute jobs until `shutdown` resolves, then wait for the jobs in
    /// flight. Retries still waiting out their backoff are abandoned.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) {
        let permits = Arc::new(Semaphore::new(self.concurrency));
        info!(concurrency = self.concurrency, "Local worker pool started");

        tokio::pin!(shutdown);
        loop {
            // Take a worker slot first so no job sits outside the queue
            // waiting for one.
            let permit = tokio::select! {
                () = &mut shutdown => break,
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            let job = tokio::select! {
                () = &mut shutdown => break,
                job = self.jobs.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            let executor = self.executor.clone();
            let retry = self.retry.clone();
            let queue = self.queue.clone();
            tokio::spawn(async move {
                let next = run_attempt(&executor, &job, &retry).await;
                drop(permit);

                if let NextStep::Retry { delay, .. } = next {
                    tokio::time::sleep(delay).await;
                    if let Err(e) = queue.push(job.next_attempt()) {
                        error!(error = %e, "Failed to requeue job");
                    }
                }
            });
        }

        let all = u32::try_from(self.concurrency).unwrap_or(u32::MAX);
        let _in_flight = permits.acquire_many(all).await;
        info!("Local worker pool stopped");
    }
}
