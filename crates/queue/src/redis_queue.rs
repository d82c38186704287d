//! Redis-backed job queue, consumed by an apalis worker.

use std::{sync::Arc, time::Duration};

use apalis::prelude::*;
use apalis_redis::RedisStorage;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};
use vitrine_common::{AppError, AppResult, config::RedisConfig};
use vitrine_federation::{Job, JobExecutor, JobQueue};

use crate::{
    job::QueuedJob,
    retry::{NextStep, RetryConfig, run_attempt},
};

/// [`JobQueue`] pushing onto an apalis Redis storage.
#[derive(Clone)]
pub struct ApalisJobQueue {
    storage: RedisStorage<QueuedJob>,
}

impl ApalisJobQueue {
    #[must_use]
    pub const fn new(storage: RedisStorage<QueuedJob>) -> Self {
        Self { storage }
    }

    /// Connect to Redis, keeping jobs under the configured key prefix.
    pub async fn connect(config: &RedisConfig) -> AppResult<Self> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| AppError::Config(format!("invalid Redis URL: {e}")))?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::Queue(format!("failed to connect to Redis: {e}")))?;
        let storage_config = apalis_redis::Config::default().set_namespace(&config.prefix);

        info!(prefix = %config.prefix, "Connected to Redis job queue");
        Ok(Self::new(RedisStorage::new_with_config(conn, storage_config)))
    }

    /// Storage handle for the worker.
    #[must_use]
    pub fn storage(&self) -> RedisStorage<QueuedJob> {
        self.storage.clone()
    }

    async fn schedule(&self, job: QueuedJob, delay: Duration) -> AppResult<()> {
        let delay = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX);
        let run_at = Utc::now()
            .checked_add_signed(delay)
            .unwrap_or(chrono::DateTime::<Utc>::MAX_UTC);
        self.storage
            .clone()
            .schedule(job, run_at.timestamp())
            .await
            .map_err(|e| AppError::Queue(format!("failed to schedule job: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl JobQueue for ApalisJobQueue {
    async fn enqueue(&self, job: Job, max_attempts: usize) -> AppResult<()> {
        let name = job.name();
        self.storage
            .clone()
            .push(QueuedJob::new(job, max_attempts))
            .await
            .map_err(|e| AppError::Queue(format!("failed to queue job: {e}")))?;

        debug!(job = name, "Queued job");
        Ok(())
    }
}

/// Context for the job worker.
#[derive(Clone)]
pub struct WorkerContext {
    pub executor: JobExecutor,
    pub queue: ApalisJobQueue,
    pub retry: RetryConfig,
}

/// Worker function for every queued job.
///
/// Retries are scheduled back onto the queue with backoff, so apalis sees
/// the attempt that failed as finished.
///
/// # Errors
/// Returns an error if the job was dropped or could not be rescheduled.
pub async fn job_worker(job: QueuedJob, ctx: Data<WorkerContext>) -> Result<(), Error> {
    match run_attempt(&ctx.executor, &job, &ctx.retry).await {
        NextStep::Done => Ok(()),
        NextStep::Retry { delay, .. } => ctx
            .queue
            .schedule(job.next_attempt(), delay)
            .await
            .map_err(failed),
        NextStep::Drop(e) | NextStep::Exhausted(e) => Err(failed(e)),
    }
}

fn failed(e: AppError) -> Error {
    let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(e);
    Error::Failed(Arc::new(boxed))
}
