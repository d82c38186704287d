//! Retry policy with exponential backoff.

use std::time::Duration;

use tracing::{debug, error, warn};
use vitrine_common::AppError;
use vitrine_federation::JobExecutor;

use crate::job::QueuedJob;

/// Retry configuration with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(3600),
            multiplier: 4.0,
        }
    }
}

impl RetryConfig {
    /// Calculate delay before retrying after `attempt` failed (0-indexed).
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        if !delay_secs.is_finite() || delay_secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(delay_secs)
    }

    /// Decide what happens to `job` after one attempt ended in `result`.
    #[must_use]
    pub fn next_step(&self, job: &QueuedJob, result: Result<(), AppError>) -> NextStep {
        match result {
            Ok(()) => NextStep::Done,
            Err(e) if !e.is_retryable() => NextStep::Drop(e),
            Err(e) if job.attempt + 1 >= job.max_attempts => NextStep::Exhausted(e),
            Err(e) => NextStep::Retry {
                delay: self.delay_for_attempt(job.attempt),
                error: e,
            },
        }
    }
}

/// What to do with a job after an attempt.
#[derive(Debug)]
pub enum NextStep {
    Done,
    /// Failed in a way another attempt will not fix.
    Drop(AppError),
    /// Failed transiently on its last allowed attempt.
    Exhausted(AppError),
    Retry { delay: Duration, error: AppError },
}

/// Run one attempt of `job` and log how it ended.
pub async fn run_attempt(executor: &JobExecutor, job: &QueuedJob, retry: &RetryConfig) -> NextStep {
    let result = executor.execute(&job.job).await;
    let next = retry.next_step(job, result);

    let name = job.job.name();
    let attempt = job.attempt + 1;
    match &next {
        NextStep::Done => debug!(job = name, attempt, "Job completed"),
        NextStep::Drop(e) => warn!(job = name, attempt, error = %e, "Job failed permanently, dropping"),
        NextStep::Exhausted(e) => error!(
            job = name,
            attempts = attempt,
            error = %e,
            "Job exhausted its attempts, dropping"
        ),
        NextStep::Retry { delay, error } => warn!(
            job = name,
            attempt,
            retry_in_secs = delay.as_secs(),
            error = %error,
            "Job failed, will retry"
        ),
    }
    next
}
