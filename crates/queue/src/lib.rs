//! Background job queue for vitrine.
//!
//! Two [`JobQueue`](vitrine_federation::JobQueue) implementations share one
//! retry policy:
//!
//! - **Redis**: jobs pushed to apalis storage and run by [`job_worker`]
//! - **Local**: an in-process bounded worker pool, used without Redis
//!
//! Transient failures are retried with exponential backoff until the job's
//! attempt ceiling, then dropped with an error log.

pub mod job;
pub mod local;
pub mod redis_queue;
pub mod retry;

pub use job::QueuedJob;
pub use local::{LocalJobQueue, LocalWorkerPool};
pub use redis_queue::{ApalisJobQueue, WorkerContext, job_worker};
pub use retry::{NextStep, RetryConfig, run_attempt};
