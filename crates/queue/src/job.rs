//! Envelope stored in the queue around each [`Job`].

use serde::{Deserialize, Serialize};
use vitrine_federation::Job;

/// A job and how many times it has been tried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedJob {
    pub job: Job,
    /// Attempts already made, 0 for a fresh job.
    pub attempt: u32,
    pub max_attempts: u32,
}

impl QueuedJob {
    /// A fresh job. A ceiling of 0 is treated as 1.
    #[must_use]
    pub fn new(job: Job, max_attempts: usize) -> Self {
        Self {
            job,
            attempt: 0,
            max_attempts: u32::try_from(max_attempts).unwrap_or(u32::MAX).max(1),
        }
    }

    /// The same job, one attempt further along.
    #[must_use]
    pub fn next_attempt(self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self
        }
    }
}
