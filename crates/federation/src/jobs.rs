//! Background jobs and the queue they are pushed onto.
//!
//! Everything that does not decide the status code of an inbox response runs
//! as a [`Job`]. The federation core only sees the [`JobQueue`] trait; the
//! queue crate provides Redis and in-process implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use vitrine_common::AppResult;
use vitrine_db::entities::notification::NotificationKind;

/// Deliver one signed activity to one inbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliverJob {
    /// Local actor whose key signs the request.
    pub signing_actor_id: i64,
    pub inbox: String,
    pub activity: Value,
}

/// Apply an activity that already passed signature verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboxJob {
    pub activity: Value,
}

/// Put a status on the home timelines of its author's local followers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanoutJob {
    pub status_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyJob {
    pub recipient_id: i64,
    pub actor_id: i64,
    pub kind: NotificationKind,
    pub status_id: Option<i64>,
    pub context_status_id: Option<i64>,
}

/// Re-check that an actor's profile page is on its own host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateProfileUrlJob {
    pub actor_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Job {
    Deliver(DeliverJob),
    Inbox(InboxJob),
    LocalFanout(FanoutJob),
    Notify(NotifyJob),
    ValidateProfileUrl(ValidateProfileUrlJob),
}

impl Job {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Deliver(_) => "deliver",
            Self::Inbox(_) => "inbox",
            Self::LocalFanout(_) => "local_fanout",
            Self::Notify(_) => "notify",
            Self::ValidateProfileUrl(_) => "validate_profile_url",
        }
    }
}

/// Durable job queue.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue `job`, to be attempted at most `max_attempts` times.
    async fn enqueue(&self, job: Job, max_attempts: usize) -> AppResult<()>;
}

/// Queue that only records what was enqueued.
#[derive(Debug, Default)]
pub struct InMemoryJobQueue {
    jobs: Mutex<Vec<(Job, usize)>>,
}

impl InMemoryJobQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything enqueued so far, oldest first.
    pub async fn jobs(&self) -> Vec<Job> {
        self.jobs.lock().await.iter().map(|(job, _)| job.clone()).collect()
    }

    /// Remove and return everything enqueued so far.
    pub async fn drain(&self) -> Vec<Job> {
        self.jobs.lock().await.drain(..).map(|(job, _)| job).collect()
    }

    pub async fn deliveries(&self) -> Vec<DeliverJob> {
        self.jobs
            .lock()
            .await
            .iter()
            .filter_map(|(job, _)| match job {
                Job::Deliver(deliver) => Some(deliver.clone()),
                _ => None,
            })
            .collect()
    }

    /// Attempt ceilings jobs were enqueued with.
    pub async fn attempt_limits(&self) -> Vec<usize> {
        self.jobs.lock().await.iter().map(|(_, max)| *max).collect()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job: Job, max_attempts: usize) -> AppResult<()> {
        self.jobs.lock().await.push((job, max_attempts));
        Ok(())
    }
}
