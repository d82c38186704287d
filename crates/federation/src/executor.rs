//! Job execution.
//!
//! Queue backends hand every dequeued [`Job`] to [`JobExecutor::execute`].
//! An `Err` is retried when [`AppError::is_retryable`] says so, and dropped
//! otherwise.

use std::sync::Arc;

use tracing::{debug, warn};
use vitrine_common::{AppError, AppResult};

use crate::{
    activities::Activity,
    context::FederationContext,
    delivery::DeliveryExecutor,
    fanout::TimelineFanout,
    jobs::Job,
    notifications::Notifier,
    processor::InboxProcessor,
    resolver::ActorResolver,
};

#[derive(Clone)]
pub struct JobExecutor {
    inbox: InboxProcessor,
    delivery: DeliveryExecutor,
    fanout: TimelineFanout,
    notifier: Notifier,
    actors: ActorResolver,
}

impl JobExecutor {
    #[must_use]
    pub fn new(ctx: Arc<FederationContext>) -> Self {
        Self {
            inbox: InboxProcessor::new(ctx.clone()),
            delivery: DeliveryExecutor::new(ctx.clone()),
            fanout: TimelineFanout::new(ctx.clone()),
            notifier: Notifier::new(ctx.clone()),
            actors: ActorResolver::new(ctx),
        }
    }

    pub async fn execute(&self, job: &Job) -> AppResult<()> {
        debug!(job = job.name(), "Executing job");
        match job {
            Job::Inbox(inbox) => {
                let activity = Activity::parse(inbox.activity.clone()).map_err(|e| {
                    warn!(error = %e, "Queued activity no longer parses");
                    AppError::from(e)
                })?;
                self.inbox.process(&activity).await?;
            }
            Job::Deliver(deliver) => {
                self.delivery.execute(deliver).await?;
            }
            Job::LocalFanout(fanout) => {
                self.fanout.fan_out(fanout.status_id).await?;
            }
            Job::Notify(notify) => {
                self.notifier.notify(notify).await?;
            }
            Job::ValidateProfileUrl(validate) => {
                self.actors.validate_profile_url(validate.actor_id).await?;
            }
        }
        Ok(())
    }
}
