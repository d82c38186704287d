//! Reject activity processor.

use tracing::info;
use vitrine_common::AppResult;

use super::{ProcessOutcome, Services, accept::answered_follow};
use crate::activities::{Activity, ObjectRef};

/// Processor for Reject(Follow) activities.
#[derive(Clone)]
pub struct RejectProcessor {
    s: Services,
}

impl RejectProcessor {
    pub(crate) const fn new(services: Services) -> Self {
        Self { s: services }
    }

    pub async fn process(&self, activity: &Activity, object: &ObjectRef) -> AppResult<ProcessOutcome> {
        let Some(row) = answered_follow(&self.s, activity, object).await? else {
            return Ok(ProcessOutcome::NoOp);
        };

        self.s.ctx.stores.follows.delete_follow(row.id).await?;
        self.s.recount_follow(row.source_id, row.target_id).await?;

        info!(follow = row.id, by = %activity.actor(), "Follow rejected");
        Ok(ProcessOutcome::Applied)
    }
}
