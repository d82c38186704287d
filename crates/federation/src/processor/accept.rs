//! Accept activity processor.

use tracing::info;
use vitrine_common::{AppError, AppResult};
use vitrine_db::entities::follow;

use super::{ProcessOutcome, Services};
use crate::activities::{Activity, ObjectRef};

/// Processor for Accept(Follow) activities.
#[derive(Clone)]
pub struct AcceptProcessor {
    s: Services,
}

impl AcceptProcessor {
    pub(crate) const fn new(services: Services) -> Self {
        Self { s: services }
    }

    pub async fn process(&self, activity: &Activity, object: &ObjectRef) -> AppResult<ProcessOutcome> {
        let Some(row) = answered_follow(&self.s, activity, object).await? else {
            return Ok(ProcessOutcome::NoOp);
        };

        if !self.s.ctx.stores.follows.approve_follow(row.id).await? {
            return Ok(ProcessOutcome::NoOp);
        }
        self.s.recount_follow(row.source_id, row.target_id).await?;

        info!(follow = row.id, by = %activity.actor(), "Follow accepted");
        Ok(ProcessOutcome::Applied)
    }
}

/// The local actor's follow an Accept or Reject answers.
///
/// Looked up by the Follow's id first, then by the embedded follower and the
/// answering actor. Only the followed actor may answer.
pub(super) async fn answered_follow(
    s: &Services,
    activity: &Activity,
    object: &ObjectRef,
) -> AppResult<Option<follow::Model>> {
    if let Some(kind) = object.kind()
        && kind != "Follow"
    {
        return Err(AppError::BadRequest(format!(
            "{} object must be a Follow, got {kind}",
            activity.kind.as_str()
        )));
    }

    let stores = &s.ctx.stores;
    let Some(target) = stores.actors.find_actor_by_uri(activity.actor()).await? else {
        return Ok(None);
    };

    let row = match stores.follows.find_follow_by_activity(&object.id).await? {
        Some(row) => Some(row),
        None => match object.actor() {
            Some(follower_uri) => match s.local_actor(&follower_uri).await? {
                Some(follower) => stores.follows.find_follow(follower.id, target.id).await?,
                None => None,
            },
            None => None,
        },
    };

    Ok(row.filter(|r| r.target_id == target.id))
}
