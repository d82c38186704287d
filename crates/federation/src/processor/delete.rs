//! Delete activity processor.

use std::collections::BTreeSet;

use tracing::info;
use vitrine_common::AppResult;
use vitrine_db::entities::{actor, status};

use super::{ProcessOutcome, Services};
use crate::activities::{Activity, ObjectRef};

/// Processor for Delete activities targeting posts or actors.
#[derive(Clone)]
pub struct DeleteProcessor {
    s: Services,
}

impl DeleteProcessor {
    pub(crate) const fn new(services: Services) -> Self {
        Self { s: services }
    }

    /// Process one deleted object. A target this server never saw is a no-op.
    pub async fn process(&self, activity: &Activity, object: &ObjectRef) -> AppResult<ProcessOutcome> {
        let stores = &self.s.ctx.stores;

        if let Some(actor) = stores.actors.find_actor_by_uri(&object.id).await? {
            return self.delete_actor(activity, actor).await;
        }
        if let Some(status) = self.s.statuses.find_local(&object.id).await? {
            return self.delete_status(activity, status).await;
        }

        Ok(ProcessOutcome::NoOp)
    }

    async fn delete_actor(&self, activity: &Activity, actor: actor::Model) -> AppResult<ProcessOutcome> {
        if actor.is_local {
            return Ok(ProcessOutcome::skipped(format!("{} is a local actor", actor.uri)));
        }
        if actor.uri != activity.actor() {
            return Ok(ProcessOutcome::skipped(format!(
                "{} cannot delete {}",
                activity.actor(),
                actor.uri
            )));
        }

        let stores = &self.s.ctx.stores;

        // Collect what needs recounting before the cascade removes it.
        let mut actors = BTreeSet::new();
        for follow in stores.follows.follows_involving(actor.id).await? {
            actors.insert(if follow.source_id == actor.id {
                follow.target_id
            } else {
                follow.source_id
            });
        }
        let mut favourited = BTreeSet::new();
        for favourite in stores.favourites.favourites_by_actor(actor.id).await? {
            favourited.insert(favourite.status_id);
        }
        let mut replied = BTreeSet::new();
        let mut reblogged = BTreeSet::new();
        for status in stores.statuses.statuses_by_author(actor.id).await? {
            replied.extend(status.reply_to_id);
            reblogged.extend(status.reblog_of_id);
        }

        stores.actors.delete_actor(actor.id).await?;

        for id in actors {
            stores.actors.recount_follows(id).await?;
        }
        for id in favourited {
            stores.statuses.recount_favourites(id).await?;
        }
        for id in replied {
            stores.statuses.recount_replies(id).await?;
        }
        for id in reblogged {
            stores.statuses.recount_reblogs(id).await?;
        }

        info!(actor = %actor.uri, id = actor.id, "Deleted remote actor");
        Ok(ProcessOutcome::Applied)
    }

    async fn delete_status(
        &self,
        activity: &Activity,
        status: status::Model,
    ) -> AppResult<ProcessOutcome> {
        if status.is_local {
            return Ok(ProcessOutcome::skipped(format!("{} is a local status", status.uri)));
        }

        let stores = &self.s.ctx.stores;
        let author = stores.actors.find_actor(status.author_id).await?;
        if author.as_ref().map(|a| a.uri.as_str()) != Some(activity.actor()) {
            return Ok(ProcessOutcome::skipped(format!(
                "{} is not the author of {}",
                activity.actor(),
                status.uri
            )));
        }

        stores.statuses.delete_status(status.id).await?;
        stores.actors.recount_statuses(status.author_id).await?;
        if let Some(parent) = status.reply_to_id {
            stores.statuses.recount_replies(parent).await?;
        }
        if let Some(original) = status.reblog_of_id {
            stores.statuses.recount_reblogs(original).await?;
        }

        info!(status = %status.uri, id = status.id, "Deleted remote status");
        Ok(ProcessOutcome::Applied)
    }
}
