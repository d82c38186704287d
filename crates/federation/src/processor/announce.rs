//! Announce (boost) activity processor.

use chrono::{DateTime, Utc};
use tracing::info;
use vitrine_common::AppResult;
use vitrine_db::{
    NewStatus,
    entities::{
        notification::NotificationKind,
        status::{self, Visibility},
    },
};

use super::{ProcessOutcome, Services, unresolved};
use crate::{
    activities::{Activity, ObjectRef},
    domain_gate::host_of,
    jobs::{FanoutJob, Job, NotifyJob},
    objects::ApNote,
};

/// Processor for Announce activities.
#[derive(Clone)]
pub struct AnnounceProcessor {
    s: Services,
}

impl AnnounceProcessor {
    pub(crate) const fn new(services: Services) -> Self {
        Self { s: services }
    }

    pub async fn process(&self, activity: &Activity, object: &ObjectRef) -> AppResult<ProcessOutcome> {
        let stores = &self.s.ctx.stores;

        let object_is_local = self.s.ctx.is_local_uri(&object.id);
        let followed = match self.s.actors.find_cached(activity.actor()).await? {
            Some(booster) => stores.follows.count_local_followers(booster.id).await? > 0,
            None => false,
        };
        if !object_is_local && !followed {
            return Ok(ProcessOutcome::skipped(format!(
                "{} has no local followers and {} is remote",
                activity.actor(),
                object.id
            )));
        }

        if stores.statuses.find_status_by_uri(&activity.id).await?.is_some() {
            return Ok(ProcessOutcome::NoOp);
        }

        let booster = match self.s.actors.resolve(activity.actor()).await {
            Ok(actor) => actor,
            Err(e) => return unresolved(activity.actor(), e),
        };

        let original = match self.boosted_status(activity, object).await {
            Ok(status) => status,
            Err(e) => return unresolved(&object.id, e),
        };
        if original.is_reblog() {
            return Ok(ProcessOutcome::skipped(format!("{} is itself a boost", original.uri)));
        }
        if original.visibility != Visibility::Public {
            return Ok(ProcessOutcome::skipped(format!("{} is not public", original.uri)));
        }
        if stores.statuses.attachments(original.id).await?.is_empty() {
            return Ok(ProcessOutcome::skipped(format!("{} has no attachments", original.uri)));
        }

        let published = activity
            .raw
            .get("published")
            .and_then(|p| serde_json::from_value::<DateTime<Utc>>(p.clone()).ok())
            .unwrap_or_else(Utc::now);
        let boost_id = self.s.ctx.ids.generate();
        let boost = stores
            .statuses
            .insert_status(NewStatus {
                status: status::Model {
                    id: boost_id,
                    uri: activity.id.clone(),
                    url: None,
                    is_local: false,
                    author_id: booster.id,
                    visibility: Visibility::Public,
                    content: String::new(),
                    content_warning: None,
                    sensitive: false,
                    reply_to_id: None,
                    thread_root_id: None,
                    reblog_of_id: Some(original.id),
                    favourites_count: 0,
                    reblogs_count: 0,
                    replies_count: 0,
                    created_at: published.into(),
                },
                attachments: Vec::new(),
                tags: Vec::new(),
            })
            .await?;
        if boost.id != boost_id {
            return Ok(ProcessOutcome::NoOp);
        }

        stores.statuses.recount_reblogs(original.id).await?;
        self.s
            .enqueue(Job::LocalFanout(FanoutJob { status_id: boost.id }))
            .await?;

        if original.is_local && original.author_id != booster.id {
            self.s
                .notify(NotifyJob {
                    recipient_id: original.author_id,
                    actor_id: booster.id,
                    kind: NotificationKind::Reblog,
                    status_id: Some(original.id),
                    context_status_id: None,
                })
                .await?;
        }

        info!(booster = %booster.uri, status = %original.uri, boost = boost.id, "Boost received");
        Ok(ProcessOutcome::Applied)
    }

    /// The boosted status. An inline copy is only trusted when it lives on
    /// the booster's host; anything else is fetched from its origin.
    async fn boosted_status(
        &self,
        activity: &Activity,
        object: &ObjectRef,
    ) -> Result<status::Model, crate::resolver::ResolveError> {
        let booster_host = host_of(activity.actor());
        if let Some(note) = object
            .inline
            .as_ref()
            .and_then(|body| serde_json::from_value::<ApNote>(body.clone()).ok())
            .filter(|note| booster_host.is_some() && host_of(note.id.as_str()) == booster_host)
        {
            return self.s.statuses.store_note(note).await.map(|(status, _)| status);
        }
        self.s.statuses.resolve(&object.id).await
    }
}
