//! Inbound activity processing.
//!
//! [`InboxProcessor`] dispatches a verified [`Activity`] by type. Every
//! object of a batched activity is handled on its own, so one bad object
//! never aborts its siblings.

#![allow(missing_docs)]

mod accept;
mod announce;
mod create;
mod delete;
mod follow;
mod like;
mod reject;
mod undo;

pub use accept::AcceptProcessor;
pub use announce::AnnounceProcessor;
pub use create::CreateProcessor;
pub use delete::DeleteProcessor;
pub use follow::FollowProcessor;
pub use like::LikeProcessor;
pub use reject::RejectProcessor;
pub use undo::UndoProcessor;

use std::sync::Arc;

use tracing::{debug, info, warn};
use vitrine_common::{AppError, AppResult};
use vitrine_db::entities::actor;

use crate::{
    activities::{Activity, ActivityType, ObjectRef},
    context::FederationContext,
    dispatcher::Dispatcher,
    domain_gate::DomainGate,
    jobs::{Job, NotifyJob},
    resolver::{ActorResolver, ResolveError, StatusResolver},
};

/// Result of handling one object of an activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Local state changed.
    Applied,
    /// A precondition did not hold; nothing changed.
    Skipped(String),
    /// Already in the requested state, or nothing to act on.
    NoOp,
}

impl ProcessOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped(reason.into())
    }
}

/// Collaborators every handler needs.
#[derive(Clone)]
pub(crate) struct Services {
    pub ctx: Arc<FederationContext>,
    pub actors: ActorResolver,
    pub statuses: StatusResolver,
    pub gate: DomainGate,
    pub dispatcher: Dispatcher,
}

impl Services {
    pub fn new(ctx: Arc<FederationContext>) -> Self {
        let actors = ActorResolver::new(ctx.clone());
        let statuses = StatusResolver::new(ctx.clone(), actors.clone());
        Self {
            gate: DomainGate::new(ctx.stores.domain_blocks.clone()),
            dispatcher: Dispatcher::new(ctx.clone()),
            ctx,
            actors,
            statuses,
        }
    }

    /// Local actor addressed by `uri`.
    pub async fn local_actor(&self, uri: &str) -> AppResult<Option<actor::Model>> {
        if !self.ctx.is_local_uri(uri) {
            return Ok(None);
        }
        Ok(self
            .ctx
            .stores
            .actors
            .find_actor_by_uri(uri)
            .await?
            .filter(|a| a.is_local))
    }

    /// Recount both sides of a follow edge.
    pub async fn recount_follow(&self, source_id: i64, target_id: i64) -> AppResult<()> {
        self.ctx.stores.actors.recount_follows(source_id).await?;
        self.ctx.stores.actors.recount_follows(target_id).await
    }

    pub async fn notify(&self, job: NotifyJob) -> AppResult<()> {
        self.ctx
            .queue
            .enqueue(Job::Notify(job), self.ctx.max_attempts())
            .await
    }

    pub async fn enqueue(&self, job: Job) -> AppResult<()> {
        self.ctx.queue.enqueue(job, self.ctx.max_attempts()).await
    }
}

/// Turn a resolution failure into a skip when the remote side is to blame.
pub(crate) fn unresolved(uri: &str, err: ResolveError) -> AppResult<ProcessOutcome> {
    if err.is_soft() {
        info!(object = %uri, reason = %err, "Skipping unresolvable object");
        Ok(ProcessOutcome::skipped(format!("{uri}: {err}")))
    } else {
        Err(err.into())
    }
}

/// Dispatches verified activities to the per-type processors.
#[derive(Clone)]
pub struct InboxProcessor {
    create: CreateProcessor,
    delete: DeleteProcessor,
    follow: FollowProcessor,
    accept: AcceptProcessor,
    reject: RejectProcessor,
    undo: UndoProcessor,
    like: LikeProcessor,
    announce: AnnounceProcessor,
}

impl InboxProcessor {
    #[must_use]
    pub fn new(ctx: Arc<FederationContext>) -> Self {
        let services = Services::new(ctx);
        Self {
            create: CreateProcessor::new(services.clone()),
            delete: DeleteProcessor::new(services.clone()),
            follow: FollowProcessor::new(services.clone()),
            accept: AcceptProcessor::new(services.clone()),
            reject: RejectProcessor::new(services.clone()),
            undo: UndoProcessor::new(services.clone()),
            like: LikeProcessor::new(services.clone()),
            announce: AnnounceProcessor::new(services),
        }
    }

    /// Process every object of `activity`.
    ///
    /// Returns one outcome per object. When any object failed, the first
    /// error is returned after all objects have been attempted.
    pub async fn process(&self, activity: &Activity) -> AppResult<Vec<ProcessOutcome>> {
        if let ActivityType::Unsupported(kind) = &activity.kind {
            debug!(activity = %activity.id, kind = %kind, "Ignoring unsupported activity");
            return Ok(Vec::new());
        }

        info!(
            activity = %activity.id,
            kind = activity.kind.as_str(),
            actor = %activity.actor(),
            objects = activity.objects.len(),
            "Processing activity"
        );

        let mut outcomes = Vec::with_capacity(activity.objects.len());
        let mut first_error: Option<AppError> = None;

        for object in &activity.objects {
            match self.process_object(activity, object).await {
                Ok(outcome) => {
                    if let ProcessOutcome::Skipped(reason) = &outcome {
                        warn!(activity = %activity.id, object = %object.id, reason = %reason, "Skipped object");
                    }
                    outcomes.push(outcome);
                }
                Err(e) => {
                    warn!(activity = %activity.id, object = %object.id, error = %e, "Failed to process object");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(outcomes),
        }
    }

    async fn process_object(
        &self,
        activity: &Activity,
        object: &ObjectRef,
    ) -> AppResult<ProcessOutcome> {
        match activity.kind {
            ActivityType::Create => self.create.process(activity, object).await,
            ActivityType::Delete => self.delete.process(activity, object).await,
            ActivityType::Follow => self.follow.process(activity, object).await,
            ActivityType::Accept => self.accept.process(activity, object).await,
            ActivityType::Reject => self.reject.process(activity, object).await,
            ActivityType::Undo => self.undo.process(activity, object).await,
            ActivityType::Like => self.like.process(activity, object).await,
            ActivityType::Announce => self.announce.process(activity, object).await,
            ActivityType::Unsupported(_) => Ok(ProcessOutcome::NoOp),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::TestContext;
    use serde_json::json;
    use vitrine_db::{NewStatus, StatusStore, test_utils};

    #[tokio::test]
    async fn test_unsupported_activity_is_ignored() {
        let t = TestContext::with_system_actor().await;
        let activity = Activity::parse(json!({
            "id": "https://remote.example/activities/1",
            "type": "Move",
            "actor": "https://remote.example/users/alice"
        }))
        .unwrap();

        let outcomes = InboxProcessor::new(t.ctx.clone()).process(&activity).await.unwrap();
        assert!(outcomes.is_empty());
        assert!(t.queue.jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_batch_siblings_are_independent() {
        let t = TestContext::with_system_actor().await;
        let alice = t.seed_remote_actor(50, "alice", "remote.example").await;
        let bob = t.seed_local_actor(10, "bob").await;
        let status = test_utils::status(100, bob.id, "https://vitrine.example/statuses/100", true);
        t.store
            .insert_status(NewStatus {
                status,
                attachments: vec![test_utils::image_attachment(101, 100)],
                tags: vec![],
            })
            .await
            .unwrap();

        let activity = Activity::parse(json!({
            "id": "https://remote.example/likes/1",
            "type": "Like",
            "actor": alice.uri,
            "object": [
                "https://vitrine.example/statuses/999",
                "https://vitrine.example/statuses/100"
            ]
        }))
        .unwrap();

        let outcomes = InboxProcessor::new(t.ctx.clone()).process(&activity).await.unwrap();
        assert!(matches!(outcomes[0], ProcessOutcome::Skipped(_)));
        assert_eq!(outcomes[1], ProcessOutcome::Applied);
        assert_eq!(t.store.favourite_count().await, 1);
    }
}
