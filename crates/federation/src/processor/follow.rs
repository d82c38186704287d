//! Follow activity processor.

use chrono::Utc;
use tracing::info;
use vitrine_common::AppResult;
use vitrine_db::entities::{follow, notification::NotificationKind};

use super::{ProcessOutcome, Services, unresolved};
use crate::{
    activities::{Activity, ObjectRef},
    jobs::NotifyJob,
};

/// Processor for Follow activities aimed at local actors.
#[derive(Clone)]
pub struct FollowProcessor {
    s: Services,
}

impl FollowProcessor {
    pub(crate) const fn new(services: Services) -> Self {
        Self { s: services }
    }

    /// Process one Follow. An unknown local target is a no-op.
    pub async fn process(&self, activity: &Activity, object: &ObjectRef) -> AppResult<ProcessOutcome> {
        let Some(target) = self.s.local_actor(&object.id).await? else {
            return Ok(ProcessOutcome::NoOp);
        };

        if self.s.gate.is_blocked_by_user(activity.actor(), target.id).await? {
            return Ok(ProcessOutcome::skipped(format!(
                "{} blocks the domain of {}",
                target.username,
                activity.actor()
            )));
        }

        let follower = match self.s.actors.resolve(activity.actor()).await {
            Ok(actor) => actor,
            Err(e) => return unresolved(activity.actor(), e),
        };
        if follower.is_local {
            return Ok(ProcessOutcome::skipped(format!("{} is a local actor", follower.uri)));
        }

        let approved = !target.manually_approves_followers;
        let (row, created) = self
            .s
            .ctx
            .stores
            .follows
            .insert_follow(follow::Model {
                id: self.s.ctx.ids.generate(),
                source_id: follower.id,
                target_id: target.id,
                approved,
                activity_uri: Some(activity.id.clone()),
                created_at: Utc::now().into(),
            })
            .await?;

        if !created {
            // The remote side lost our Accept; answer the new Follow again.
            if row.approved {
                let resend = follow::Model {
                    activity_uri: Some(activity.id.clone()),
                    ..row
                };
                self.s.dispatcher.deliver_accept(&resend).await?;
            }
            return Ok(ProcessOutcome::NoOp);
        }

        self.s.recount_follow(follower.id, target.id).await?;

        self.s
            .notify(NotifyJob {
                recipient_id: target.id,
                actor_id: follower.id,
                kind: if approved {
                    NotificationKind::Follow
                } else {
                    NotificationKind::FollowRequest
                },
                status_id: None,
                context_status_id: None,
            })
            .await?;

        if approved {
            self.s.dispatcher.deliver_accept(&row).await?;
        }

        info!(
            follower = %follower.uri,
            target = %target.uri,
            approved,
            "Follow received"
        );
        Ok(ProcessOutcome::Applied)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{jobs::Job, processor::InboxProcessor, test_utils::TestContext};
    use serde_json::json;
    use vitrine_db::{
        ActorStore, FollowStore,
        entities::domain_block::{self, BlockScope},
    };

    const ALICE: &str = "https://remote.example/users/alice";

    fn follow_bob(id: &str) -> Activity {
        Activity::parse(json!({
            "id": id,
            "type": "Follow",
            "actor": ALICE,
            "object": "https://vitrine.example/users/bob",
        }))
        .unwrap()
    }

    async fn run(t: &TestContext, activity: &Activity) -> ProcessOutcome {
        InboxProcessor::new(t.ctx.clone())
            .process(activity)
            .await
            .unwrap()
            .remove(0)
    }

    #[tokio::test]
    async fn test_follow_is_auto_approved_and_accepted() {
        let t = TestContext::with_system_actor().await;
        t.seed_remote_actor(50, "alice", "remote.example").await;
        t.seed_local_actor(10, "bob").await;

        let outcome = run(&t, &follow_bob("https://remote.example/follows/1")).await;
        assert_eq!(outcome, ProcessOutcome::Applied);

        let row = t.store.find_follow(50, 10).await.unwrap().unwrap();
        assert!(row.approved);
        assert_eq!(t.store.find_actor(10).await.unwrap().unwrap().followers_count, 1);

        let deliveries = t.queue.deliveries().await;
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].inbox, "https://remote.example/users/alice/inbox");
        assert_eq!(deliveries[0].activity["type"], "Accept");
        assert_eq!(deliveries[0].activity["object"]["id"], "https://remote.example/follows/1");
        assert_eq!(deliveries[0].signing_actor_id, 10);

        assert!(t.queue.jobs().await.iter().any(|j| matches!(
            j,
            Job::Notify(NotifyJob { kind: NotificationKind::Follow, recipient_id: 10, .. })
        )));
    }

    #[tokio::test]
    async fn test_locked_account_gets_a_request() {
        let t = TestContext::with_system_actor().await;
        t.seed_remote_actor(50, "alice", "remote.example").await;
        let mut bob = t.seed_local_actor(10, "bob").await;
        bob.manually_approves_followers = true;
        t.store.upsert_actor(bob).await.unwrap();

        run(&t, &follow_bob("https://remote.example/follows/1")).await;

        let row = t.store.find_follow(50, 10).await.unwrap().unwrap();
        assert!(!row.approved);
        assert!(t.queue.deliveries().await.is_empty());
        assert!(t.queue.jobs().await.iter().any(|j| matches!(
            j,
            Job::Notify(NotifyJob { kind: NotificationKind::FollowRequest, .. })
        )));
    }

    #[tokio::test]
    async fn test_repeated_follow_resends_accept() {
        let t = TestContext::with_system_actor().await;
        t.seed_remote_actor(50, "alice", "remote.example").await;
        t.seed_local_actor(10, "bob").await;

        run(&t, &follow_bob("https://remote.example/follows/1")).await;
        let outcome = run(&t, &follow_bob("https://remote.example/follows/2")).await;
        assert_eq!(outcome, ProcessOutcome::NoOp);
        assert_eq!(t.store.follow_count().await, 1);

        let deliveries = t.queue.deliveries().await;
        assert_eq!(deliveries.len(), 2);
        assert_eq!(deliveries[1].activity["object"]["id"], "https://remote.example/follows/2");
    }

    #[tokio::test]
    async fn test_unknown_target_is_noop() {
        let t = TestContext::with_system_actor().await;
        t.seed_remote_actor(50, "alice", "remote.example").await;

        let outcome = run(&t, &follow_bob("https://remote.example/follows/1")).await;
        assert_eq!(outcome, ProcessOutcome::NoOp);
        assert_eq!(t.store.follow_count().await, 0);
    }

    #[tokio::test]
    async fn test_user_domain_block_skips_follow() {
        let t = TestContext::with_system_actor().await;
        t.seed_remote_actor(50, "alice", "remote.example").await;
        t.seed_local_actor(10, "bob").await;
        t.store
            .add_domain_block(domain_block::Model {
                id: 1,
                domain: "remote.example".to_string(),
                scope: BlockScope::User,
                owner_id: Some(10),
                created_at: Utc::now().into(),
            })
            .await;

        let outcome = run(&t, &follow_bob("https://remote.example/follows/1")).await;
        assert!(matches!(outcome, ProcessOutcome::Skipped(_)));
        assert_eq!(t.store.follow_count().await, 0);
    }
}
