//! Like activity processor.

use chrono::Utc;
use tracing::info;
use vitrine_common::AppResult;
use vitrine_db::entities::{favourite, notification::NotificationKind};

use super::{ProcessOutcome, Services, unresolved};
use crate::{
    activities::{Activity, ObjectRef},
    jobs::NotifyJob,
};

/// Processor for Like activities.
#[derive(Clone)]
pub struct LikeProcessor {
    s: Services,
}

impl LikeProcessor {
    pub(crate) const fn new(services: Services) -> Self {
        Self { s: services }
    }

    pub async fn process(&self, activity: &Activity, object: &ObjectRef) -> AppResult<ProcessOutcome> {
        let Some(status) = self.s.statuses.find_local(&object.id).await? else {
            return Ok(ProcessOutcome::skipped(format!("{} is not known here", object.id)));
        };

        let liker = match self.s.actors.resolve(activity.actor()).await {
            Ok(actor) => actor,
            Err(e) => return unresolved(activity.actor(), e),
        };

        let stores = &self.s.ctx.stores;
        let created = stores
            .favourites
            .insert_favourite(favourite::Model {
                id: self.s.ctx.ids.generate(),
                actor_id: liker.id,
                status_id: status.id,
                activity_uri: Some(activity.id.clone()),
                created_at: Utc::now().into(),
            })
            .await?;
        if !created {
            return Ok(ProcessOutcome::NoOp);
        }
        stores.statuses.recount_favourites(status.id).await?;

        let owner = stores.actors.find_actor(status.author_id).await?;
        if owner.is_some_and(|o| o.is_local) {
            self.s
                .notify(NotifyJob {
                    recipient_id: status.author_id,
                    actor_id: liker.id,
                    kind: NotificationKind::Favourite,
                    status_id: Some(status.id),
                    context_status_id: Some(status.thread_root()),
                })
                .await?;
        }

        info!(actor = %liker.uri, status = %status.uri, "Favourite received");
        Ok(ProcessOutcome::Applied)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{jobs::Job, processor::InboxProcessor, test_utils::TestContext};
    use serde_json::json;
    use vitrine_db::{NewStatus, StatusStore, test_utils};

    const ALICE: &str = "https://remote.example/users/alice";

    fn like(object: &str) -> Activity {
        Activity::parse(json!({
            "id": "https://remote.example/likes/1",
            "type": "Like",
            "actor": ALICE,
            "object": object,
        }))
        .unwrap()
    }

    async fn seed(t: &TestContext) {
        t.seed_remote_actor(50, "alice", "remote.example").await;
        let bob = t.seed_local_actor(10, "bob").await;
        t.store
            .insert_status(NewStatus {
                status: test_utils::status(100, bob.id, "https://vitrine.example/statuses/100", true),
                attachments: vec![test_utils::image_attachment(101, 100)],
                tags: vec![],
            })
            .await
            .unwrap();
        let mut reply = test_utils::status(110, bob.id, "https://vitrine.example/statuses/110", true);
        reply.reply_to_id = Some(100);
        reply.thread_root_id = Some(100);
        t.store
            .insert_status(NewStatus {
                status: reply,
                attachments: vec![],
                tags: vec![],
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_like_is_idempotent() {
        let t = TestContext::with_system_actor().await;
        seed(&t).await;
        let processor = InboxProcessor::new(t.ctx.clone());
        let activity = like("https://vitrine.example/statuses/100");

        assert_eq!(processor.process(&activity).await.unwrap(), vec![ProcessOutcome::Applied]);
        assert_eq!(processor.process(&activity).await.unwrap(), vec![ProcessOutcome::NoOp]);

        assert_eq!(t.store.favourite_count().await, 1);
        let status = t.store.find_status(100).await.unwrap().unwrap();
        assert_eq!(status.favourites_count, 1);
    }

    #[tokio::test]
    async fn test_like_notifies_with_thread_root() {
        let t = TestContext::with_system_actor().await;
        seed(&t).await;

        InboxProcessor::new(t.ctx.clone())
            .process(&like("https://vitrine.example/statuses/110"))
            .await
            .unwrap();

        assert_eq!(
            t.queue.jobs().await,
            vec![Job::Notify(NotifyJob {
                recipient_id: 10,
                actor_id: 50,
                kind: NotificationKind::Favourite,
                status_id: Some(110),
                context_status_id: Some(100),
            })]
        );
    }

    #[tokio::test]
    async fn test_like_of_unknown_status_is_skipped() {
        let t = TestContext::with_system_actor().await;
        seed(&t).await;

        let outcomes = InboxProcessor::new(t.ctx.clone())
            .process(&like("https://vitrine.example/statuses/404"))
            .await
            .unwrap();
        assert!(matches!(outcomes[0], ProcessOutcome::Skipped(_)));
        assert_eq!(t.store.favourite_count().await, 0);
    }

    #[tokio::test]
    async fn test_unresolvable_liker_is_skipped() {
        let t = TestContext::with_system_actor().await;
        seed(&t).await;

        let activity = Activity::parse(json!({
            "id": "https://other.example/likes/1",
            "type": "Like",
            "actor": "https://other.example/users/nobody",
            "object": "https://vitrine.example/statuses/100",
        }))
        .unwrap();
        let outcomes = InboxProcessor::new(t.ctx.clone()).process(&activity).await.unwrap();
        assert!(matches!(outcomes[0], ProcessOutcome::Skipped(_)));
    }
}
