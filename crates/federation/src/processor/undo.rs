//! Undo activity processor.

use tracing::info;
use vitrine_common::AppResult;
use vitrine_db::entities::status;

use super::{ProcessOutcome, Services};
use crate::activities::{Activity, ObjectRef};

/// Processor for Undo of Follow, Like and Announce.
///
/// Undoing something that never happened here is a no-op.
#[derive(Clone)]
pub struct UndoProcessor {
    s: Services,
}

impl UndoProcessor {
    pub(crate) const fn new(services: Services) -> Self {
        Self { s: services }
    }

    pub async fn process(&self, activity: &Activity, object: &ObjectRef) -> AppResult<ProcessOutcome> {
        if let Some(inner_actor) = object.actor()
            && inner_actor != activity.actor()
        {
            return Ok(ProcessOutcome::skipped(format!(
                "{} cannot undo an activity of {inner_actor}",
                activity.actor()
            )));
        }

        match object.kind() {
            Some("Follow") => self.undo_follow(activity, object).await,
            Some("Like") => self.undo_like(activity, object).await,
            Some("Announce") => self.undo_announce(activity, &object.id).await,
            Some(other) => Ok(ProcessOutcome::skipped(format!("cannot undo a {other}"))),
            None => {
                // Bare reference: whatever this server recorded under that id.
                let outcome = self.undo_follow(activity, object).await?;
                if outcome != ProcessOutcome::NoOp {
                    return Ok(outcome);
                }
                self.undo_announce(activity, &object.id).await
            }
        }
    }

    async fn undo_follow(&self, activity: &Activity, object: &ObjectRef) -> AppResult<ProcessOutcome> {
        let stores = &self.s.ctx.stores;
        let Some(follower) = self.s.actors.find_cached(activity.actor()).await? else {
            return Ok(ProcessOutcome::NoOp);
        };

        let row = match stores.follows.find_follow_by_activity(&object.id).await? {
            Some(row) => Some(row),
            None => match object.object_id() {
                Some(target_uri) => match self.s.local_actor(&target_uri).await? {
                    Some(target) => stores.follows.find_follow(follower.id, target.id).await?,
                    None => None,
                },
                None => None,
            },
        };
        let Some(row) = row.filter(|r| r.source_id == follower.id) else {
            return Ok(ProcessOutcome::NoOp);
        };

        stores.follows.delete_follow(row.id).await?;
        self.s.recount_follow(row.source_id, row.target_id).await?;

        info!(follower = %follower.uri, follow = row.id, "Follow undone");
        Ok(ProcessOutcome::Applied)
    }

    async fn undo_like(&self, activity: &Activity, object: &ObjectRef) -> AppResult<ProcessOutcome> {
        let stores = &self.s.ctx.stores;
        let Some(liker) = self.s.actors.find_cached(activity.actor()).await? else {
            return Ok(ProcessOutcome::NoOp);
        };
        let Some(target) = object.object_id() else {
            return Ok(ProcessOutcome::NoOp);
        };
        let Some(status) = self.s.statuses.find_local(&target).await? else {
            return Ok(ProcessOutcome::NoOp);
        };
        let Some(favourite) = stores.favourites.find_favourite(liker.id, status.id).await? else {
            return Ok(ProcessOutcome::NoOp);
        };

        stores.favourites.delete_favourite(favourite.id).await?;
        stores.statuses.recount_favourites(status.id).await?;

        info!(actor = %liker.uri, status = %status.uri, "Favourite undone");
        Ok(ProcessOutcome::Applied)
    }

    async fn undo_announce(&self, activity: &Activity, announce_id: &str) -> AppResult<ProcessOutcome> {
        let stores = &self.s.ctx.stores;
        let Some(boost) = stores
            .statuses
            .find_status_by_uri(announce_id)
            .await?
            .filter(status::Model::is_reblog)
        else {
            return Ok(ProcessOutcome::NoOp);
        };

        let booster = stores.actors.find_actor(boost.author_id).await?;
        if booster.as_ref().map(|b| b.uri.as_str()) != Some(activity.actor()) {
            return Ok(ProcessOutcome::skipped(format!(
                "{} did not boost {announce_id}",
                activity.actor()
            )));
        }

        stores.statuses.delete_status(boost.id).await?;
        if let Some(original) = boost.reblog_of_id {
            stores.statuses.recount_reblogs(original).await?;
        }

        info!(actor = %activity.actor(), boost = boost.id, "Boost undone");
        Ok(ProcessOutcome::Applied)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{processor::InboxProcessor, test_utils::TestContext};
    use serde_json::{Value, json};
    use vitrine_db::{FollowStore, NewStatus, StatusStore, test_utils};

    const ALICE: &str = "https://remote.example/users/alice";
    const POST: &str = "https://vitrine.example/statuses/100";

    fn undo(actor: &str, object: Value) -> Activity {
        Activity::parse(json!({
            "id": "https://remote.example/undos/1",
            "type": "Undo",
            "actor": actor,
            "object": object,
        }))
        .unwrap()
    }

    fn like() -> Activity {
        Activity::parse(json!({
            "id": "https://remote.example/likes/1",
            "type": "Like",
            "actor": ALICE,
            "object": POST,
        }))
        .unwrap()
    }

    async fn seed(t: &TestContext) {
        t.seed_remote_actor(50, "alice", "remote.example").await;
        let bob = t.seed_local_actor(10, "bob").await;
        t.store
            .insert_status(NewStatus {
                status: test_utils::status(100, bob.id, POST, true),
                attachments: vec![test_utils::image_attachment(101, 100)],
                tags: vec![],
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_undo_like_restores_count() {
        let t = TestContext::with_system_actor().await;
        seed(&t).await;
        let processor = InboxProcessor::new(t.ctx.clone());

        processor.process(&like()).await.unwrap();
        assert_eq!(t.store.find_status(100).await.unwrap().unwrap().favourites_count, 1);

        let outcomes = processor.process(&undo(ALICE, like().raw)).await.unwrap();
        assert_eq!(outcomes, vec![ProcessOutcome::Applied]);
        assert_eq!(t.store.favourite_count().await, 0);
        assert_eq!(t.store.find_status(100).await.unwrap().unwrap().favourites_count, 0);
    }

    #[tokio::test]
    async fn test_undo_without_like_is_noop() {
        let t = TestContext::with_system_actor().await;
        seed(&t).await;

        let outcomes = InboxProcessor::new(t.ctx.clone())
            .process(&undo(ALICE, like().raw))
            .await
            .unwrap();
        assert_eq!(outcomes, vec![ProcessOutcome::NoOp]);
    }

    #[tokio::test]
    async fn test_undo_follow_by_reference() {
        let t = TestContext::with_system_actor().await;
        seed(&t).await;
        let mut row = test_utils::follow(60, 50, 10, true);
        row.activity_uri = Some("https://remote.example/follows/1".to_string());
        t.store.insert_follow(row).await.unwrap();

        let outcomes = InboxProcessor::new(t.ctx.clone())
            .process(&undo(ALICE, json!("https://remote.example/follows/1")))
            .await
            .unwrap();
        assert_eq!(outcomes, vec![ProcessOutcome::Applied]);
        assert_eq!(t.store.follow_count().await, 0);
    }

    #[tokio::test]
    async fn test_undo_follow_by_actor_pair() {
        let t = TestContext::with_system_actor().await;
        seed(&t).await;
        t.store
            .insert_follow(test_utils::follow(60, 50, 10, true))
            .await
            .unwrap();

        let follow = json!({
            "id": "https://remote.example/follows/unknown",
            "type": "Follow",
            "actor": ALICE,
            "object": "https://vitrine.example/users/bob",
        });
        let outcomes = InboxProcessor::new(t.ctx.clone())
            .process(&undo(ALICE, follow))
            .await
            .unwrap();
        assert_eq!(outcomes, vec![ProcessOutcome::Applied]);
        assert!(t.store.find_follow(50, 10).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_undo_of_someone_elses_activity_is_skipped() {
        let t = TestContext::with_system_actor().await;
        seed(&t).await;
        t.seed_remote_actor(51, "carol", "remote.example").await;
        InboxProcessor::new(t.ctx.clone()).process(&like()).await.unwrap();

        let outcomes = InboxProcessor::new(t.ctx.clone())
            .process(&undo("https://remote.example/users/carol", like().raw))
            .await
            .unwrap();
        assert!(matches!(outcomes[0], ProcessOutcome::Skipped(_)));
        assert_eq!(t.store.favourite_count().await, 1);
    }

    #[tokio::test]
    async fn test_undo_announce_removes_boost() {
        let t = TestContext::with_system_actor().await;
        seed(&t).await;
        let mut boost = test_utils::status(300, 50, "https://remote.example/announces/1", false);
        boost.reblog_of_id = Some(100);
        t.store
            .insert_status(NewStatus {
                status: boost,
                attachments: vec![],
                tags: vec![],
            })
            .await
            .unwrap();
        t.store.recount_reblogs(100).await.unwrap();

        let announce = json!({
            "id": "https://remote.example/announces/1",
            "type": "Announce",
            "actor": ALICE,
            "object": POST,
        });
        let outcomes = InboxProcessor::new(t.ctx.clone())
            .process(&undo(ALICE, announce))
            .await
            .unwrap();
        assert_eq!(outcomes, vec![ProcessOutcome::Applied]);
        assert!(t.store.find_status(300).await.unwrap().is_none());
        assert_eq!(t.store.find_status(100).await.unwrap().unwrap().reblogs_count, 0);
    }
}
