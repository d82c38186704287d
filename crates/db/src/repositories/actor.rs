//! Actor repository.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, Set,
    sea_query::{Expr, Func},
};
use vitrine_common::AppResult;

use super::{db_err, is_unique_violation};
use crate::entities::{Actor, Follow, Status, actor, follow, status};
use crate::store::ActorStore;

#[derive(Clone)]
pub struct ActorRepository {
    db: Arc<DatabaseConnection>,
}

impl ActorRepository {
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn update_existing(
        &self,
        existing: actor::Model,
        incoming: actor::Model,
    ) -> AppResult<actor::Model> {
        let mut active = existing.into_active_model();
        active.username = Set(incoming.username);
        active.domain = Set(incoming.domain);
        active.is_local = Set(incoming.is_local);
        active.display_name = Set(incoming.display_name);
        active.summary = Set(incoming.summary);
        active.inbox_url = Set(incoming.inbox_url);
        active.shared_inbox_url = Set(incoming.shared_inbox_url);
        active.followers_url = Set(incoming.followers_url);
        active.profile_url = Set(incoming.profile_url);
        active.public_key_pem = Set(incoming.public_key_pem);
        active.manually_approves_followers = Set(incoming.manually_approves_followers);
        active.avatar_remote_url = Set(incoming.avatar_remote_url);
        active.avatar_url = Set(incoming.avatar_url);
        active.header_remote_url = Set(incoming.header_remote_url);
        active.header_url = Set(incoming.header_url);
        active.last_refreshed_at = Set(incoming.last_refreshed_at);
        active.update(self.db.as_ref()).await.map_err(db_err)
    }
}

#[async_trait]
impl ActorStore for ActorRepository {
    async fn find_actor(&self, id: i64) -> AppResult<Option<actor::Model>> {
        Actor::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    async fn find_actor_by_uri(&self, uri: &str) -> AppResult<Option<actor::Model>> {
        Actor::find()
            .filter(actor::Column::Uri.eq(uri))
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    async fn find_local_actor(&self, username: &str) -> AppResult<Option<actor::Model>> {
        Actor::find()
            .filter(actor::Column::IsLocal.eq(true))
            .filter(
                Expr::expr(Func::lower(Expr::col(actor::Column::Username)))
                    .eq(username.to_lowercase()),
            )
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    async fn upsert_actor(&self, actor: actor::Model) -> AppResult<actor::Model> {
        if let Some(existing) = self.find_actor_by_uri(&actor.uri).await? {
            return self.update_existing(existing, actor).await;
        }

        match actor.clone().into_active_model().insert(self.db.as_ref()).await {
            Ok(inserted) => Ok(inserted),
            Err(e) if is_unique_violation(&e) => {
                let existing = self
                    .find_actor_by_uri(&actor.uri)
                    .await?
                    .ok_or_else(|| db_err(e))?;
                self.update_existing(existing, actor).await
            }
            Err(e) => Err(db_err(e)),
        }
    }

    async fn set_profile_url(&self, id: i64, url: Option<String>) -> AppResult<()> {
        Actor::update_many()
            .col_expr(actor::Column::ProfileUrl, Expr::value(url))
            .filter(actor::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn delete_actor(&self, id: i64) -> AppResult<()> {
        // Statuses, follows, favourites, mutes and notifications go with it via FK cascades.
        Actor::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn recount_follows(&self, id: i64) -> AppResult<()> {
        let followers = Follow::find()
            .filter(follow::Column::TargetId.eq(id))
            .filter(follow::Column::Approved.eq(true))
            .count(self.db.as_ref())
            .await
            .map_err(db_err)?;
        let following = Follow::find()
            .filter(follow::Column::SourceId.eq(id))
            .filter(follow::Column::Approved.eq(true))
            .count(self.db.as_ref())
            .await
            .map_err(db_err)?;

        Actor::update_many()
            .col_expr(actor::Column::FollowersCount, Expr::value(followers as i64))
            .col_expr(actor::Column::FollowingCount, Expr::value(following as i64))
            .filter(actor::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn recount_statuses(&self, id: i64) -> AppResult<()> {
        let count = Status::find()
            .filter(status::Column::AuthorId.eq(id))
            .filter(status::Column::ReblogOfId.is_null())
            .count(self.db.as_ref())
            .await
            .map_err(db_err)?;

        Actor::update_many()
            .col_expr(actor::Column::StatusCount, Expr::value(count as i64))
            .filter(actor::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn remote_actor(id: i64, uri: &str) -> actor::Model {
        let now = Utc::now().into();
        actor::Model {
            id,
            uri: uri.to_string(),
            username: "alice".to_string(),
            domain: Some("remote.example".to_string()),
            is_local: false,
            display_name: None,
            summary: None,
            inbox_url: format!("{uri}/inbox"),
            shared_inbox_url: Some("https://remote.example/inbox".to_string()),
            followers_url: None,
            profile_url: None,
            public_key_pem: Some("pem".to_string()),
            private_key_pem: None,
            manually_approves_followers: false,
            avatar_remote_url: None,
            avatar_url: None,
            header_remote_url: None,
            header_url: None,
            followers_count: 4,
            following_count: 2,
            status_count: 9,
            last_refreshed_at: now,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_find_actor_by_uri() {
        let alice = remote_actor(1, "https://remote.example/users/alice");
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[alice.clone()]])
                .into_connection(),
        );

        let repo = ActorRepository::new(db);
        let found = repo
            .find_actor_by_uri("https://remote.example/users/alice")
            .await
            .unwrap();

        assert_eq!(found, Some(alice));
    }

    #[tokio::test]
    async fn test_upsert_updates_existing_row_by_uri() {
        let existing = remote_actor(1, "https://remote.example/users/alice");
        let mut incoming = remote_actor(99, "https://remote.example/users/alice");
        incoming.display_name = Some("Alice".to_string());
        let mut updated = existing.clone();
        updated.display_name = Some("Alice".to_string());

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[existing]])
                .append_query_results([[updated.clone()]])
                .into_connection(),
        );

        let repo = ActorRepository::new(db);
        let stored = repo.upsert_actor(incoming).await.unwrap();

        assert_eq!(stored.id, 1);
        assert_eq!(stored.followers_count, 4);
        assert_eq!(stored.display_name.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn test_recount_follows_uses_aggregates() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(3))
                }]])
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(1))
                }]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = ActorRepository::new(db);
        assert!(repo.recount_follows(1).await.is_ok());
    }
}
