//! Follow repository.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait,
    sea_query::Expr,
};
use vitrine_common::AppResult;

use super::{db_err, is_unique_violation};
use crate::entities::{Actor, Follow, actor, follow};
use crate::store::FollowStore;

#[derive(Clone)]
pub struct FollowRepository {
    db: Arc<DatabaseConnection>,
}

impl FollowRepository {
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FollowStore for FollowRepository {
    async fn find_follow(
        &self,
        source_id: i64,
        target_id: i64,
    ) -> AppResult<Option<follow::Model>> {
        Follow::find()
            .filter(follow::Column::SourceId.eq(source_id))
            .filter(follow::Column::TargetId.eq(target_id))
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    async fn find_follow_by_activity(&self, activity_uri: &str) -> AppResult<Option<follow::Model>> {
        Follow::find()
            .filter(follow::Column::ActivityUri.eq(activity_uri))
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    async fn insert_follow(&self, follow: follow::Model) -> AppResult<(follow::Model, bool)> {
        if let Some(existing) = self.find_follow(follow.source_id, follow.target_id).await? {
            return Ok((existing, false));
        }

        let (source_id, target_id) = (follow.source_id, follow.target_id);
        match follow.into_active_model().insert(self.db.as_ref()).await {
            Ok(inserted) => Ok((inserted, true)),
            Err(e) if is_unique_violation(&e) => {
                let existing = self
                    .find_follow(source_id, target_id)
                    .await?
                    .ok_or_else(|| db_err(e))?;
                Ok((existing, false))
            }
            Err(e) => Err(db_err(e)),
        }
    }

    async fn approve_follow(&self, id: i64) -> AppResult<bool> {
        let result = Follow::update_many()
            .col_expr(follow::Column::Approved, Expr::value(true))
            .filter(follow::Column::Id.eq(id))
            .filter(follow::Column::Approved.eq(false))
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected > 0)
    }

    async fn delete_follow(&self, id: i64) -> AppResult<()> {
        Follow::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn count_local_followers(&self, target_id: i64) -> AppResult<u64> {
        Follow::find()
            .join(JoinType::InnerJoin, follow::Relation::Source.def())
            .filter(follow::Column::TargetId.eq(target_id))
            .filter(follow::Column::Approved.eq(true))
            .filter(actor::Column::IsLocal.eq(true))
            .count(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    async fn local_followers(
        &self,
        target_id: i64,
        after: Option<i64>,
        limit: u64,
    ) -> AppResult<Vec<i64>> {
        let mut query = Follow::find()
            .select_only()
            .column(follow::Column::SourceId)
            .join(JoinType::InnerJoin, follow::Relation::Source.def())
            .filter(follow::Column::TargetId.eq(target_id))
            .filter(follow::Column::Approved.eq(true))
            .filter(actor::Column::IsLocal.eq(true))
            .order_by_asc(follow::Column::SourceId);

        if let Some(after) = after {
            query = query.filter(follow::Column::SourceId.gt(after));
        }

        query
            .limit(limit)
            .into_tuple::<i64>()
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    async fn remote_followers(&self, target_id: i64) -> AppResult<Vec<actor::Model>> {
        Actor::find()
            .join(JoinType::InnerJoin, follow::Relation::Source.def().rev())
            .filter(follow::Column::TargetId.eq(target_id))
            .filter(follow::Column::Approved.eq(true))
            .filter(actor::Column::IsLocal.eq(false))
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    async fn follows_involving(&self, actor_id: i64) -> AppResult<Vec<follow::Model>> {
        Follow::find()
            .filter(
                follow::Column::SourceId
                    .eq(actor_id)
                    .or(follow::Column::TargetId.eq(actor_id)),
            )
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }
}
