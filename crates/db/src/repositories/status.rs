//! Status repository.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait, sea_query::Expr,
};
use vitrine_common::AppResult;

use super::{db_err, is_unique_violation};
use crate::entities::{
    Favourite, Status, StatusAttachment, StatusTag, favourite, status, status_attachment,
    status_tag,
};
use crate::store::{NewStatus, StatusStore};

#[derive(Clone)]
pub struct StatusRepository {
    db: Arc<DatabaseConnection>,
}

impl StatusRepository {
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn set_counter(&self, id: i64, column: status::Column, value: u64) -> AppResult<()> {
        Status::update_many()
            .col_expr(column, Expr::value(value as i64))
            .filter(status::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl StatusStore for StatusRepository {
    async fn find_status(&self, id: i64) -> AppResult<Option<status::Model>> {
        Status::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    async fn find_status_by_uri(&self, uri: &str) -> AppResult<Option<status::Model>> {
        Status::find()
            .filter(status::Column::Uri.eq(uri))
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    async fn find_status_by_url(&self, url: &str) -> AppResult<Option<status::Model>> {
        Status::find()
            .filter(status::Column::Url.eq(url))
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    async fn insert_status(&self, new: NewStatus) -> AppResult<status::Model> {
        if let Some(existing) = self.find_status_by_uri(&new.status.uri).await? {
            return Ok(existing);
        }

        let uri = new.status.uri.clone();
        let txn = self.db.begin().await.map_err(db_err)?;

        let inserted = match new.status.into_active_model().insert(&txn).await {
            Ok(inserted) => inserted,
            Err(e) if is_unique_violation(&e) => {
                txn.rollback().await.map_err(db_err)?;
                return self
                    .find_status_by_uri(&uri)
                    .await?
                    .ok_or_else(|| db_err(e));
            }
            Err(e) => return Err(db_err(e)),
        };

        if !new.attachments.is_empty() {
            StatusAttachment::insert_many(
                new.attachments
                    .into_iter()
                    .map(IntoActiveModel::into_active_model),
            )
            .exec(&txn)
            .await
            .map_err(db_err)?;
        }

        if !new.tags.is_empty() {
            StatusTag::insert_many(new.tags.into_iter().map(IntoActiveModel::into_active_model))
                .exec(&txn)
                .await
                .map_err(db_err)?;
        }

        txn.commit().await.map_err(db_err)?;
        Ok(inserted)
    }

    async fn attachments(&self, status_id: i64) -> AppResult<Vec<status_attachment::Model>> {
        StatusAttachment::find()
            .filter(status_attachment::Column::StatusId.eq(status_id))
            .order_by_asc(status_attachment::Column::Position)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    async fn tags(&self, status_id: i64) -> AppResult<Vec<status_tag::Model>> {
        StatusTag::find()
            .filter(status_tag::Column::StatusId.eq(status_id))
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    async fn statuses_by_author(&self, author_id: i64) -> AppResult<Vec<status::Model>> {
        Status::find()
            .filter(status::Column::AuthorId.eq(author_id))
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    async fn delete_status(&self, id: i64) -> AppResult<()> {
        // Attachments, tags, favourites, boosts, timeline rows and
        // notifications cascade; replies have reply_to_id set to NULL.
        Status::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn recount_favourites(&self, id: i64) -> AppResult<()> {
        let count = Favourite::find()
            .filter(favourite::Column::StatusId.eq(id))
            .count(self.db.as_ref())
            .await
            .map_err(db_err)?;
        self.set_counter(id, status::Column::FavouritesCount, count).await
    }

    async fn recount_reblogs(&self, id: i64) -> AppResult<()> {
        let count = Status::find()
            .filter(status::Column::ReblogOfId.eq(id))
            .count(self.db.as_ref())
            .await
            .map_err(db_err)?;
        self.set_counter(id, status::Column::ReblogsCount, count).await
    }

    async fn recount_replies(&self, id: i64) -> AppResult<()> {
        let count = Status::find()
            .filter(status::Column::ReplyToId.eq(id))
            .count(self.db.as_ref())
            .await
            .map_err(db_err)?;
        self.set_counter(id, status::Column::RepliesCount, count).await
    }
}
