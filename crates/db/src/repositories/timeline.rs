//! Home timeline repository.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use vitrine_common::AppResult;

use super::{db_err, is_unique_violation};
use crate::entities::{TimelineEntry, timeline_entry};
use crate::store::TimelineStore;

#[derive(Clone)]
pub struct TimelineRepository {
    db: Arc<DatabaseConnection>,
}

impl TimelineRepository {
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TimelineStore for TimelineRepository {
    async fn timeline_contains(&self, owner_id: i64, content_status_id: i64) -> AppResult<bool> {
        let count = TimelineEntry::find()
            .filter(timeline_entry::Column::OwnerId.eq(owner_id))
            .filter(timeline_entry::Column::ContentStatusId.eq(content_status_id))
            .count(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(count > 0)
    }

    async fn insert_timeline_entry(&self, entry: timeline_entry::Model) -> AppResult<bool> {
        match entry.into_active_model().insert(self.db.as_ref()).await {
            Ok(_) => Ok(true),
            Err(e) if is_unique_violation(&e) => Ok(false),
            Err(e) => Err(db_err(e)),
        }
    }

    async fn home_timeline(
        &self,
        owner_id: i64,
        limit: u64,
    ) -> AppResult<Vec<timeline_entry::Model>> {
        TimelineEntry::find()
            .filter(timeline_entry::Column::OwnerId.eq(owner_id))
            .order_by_desc(timeline_entry::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }
}
