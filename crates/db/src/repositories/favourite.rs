//! Favourite repository.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
};
use vitrine_common::AppResult;

use super::{db_err, is_unique_violation};
use crate::entities::{Favourite, favourite};
use crate::store::FavouriteStore;

#[derive(Clone)]
pub struct FavouriteRepository {
    db: Arc<DatabaseConnection>,
}

impl FavouriteRepository {
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FavouriteStore for FavouriteRepository {
    async fn find_favourite(
        &self,
        actor_id: i64,
        status_id: i64,
    ) -> AppResult<Option<favourite::Model>> {
        Favourite::find()
            .filter(favourite::Column::ActorId.eq(actor_id))
            .filter(favourite::Column::StatusId.eq(status_id))
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    async fn insert_favourite(&self, favourite: favourite::Model) -> AppResult<bool> {
        if self
            .find_favourite(favourite.actor_id, favourite.status_id)
            .await?
            .is_some()
        {
            return Ok(false);
        }

        match favourite.into_active_model().insert(self.db.as_ref()).await {
            Ok(_) => Ok(true),
            Err(e) if is_unique_violation(&e) => Ok(false),
            Err(e) => Err(db_err(e)),
        }
    }

    async fn delete_favourite(&self, id: i64) -> AppResult<()> {
        Favourite::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn favourites_by_actor(&self, actor_id: i64) -> AppResult<Vec<favourite::Model>> {
        Favourite::find()
            .filter(favourite::Column::ActorId.eq(actor_id))
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }
}
