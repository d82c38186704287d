//! Store interfaces consumed by the federation core.
//!
//! Each trait covers one table family. [`Stores`] bundles them so that
//! components can be built against either the `PostgreSQL` repositories or
//! the in-memory store used by tests.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use vitrine_common::AppResult;

use crate::entities::{
    actor, domain_block::BlockScope, favourite, follow, mute, notification, status,
    status_attachment, status_tag, timeline_entry,
};
use crate::memory::MemoryStore;
use crate::repositories::{
    ActorRepository, DomainBlockRepository, FavouriteRepository, FollowRepository,
    MuteRepository, NotificationRepository, StatusRepository, TimelineRepository,
};

/// A status together with the rows parsed out of it.
#[derive(Debug, Clone)]
pub struct NewStatus {
    pub status: status::Model,
    pub attachments: Vec<status_attachment::Model>,
    pub tags: Vec<status_tag::Model>,
}

#[async_trait]
pub trait ActorStore: Send + Sync {
    async fn find_actor(&self, id: i64) -> AppResult<Option<actor::Model>>;

    async fn find_actor_by_uri(&self, uri: &str) -> AppResult<Option<actor::Model>>;

    async fn find_local_actor(&self, username: &str) -> AppResult<Option<actor::Model>>;

    /// Insert or update by URI.
    ///
    /// An existing row keeps its id, counters, creation time and private
    /// key; everything else is overwritten. Losing an insert race to another
    /// writer turns the insert into an update.
    async fn upsert_actor(&self, actor: actor::Model) -> AppResult<actor::Model>;

    async fn set_profile_url(&self, id: i64, url: Option<String>) -> AppResult<()>;

    /// Delete an actor and everything hanging off it.
    async fn delete_actor(&self, id: i64) -> AppResult<()>;

    /// Recompute `followers_count` and `following_count` from approved follows.
    async fn recount_follows(&self, id: i64) -> AppResult<()>;

    /// Recompute `status_count` from authored statuses, boosts excluded.
    async fn recount_statuses(&self, id: i64) -> AppResult<()>;
}

#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn find_status(&self, id: i64) -> AppResult<Option<status::Model>>;

    async fn find_status_by_uri(&self, uri: &str) -> AppResult<Option<status::Model>>;

    async fn find_status_by_url(&self, url: &str) -> AppResult<Option<status::Model>>;

    /// Insert a status with its attachments and tags. If a status with the
    /// same URI already exists it is returned unchanged.
    async fn insert_status(&self, new: NewStatus) -> AppResult<status::Model>;

    async fn attachments(&self, status_id: i64) -> AppResult<Vec<status_attachment::Model>>;

    async fn tags(&self, status_id: i64) -> AppResult<Vec<status_tag::Model>>;

    async fn statuses_by_author(&self, author_id: i64) -> AppResult<Vec<status::Model>>;

    /// Delete a status together with its attachments, tags, favourites,
    /// boosts, timeline rows and notifications. Replies are detached.
    async fn delete_status(&self, id: i64) -> AppResult<()>;

    async fn recount_favourites(&self, id: i64) -> AppResult<()>;

    async fn recount_reblogs(&self, id: i64) -> AppResult<()>;

    async fn recount_replies(&self, id: i64) -> AppResult<()>;
}

#[async_trait]
pub trait FollowStore: Send + Sync {
    async fn find_follow(&self, source_id: i64, target_id: i64)
    -> AppResult<Option<follow::Model>>;

    async fn find_follow_by_activity(&self, activity_uri: &str) -> AppResult<Option<follow::Model>>;

    /// Insert unless the pair already exists. Returns the stored row and
    /// whether it was created.
    async fn insert_follow(&self, follow: follow::Model) -> AppResult<(follow::Model, bool)>;

    /// Mark a follow approved. Returns whether anything changed.
    async fn approve_follow(&self, id: i64) -> AppResult<bool>;

    async fn delete_follow(&self, id: i64) -> AppResult<()>;

    /// Approved followers of `target_id` that are local accounts.
    async fn count_local_followers(&self, target_id: i64) -> AppResult<u64>;

    /// Ids of approved local followers, ascending, strictly after `after`.
    async fn local_followers(
        &self,
        target_id: i64,
        after: Option<i64>,
        limit: u64,
    ) -> AppResult<Vec<i64>>;

    /// Approved remote followers.
    async fn remote_followers(&self, target_id: i64) -> AppResult<Vec<actor::Model>>;

    /// Every follow row in which `actor_id` is either side.
    async fn follows_involving(&self, actor_id: i64) -> AppResult<Vec<follow::Model>>;
}

#[async_trait]
pub trait FavouriteStore: Send + Sync {
    async fn find_favourite(
        &self,
        actor_id: i64,
        status_id: i64,
    ) -> AppResult<Option<favourite::Model>>;

    /// Insert unless the pair already exists. Returns whether it was created.
    async fn insert_favourite(&self, favourite: favourite::Model) -> AppResult<bool>;

    async fn delete_favourite(&self, id: i64) -> AppResult<()>;

    async fn favourites_by_actor(&self, actor_id: i64) -> AppResult<Vec<favourite::Model>>;
}

#[async_trait]
pub trait TimelineStore: Send + Sync {
    async fn timeline_contains(&self, owner_id: i64, content_status_id: i64) -> AppResult<bool>;

    /// Insert unless the owner already has the content. Returns whether it was created.
    async fn insert_timeline_entry(&self, entry: timeline_entry::Model) -> AppResult<bool>;

    /// Newest first.
    async fn home_timeline(&self, owner_id: i64, limit: u64)
    -> AppResult<Vec<timeline_entry::Model>>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert_notification(&self, notification: notification::Model) -> AppResult<()>;

    /// Newest first.
    async fn notifications_for(&self, recipient_id: i64) -> AppResult<Vec<notification::Model>>;
}

#[async_trait]
pub trait MuteStore: Send + Sync {
    async fn find_mute(&self, owner_id: i64, target_id: i64) -> AppResult<Option<mute::Model>>;
}

#[async_trait]
pub trait DomainBlockStore: Send + Sync {
    /// Exact, case-insensitive host match. `owner_id` selects whose
    /// personal list is consulted for [`BlockScope::User`].
    async fn is_domain_blocked(
        &self,
        domain: &str,
        scope: BlockScope,
        owner_id: Option<i64>,
    ) -> AppResult<bool>;
}

/// All stores the federation core works against.
#[derive(Clone)]
pub struct Stores {
    pub actors: Arc<dyn ActorStore>,
    pub statuses: Arc<dyn StatusStore>,
    pub follows: Arc<dyn FollowStore>,
    pub favourites: Arc<dyn FavouriteStore>,
    pub timelines: Arc<dyn TimelineStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub mutes: Arc<dyn MuteStore>,
    pub domain_blocks: Arc<dyn DomainBlockStore>,
}

impl Stores {
    /// Repositories backed by a database connection.
    #[must_use]
    pub fn database(db: Arc<DatabaseConnection>) -> Self {
        Self {
            actors: Arc::new(ActorRepository::new(Arc::clone(&db))),
            statuses: Arc::new(StatusRepository::new(Arc::clone(&db))),
            follows: Arc::new(FollowRepository::new(Arc::clone(&db))),
            favourites: Arc::new(FavouriteRepository::new(Arc::clone(&db))),
            timelines: Arc::new(TimelineRepository::new(Arc::clone(&db))),
            notifications: Arc::new(NotificationRepository::new(Arc::clone(&db))),
            mutes: Arc::new(MuteRepository::new(Arc::clone(&db))),
            domain_blocks: Arc::new(DomainBlockRepository::new(db)),
        }
    }

    /// Every store served by one shared in-memory store.
    #[must_use]
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            actors: store.clone(),
            statuses: store.clone(),
            follows: store.clone(),
            favourites: store.clone(),
            timelines: store.clone(),
            notifications: store.clone(),
            mutes: store.clone(),
            domain_blocks: store,
        }
    }
}
