//! In-memory implementation of every store trait.
//!
//! Mirrors the constraints of the database schema (unique keys, cascades,
//! aggregate counters) closely enough to drive the federation core in tests
//! and in single-process tooling.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use vitrine_common::AppResult;

use crate::entities::{
    actor, domain_block, domain_block::BlockScope, favourite, follow, mute, notification,
    status, status_attachment, status_tag, timeline_entry,
};
use crate::store::{
    ActorStore, DomainBlockStore, FavouriteStore, FollowStore, MuteStore, NewStatus,
    NotificationStore, StatusStore, TimelineStore,
};

#[derive(Debug, Default)]
struct State {
    actors: BTreeMap<i64, actor::Model>,
    statuses: BTreeMap<i64, status::Model>,
    attachments: BTreeMap<i64, status_attachment::Model>,
    tags: BTreeMap<i64, status_tag::Model>,
    follows: BTreeMap<i64, follow::Model>,
    favourites: BTreeMap<i64, favourite::Model>,
    mutes: BTreeMap<i64, mute::Model>,
    domain_blocks: BTreeMap<i64, domain_block::Model>,
    notifications: BTreeMap<i64, notification::Model>,
    timeline: BTreeMap<i64, timeline_entry::Model>,
}

impl State {
    fn delete_status(&mut self, id: i64) {
        if self.statuses.remove(&id).is_none() {
            return;
        }
        self.attachments.retain(|_, a| a.status_id != id);
        self.tags.retain(|_, t| t.status_id != id);
        self.favourites.retain(|_, f| f.status_id != id);
        self.timeline.retain(|_, e| e.status_id != id);
        self.notifications.retain(|_, n| n.status_id != Some(id));
        for reply in self.statuses.values_mut() {
            if reply.reply_to_id == Some(id) {
                reply.reply_to_id = None;
            }
        }

        let boosts: Vec<i64> = self
            .statuses
            .values()
            .filter(|s| s.reblog_of_id == Some(id))
            .map(|s| s.id)
            .collect();
        for boost in boosts {
            self.delete_status(boost);
        }
    }

    fn count_statuses(&self, pred: impl Fn(&status::Model) -> bool) -> i64 {
        i64::try_from(self.statuses.values().filter(|s| pred(s)).count()).unwrap_or(i64::MAX)
    }
}

/// Shared in-memory store. Cheap to wrap in an `Arc` and hand to [`crate::Stores::memory`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a domain block.
    pub async fn add_domain_block(&self, block: domain_block::Model) {
        self.state.write().await.domain_blocks.insert(block.id, block);
    }

    /// Seed a mute.
    pub async fn add_mute(&self, mute: mute::Model) {
        self.state.write().await.mutes.insert(mute.id, mute);
    }

    pub async fn status_count(&self) -> usize {
        self.state.read().await.statuses.len()
    }

    pub async fn favourite_count(&self) -> usize {
        self.state.read().await.favourites.len()
    }

    pub async fn follow_count(&self) -> usize {
        self.state.read().await.follows.len()
    }
}

#[async_trait]
impl ActorStore for MemoryStore {
    async fn find_actor(&self, id: i64) -> AppResult<Option<actor::Model>> {
        Ok(self.state.read().await.actors.get(&id).cloned())
    }

    async fn find_actor_by_uri(&self, uri: &str) -> AppResult<Option<actor::Model>> {
        Ok(self
            .state
            .read()
            .await
            .actors
            .values()
            .find(|a| a.uri == uri)
            .cloned())
    }

    async fn find_local_actor(&self, username: &str) -> AppResult<Option<actor::Model>> {
        Ok(self
            .state
            .read()
            .await
            .actors
            .values()
            .find(|a| a.is_local && a.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn upsert_actor(&self, actor: actor::Model) -> AppResult<actor::Model> {
        let mut state = self.state.write().await;
        let existing = state.actors.values().find(|a| a.uri == actor.uri).cloned();

        let stored = match existing {
            Some(existing) => actor::Model {
                id: existing.id,
                private_key_pem: existing.private_key_pem,
                followers_count: existing.followers_count,
                following_count: existing.following_count,
                status_count: existing.status_count,
                created_at: existing.created_at,
                ..actor
            },
            None => actor,
        };

        state.actors.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn set_profile_url(&self, id: i64, url: Option<String>) -> AppResult<()> {
        if let Some(actor) = self.state.write().await.actors.get_mut(&id) {
            actor.profile_url = url;
        }
        Ok(())
    }

    async fn delete_actor(&self, id: i64) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state.actors.remove(&id).is_none() {
            return Ok(());
        }

        let authored: Vec<i64> = state
            .statuses
            .values()
            .filter(|s| s.author_id == id)
            .map(|s| s.id)
            .collect();
        for status_id in authored {
            state.delete_status(status_id);
        }

        state.follows.retain(|_, f| f.source_id != id && f.target_id != id);
        state.favourites.retain(|_, f| f.actor_id != id);
        state.mutes.retain(|_, m| m.owner_id != id && m.target_id != id);
        state.domain_blocks.retain(|_, b| b.owner_id != Some(id));
        state
            .notifications
            .retain(|_, n| n.recipient_id != id && n.actor_id != id);
        state.timeline.retain(|_, e| e.owner_id != id);
        state.tags.retain(|_, t| t.actor_id != Some(id));
        Ok(())
    }

    async fn recount_follows(&self, id: i64) -> AppResult<()> {
        let mut state = self.state.write().await;
        let followers = state
            .follows
            .values()
            .filter(|f| f.target_id == id && f.approved)
            .count();
        let following = state
            .follows
            .values()
            .filter(|f| f.source_id == id && f.approved)
            .count();
        if let Some(actor) = state.actors.get_mut(&id) {
            actor.followers_count = i64::try_from(followers).unwrap_or(i64::MAX);
            actor.following_count = i64::try_from(following).unwrap_or(i64::MAX);
        }
        Ok(())
    }

    async fn recount_statuses(&self, id: i64) -> AppResult<()> {
        let mut state = self.state.write().await;
        let count = state.count_statuses(|s| s.author_id == id && !s.is_reblog());
        if let Some(actor) = state.actors.get_mut(&id) {
            actor.status_count = count;
        }
        Ok(())
    }
}

#[async_trait]
impl StatusStore for MemoryStore {
    async fn find_status(&self, id: i64) -> AppResult<Option<status::Model>> {
        Ok(self.state.read().await.statuses.get(&id).cloned())
    }

    async fn find_status_by_uri(&self, uri: &str) -> AppResult<Option<status::Model>> {
        Ok(self
            .state
            .read()
            .await
            .statuses
            .values()
            .find(|s| s.uri == uri)
            .cloned())
    }

    async fn find_status_by_url(&self, url: &str) -> AppResult<Option<status::Model>> {
        Ok(self
            .state
            .read()
            .await
            .statuses
            .values()
            .find(|s| s.url.as_deref() == Some(url))
            .cloned())
    }

    async fn insert_status(&self, new: NewStatus) -> AppResult<status::Model> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.statuses.values().find(|s| s.uri == new.status.uri) {
            return Ok(existing.clone());
        }

        for attachment in new.attachments {
            state.attachments.insert(attachment.id, attachment);
        }
        for tag in new.tags {
            state.tags.insert(tag.id, tag);
        }
        state.statuses.insert(new.status.id, new.status.clone());
        Ok(new.status)
    }

    async fn attachments(&self, status_id: i64) -> AppResult<Vec<status_attachment::Model>> {
        let state = self.state.read().await;
        let mut attachments: Vec<_> = state
            .attachments
            .values()
            .filter(|a| a.status_id == status_id)
            .cloned()
            .collect();
        attachments.sort_by_key(|a| a.position);
        Ok(attachments)
    }

    async fn tags(&self, status_id: i64) -> AppResult<Vec<status_tag::Model>> {
        Ok(self
            .state
            .read()
            .await
            .tags
            .values()
            .filter(|t| t.status_id == status_id)
            .cloned()
            .collect())
    }

    async fn statuses_by_author(&self, author_id: i64) -> AppResult<Vec<status::Model>> {
        Ok(self
            .state
            .read()
            .await
            .statuses
            .values()
            .filter(|s| s.author_id == author_id)
            .cloned()
            .collect())
    }

    async fn delete_status(&self, id: i64) -> AppResult<()> {
        self.state.write().await.delete_status(id);
        Ok(())
    }

    async fn recount_favourites(&self, id: i64) -> AppResult<()> {
        let mut state = self.state.write().await;
        let count = state.favourites.values().filter(|f| f.status_id == id).count();
        if let Some(status) = state.statuses.get_mut(&id) {
            status.favourites_count = i64::try_from(count).unwrap_or(i64::MAX);
        }
        Ok(())
    }

    async fn recount_reblogs(&self, id: i64) -> AppResult<()> {
        let mut state = self.state.write().await;
        let count = state.count_statuses(|s| s.reblog_of_id == Some(id));
        if let Some(status) = state.statuses.get_mut(&id) {
            status.reblogs_count = count;
        }
        Ok(())
    }

    async fn recount_replies(&self, id: i64) -> AppResult<()> {
        let mut state = self.state.write().await;
        let count = state.count_statuses(|s| s.reply_to_id == Some(id));
        if let Some(status) = state.statuses.get_mut(&id) {
            status.replies_count = count;
        }
        Ok(())
    }
}

#[async_trait]
impl FollowStore for MemoryStore {
    async fn find_follow(
        &self,
        source_id: i64,
        target_id: i64,
    ) -> AppResult<Option<follow::Model>> {
        Ok(self
            .state
            .read()
            .await
            .follows
            .values()
            .find(|f| f.source_id == source_id && f.target_id == target_id)
            .cloned())
    }

    async fn find_follow_by_activity(&self, activity_uri: &str) -> AppResult<Option<follow::Model>> {
        Ok(self
            .state
            .read()
            .await
            .follows
            .values()
            .find(|f| f.activity_uri.as_deref() == Some(activity_uri))
            .cloned())
    }

    async fn insert_follow(&self, follow: follow::Model) -> AppResult<(follow::Model, bool)> {
        let mut state = self.state.write().await;
        if let Some(existing) = state
            .follows
            .values()
            .find(|f| f.source_id == follow.source_id && f.target_id == follow.target_id)
        {
            return Ok((existing.clone(), false));
        }
        state.follows.insert(follow.id, follow.clone());
        Ok((follow, true))
    }

    async fn approve_follow(&self, id: i64) -> AppResult<bool> {
        let mut state = self.state.write().await;
        match state.follows.get_mut(&id) {
            Some(follow) if !follow.approved => {
                follow.approved = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_follow(&self, id: i64) -> AppResult<()> {
        self.state.write().await.follows.remove(&id);
        Ok(())
    }

    async fn count_local_followers(&self, target_id: i64) -> AppResult<u64> {
        let state = self.state.read().await;
        let count = state
            .follows
            .values()
            .filter(|f| f.target_id == target_id && f.approved)
            .filter(|f| state.actors.get(&f.source_id).is_some_and(|a| a.is_local))
            .count();
        Ok(count as u64)
    }

    async fn local_followers(
        &self,
        target_id: i64,
        after: Option<i64>,
        limit: u64,
    ) -> AppResult<Vec<i64>> {
        let state = self.state.read().await;
        let mut ids: Vec<i64> = state
            .follows
            .values()
            .filter(|f| f.target_id == target_id && f.approved)
            .filter(|f| after.is_none_or(|after| f.source_id > after))
            .filter(|f| state.actors.get(&f.source_id).is_some_and(|a| a.is_local))
            .map(|f| f.source_id)
            .collect();
        ids.sort_unstable();
        ids.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(ids)
    }

    async fn remote_followers(&self, target_id: i64) -> AppResult<Vec<actor::Model>> {
        let state = self.state.read().await;
        Ok(state
            .follows
            .values()
            .filter(|f| f.target_id == target_id && f.approved)
            .filter_map(|f| state.actors.get(&f.source_id))
            .filter(|a| !a.is_local)
            .cloned()
            .collect())
    }

    async fn follows_involving(&self, actor_id: i64) -> AppResult<Vec<follow::Model>> {
        Ok(self
            .state
            .read()
            .await
            .follows
            .values()
            .filter(|f| f.source_id == actor_id || f.target_id == actor_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl FavouriteStore for MemoryStore {
    async fn find_favourite(
        &self,
        actor_id: i64,
        status_id: i64,
    ) -> AppResult<Option<favourite::Model>> {
        Ok(self
            .state
            .read()
            .await
            .favourites
            .values()
            .find(|f| f.actor_id == actor_id && f.status_id == status_id)
            .cloned())
    }

    async fn insert_favourite(&self, favourite: favourite::Model) -> AppResult<bool> {
        let mut state = self.state.write().await;
        if state
            .favourites
            .values()
            .any(|f| f.actor_id == favourite.actor_id && f.status_id == favourite.status_id)
        {
            return Ok(false);
        }
        state.favourites.insert(favourite.id, favourite);
        Ok(true)
    }

    async fn delete_favourite(&self, id: i64) -> AppResult<()> {
        self.state.write().await.favourites.remove(&id);
        Ok(())
    }

    async fn favourites_by_actor(&self, actor_id: i64) -> AppResult<Vec<favourite::Model>> {
        Ok(self
            .state
            .read()
            .await
            .favourites
            .values()
            .filter(|f| f.actor_id == actor_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TimelineStore for MemoryStore {
    async fn timeline_contains(&self, owner_id: i64, content_status_id: i64) -> AppResult<bool> {
        Ok(self
            .state
            .read()
            .await
            .timeline
            .values()
            .any(|e| e.owner_id == owner_id && e.content_status_id == content_status_id))
    }

    async fn insert_timeline_entry(&self, entry: timeline_entry::Model) -> AppResult<bool> {
        let mut state = self.state.write().await;
        if state
            .timeline
            .values()
            .any(|e| e.owner_id == entry.owner_id && e.content_status_id == entry.content_status_id)
        {
            return Ok(false);
        }
        state.timeline.insert(entry.id, entry);
        Ok(true)
    }

    async fn home_timeline(
        &self,
        owner_id: i64,
        limit: u64,
    ) -> AppResult<Vec<timeline_entry::Model>> {
        Ok(self
            .state
            .read()
            .await
            .timeline
            .values()
            .rev()
            .filter(|e| e.owner_id == owner_id)
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert_notification(&self, notification: notification::Model) -> AppResult<()> {
        self.state
            .write()
            .await
            .notifications
            .insert(notification.id, notification);
        Ok(())
    }

    async fn notifications_for(&self, recipient_id: i64) -> AppResult<Vec<notification::Model>> {
        Ok(self
            .state
            .read()
            .await
            .notifications
            .values()
            .rev()
            .filter(|n| n.recipient_id == recipient_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MuteStore for MemoryStore {
    async fn find_mute(&self, owner_id: i64, target_id: i64) -> AppResult<Option<mute::Model>> {
        Ok(self
            .state
            .read()
            .await
            .mutes
            .values()
            .find(|m| m.owner_id == owner_id && m.target_id == target_id)
            .cloned())
    }
}

#[async_trait]
impl DomainBlockStore for MemoryStore {
    async fn is_domain_blocked(
        &self,
        domain: &str,
        scope: BlockScope,
        owner_id: Option<i64>,
    ) -> AppResult<bool> {
        Ok(self.state.read().await.domain_blocks.values().any(|b| {
            b.scope == scope
                && b.domain.eq_ignore_ascii_case(domain)
                && (scope == BlockScope::Instance || b.owner_id == owner_id)
        }))
    }
}
