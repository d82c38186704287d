//! Home timeline fan-out.
//!
//! Followers are paged by id and each page is inserted with bounded
//! concurrency. Every insert is idempotent, so a failed job can simply run
//! again.

use std::sync::Arc;

use futures::{StreamExt, stream};
use tracing::{debug, info};
use vitrine_common::AppResult;
use vitrine_db::entities::{status, timeline_entry};

use crate::context::FederationContext;

#[derive(Clone)]
pub struct TimelineFanout {
    ctx: Arc<FederationContext>,
}

impl TimelineFanout {
    #[must_use]
    pub const fn new(ctx: Arc<FederationContext>) -> Self {
        Self { ctx }
    }

    /// Put `status_id` on the home timelines of its author's local followers,
    /// and on the author's own when the author is local.
    ///
    /// Returns how many entries were added. Every follower is attempted even
    /// when some inserts fail; the first failure is returned afterwards.
    pub async fn fan_out(&self, status_id: i64) -> AppResult<usize> {
        let stores = &self.ctx.stores;
        let Some(status) = stores.statuses.find_status(status_id).await? else {
            debug!(status_id, "Status is gone, nothing to fan out");
            return Ok(0);
        };
        let Some(author) = stores.actors.find_actor(status.author_id).await? else {
            return Ok(0);
        };
        let original_author = match status.reblog_of_id {
            Some(id) => stores.statuses.find_status(id).await?.map(|s| s.author_id),
            None => None,
        };

        let mut inserted = 0;
        let mut first_error = None;

        if author.is_local {
            match self.insert(author.id, &status, original_author).await {
                Ok(true) => inserted += 1,
                Ok(false) => {}
                Err(e) => first_error = Some(e),
            }
        }

        let chunk = self.ctx.config.fanout_chunk_size.max(1);
        let concurrency = self.ctx.config.fanout_concurrency.max(1);
        let mut after = None;
        loop {
            let page = stores
                .follows
                .local_followers(author.id, after, chunk)
                .await?;
            let Some(last) = page.last().copied() else {
                break;
            };
            let full = page.len() as u64 >= chunk;
            after = Some(last);

            let results: Vec<AppResult<bool>> = stream::iter(page)
                .filter(|owner| std::future::ready(*owner != author.id))
                .map(|owner| self.insert(owner, &status, original_author))
                .buffer_unordered(concurrency)
                .collect()
                .await;
            for result in results {
                match result {
                    Ok(true) => inserted += 1,
                    Ok(false) => {}
                    Err(e) => {
                        first_error.get_or_insert(e);
                    }
                }
            }

            if !full {
                break;
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        info!(status = %status.uri, inserted, "Fanned out to home timelines");
        Ok(inserted)
    }

    /// Add one timeline row unless the owner mutes the author, is looking at
    /// a boost of their own post, or already has the content.
    async fn insert(
        &self,
        owner_id: i64,
        status: &status::Model,
        original_author: Option<i64>,
    ) -> AppResult<bool> {
        let stores = &self.ctx.stores;
        if original_author == Some(owner_id) {
            return Ok(false);
        }
        if owner_id != status.author_id
            && let Some(mute) = stores.mutes.find_mute(owner_id, status.author_id).await?
            && mute.hides(status.is_reblog())
        {
            return Ok(false);
        }

        let content_status_id = status.reblog_of_id.unwrap_or(status.id);
        if stores
            .timelines
            .timeline_contains(owner_id, content_status_id)
            .await?
        {
            return Ok(false);
        }

        stores
            .timelines
            .insert_timeline_entry(timeline_entry::Model {
                id: self.ctx.ids.generate(),
                owner_id,
                status_id: status.id,
                content_status_id,
                created_at: status.created_at,
            })
            .await
    }
}
