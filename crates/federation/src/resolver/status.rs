//! Remote status fetching and persistence.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use url::Url;
use vitrine_common::AppResult;
use vitrine_db::{
    NewStatus,
    entities::{
        status, status_attachment,
        status_tag::{self, TagKind},
    },
};

use super::{ActorResolver, ResolveError};
use crate::{context::FederationContext, domain_gate::DomainGate, objects::ApNote};

/// Resolves status URIs to stored statuses.
#[derive(Clone)]
pub struct StatusResolver {
    ctx: Arc<FederationContext>,
    actors: ActorResolver,
    gate: DomainGate,
}

impl StatusResolver {
    #[must_use]
    pub fn new(ctx: Arc<FederationContext>, actors: ActorResolver) -> Self {
        let gate = DomainGate::new(ctx.stores.domain_blocks.clone());
        Self { ctx, actors, gate }
    }

    /// Look a status up by canonical URI, then by alternate URL.
    pub async fn find_local(&self, uri: &str) -> AppResult<Option<status::Model>> {
        if let Some(status) = self.ctx.stores.statuses.find_status_by_uri(uri).await? {
            return Ok(Some(status));
        }
        self.ctx.stores.statuses.find_status_by_url(uri).await
    }

    /// Resolve a status, fetching and storing it if it is not known yet.
    pub async fn resolve(&self, uri: &str) -> Result<status::Model, ResolveError> {
        if let Some(status) = self.find_local(uri).await? {
            debug!(status = %uri, "Status found locally");
            return Ok(status);
        }

        let note = self.fetch(uri).await?;
        self.store_note(note).await.map(|(status, _)| status)
    }

    /// Fetch a remote note without storing it.
    pub async fn fetch(&self, uri: &str) -> Result<ApNote, ResolveError> {
        if self.ctx.is_local_uri(uri) {
            return Err(ResolveError::NotFound(uri.to_string()));
        }
        if self.gate.is_instance_blocked(uri).await? {
            return Err(ResolveError::Blocked(uri.to_string()));
        }

        let url = Url::parse(uri).map_err(|e| ResolveError::Invalid(format!("{uri}: {e}")))?;
        let signer = self.ctx.system_signer().await?;

        info!(status = %uri, "Fetching remote status");
        let document = self.ctx.transport.fetch_object(&url, &signer).await?;
        serde_json::from_value(document).map_err(|e| ResolveError::Invalid(format!("{uri}: {e}")))
    }

    /// Validate and store a note. Returns the stored status and whether it
    /// was created by this call.
    pub async fn store_note(&self, note: ApNote) -> Result<(status::Model, bool), ResolveError> {
        // A status may be addressable by two URIs; the fetched document names
        // the canonical one.
        if let Some(existing) = self.find_local(note.id.as_str()).await? {
            return Ok((existing, false));
        }
        if let Some(url) = note.alternate_url()
            && let Some(existing) = self.find_local(&url).await?
        {
            return Ok((existing, false));
        }

        if !note.origin_matches() {
            return Err(ResolveError::Invalid(format!(
                "{} is attributed to another host",
                note.id
            )));
        }
        if self.ctx.is_local_uri(note.id.as_str()) {
            return Err(ResolveError::Invalid(format!("{} claims to be local", note.id)));
        }

        let parent = match note.reply_target() {
            Some(target) => self.find_local(&target).await?,
            None => None,
        };

        let status_id = self.ctx.ids.generate();
        let attachments = attachment_rows(&self.ctx, status_id, &note);
        if parent.is_none() && !attachments.iter().any(status_attachment::Model::is_image) {
            return Err(ResolveError::MissingAttachments);
        }

        let author_uri = note
            .author()
            .ok_or_else(|| ResolveError::Invalid(format!("{} has no author", note.id)))?;
        let author = self.actors.resolve(&author_uri).await?;

        let mut tags: Vec<status_tag::Model> = note
            .hashtags()
            .into_iter()
            .map(|name| status_tag::Model {
                id: self.ctx.ids.generate(),
                status_id,
                kind: TagKind::Hashtag,
                name,
                actor_id: None,
            })
            .collect();
        for href in note.mentions() {
            let actor_id = self
                .ctx
                .stores
                .actors
                .find_actor_by_uri(&href)
                .await?
                .map(|a| a.id);
            tags.push(status_tag::Model {
                id: self.ctx.ids.generate(),
                status_id,
                kind: TagKind::Mention,
                name: href,
                actor_id,
            });
        }

        let model = status::Model {
            id: status_id,
            uri: note.id.to_string(),
            url: note.alternate_url(),
            is_local: false,
            author_id: author.id,
            visibility: note.visibility(),
            content: note.content.clone(),
            content_warning: note.summary.clone().filter(|s| !s.is_empty()),
            sensitive: note.sensitive.unwrap_or(false),
            reply_to_id: parent.as_ref().map(|p| p.id),
            thread_root_id: parent.as_ref().map(status::Model::thread_root),
            reblog_of_id: None,
            favourites_count: 0,
            reblogs_count: 0,
            replies_count: 0,
            created_at: note.published.unwrap_or_else(Utc::now).into(),
        };

        let stored = self
            .ctx
            .stores
            .statuses
            .insert_status(NewStatus {
                status: model,
                attachments,
                tags,
            })
            .await?;
        if stored.id != status_id {
            return Ok((stored, false));
        }

        self.ctx.stores.actors.recount_statuses(author.id).await?;
        if let Some(parent) = &parent {
            self.ctx.stores.statuses.recount_replies(parent.id).await?;
        }

        info!(status = %stored.uri, id = stored.id, author = %author.uri, "Stored remote status");
        Ok((stored, true))
    }
}

fn attachment_rows(
    ctx: &FederationContext,
    status_id: i64,
    note: &ApNote,
) -> Vec<status_attachment::Model> {
    note.attachment
        .iter()
        .filter_map(|a| a.href().map(|href| (a, href)))
        .enumerate()
        .map(|(position, (attachment, href))| status_attachment::Model {
            id: ctx.ids.generate(),
            status_id,
            remote_url: href,
            media_type: attachment.media_type.clone(),
            description: attachment.name.clone(),
            position: i32::try_from(position).unwrap_or(i32::MAX),
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::{TestContext, note_document, person_document};
    use serde_json::json;
    use vitrine_db::{ActorStore, StatusStore, test_utils};

    const ALICE: &str = "https://remote.example/users/alice";
    const NOTE: &str = "https://remote.example/users/alice/statuses/1";

    async fn with_alice() -> TestContext {
        let t = TestContext::with_system_actor().await;
        t.transport.serve(ALICE, person_document(ALICE, None)).await;
        t
    }

    #[tokio::test]
    async fn test_fetch_and_store_image_post() {
        let t = with_alice().await;
        t.transport.serve(NOTE, note_document(NOTE, ALICE, true)).await;

        let status = t.statuses.resolve(NOTE).await.unwrap();
        assert_eq!(status.uri, NOTE);
        assert!(!status.is_local);

        let author = t.store.find_actor(status.author_id).await.unwrap().unwrap();
        assert_eq!(author.uri, ALICE);
        assert_eq!(author.status_count, 1);
        assert_eq!(t.store.attachments(status.id).await.unwrap().len(), 1);

        let again = t.statuses.resolve(NOTE).await.unwrap();
        assert_eq!(again.id, status.id);
    }

    #[tokio::test]
    async fn test_post_without_images_is_refused() {
        let t = with_alice().await;
        t.transport.serve(NOTE, note_document(NOTE, ALICE, false)).await;

        let err = t.statuses.resolve(NOTE).await.unwrap_err();
        assert!(matches!(err, ResolveError::MissingAttachments));
        assert!(err.is_soft());
        assert_eq!(t.store.status_count().await, 0);
    }

    #[tokio::test]
    async fn test_video_only_post_is_refused() {
        let t = with_alice().await;
        let mut doc = note_document(NOTE, ALICE, false);
        doc["attachment"] = json!([{"type": "Document", "mediaType": "video/mp4", "url": "https://remote.example/v.mp4"}]);
        t.transport.serve(NOTE, doc).await;

        assert!(matches!(
            t.statuses.resolve(NOTE).await.unwrap_err(),
            ResolveError::MissingAttachments
        ));
    }

    #[tokio::test]
    async fn test_reply_to_known_parent_needs_no_images() {
        let t = with_alice().await;
        let bob = t.seed_local_actor(10, "bob").await;
        t.store
            .insert_status(NewStatus {
                status: test_utils::status(100, bob.id, "https://vitrine.example/statuses/100", true),
                attachments: vec![test_utils::image_attachment(101, 100)],
                tags: vec![],
            })
            .await
            .unwrap();

        let mut doc = note_document(NOTE, ALICE, false);
        doc["inReplyTo"] = json!("https://vitrine.example/statuses/100");
        t.transport.serve(NOTE, doc).await;

        let reply = t.statuses.resolve(NOTE).await.unwrap();
        assert_eq!(reply.reply_to_id, Some(100));
        assert_eq!(reply.thread_root_id, Some(100));
        let parent = t.store.find_status(100).await.unwrap().unwrap();
        assert_eq!(parent.replies_count, 1);
    }

    #[tokio::test]
    async fn test_canonical_uri_is_rechecked() {
        let t = with_alice().await;
        t.transport.serve(NOTE, note_document(NOTE, ALICE, true)).await;
        let stored = t.statuses.resolve(NOTE).await.unwrap();

        let alias = "https://remote.example/@alice/1";
        t.transport.serve(alias, note_document(NOTE, ALICE, true)).await;
        let resolved = t.statuses.resolve(alias).await.unwrap();
        assert_eq!(resolved.id, stored.id);
        assert_eq!(t.store.status_count().await, 1);
    }

    #[tokio::test]
    async fn test_foreign_attribution_is_invalid() {
        let t = with_alice().await;
        let forged = "https://evil.example/notes/1";
        t.transport.serve(forged, note_document(forged, ALICE, true)).await;

        assert!(matches!(
            t.statuses.resolve(forged).await.unwrap_err(),
            ResolveError::Invalid(_)
        ));
    }

    #[tokio::test]
    async fn test_unresolvable_author_is_fatal() {
        let t = TestContext::with_system_actor().await;
        t.transport.serve(NOTE, note_document(NOTE, ALICE, true)).await;

        let err = t.statuses.resolve(NOTE).await.unwrap_err();
        assert!(matches!(err, ResolveError::Transport(_)));
        assert_eq!(t.store.status_count().await, 0);
    }

    #[tokio::test]
    async fn test_hashtags_and_mentions_are_stored() {
        let t = with_alice().await;
        let bob = t.seed_local_actor(10, "bob").await;
        let mut doc = note_document(NOTE, ALICE, true);
        doc["tag"] = json!([
            {"type": "Hashtag", "name": "#Film"},
            {"type": "Mention", "href": bob.uri, "name": "@bob"}
        ]);
        t.transport.serve(NOTE, doc).await;

        let status = t.statuses.resolve(NOTE).await.unwrap();
        let tags = t.store.tags(status.id).await.unwrap();
        assert!(tags.iter().any(|t| t.kind == TagKind::Hashtag && t.name == "film"));
        assert!(
            tags.iter()
                .any(|t| t.kind == TagKind::Mention && t.actor_id == Some(bob.id))
        );
    }
}
