//! Remote actor fetching and caching.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};
use url::Url;
use vitrine_common::AppResult;
use vitrine_db::entities::actor;

use super::ResolveError;
use crate::{
    context::FederationContext,
    domain_gate::{DomainGate, host_of},
    jobs::{Job, ValidateProfileUrlJob},
    objects::ApPerson,
};

/// Resolves actor URIs to cached actor rows.
#[derive(Clone)]
pub struct ActorResolver {
    ctx: Arc<FederationContext>,
    gate: DomainGate,
}

impl ActorResolver {
    #[must_use]
    pub fn new(ctx: Arc<FederationContext>) -> Self {
        let gate = DomainGate::new(ctx.stores.domain_blocks.clone());
        Self { ctx, gate }
    }

    /// Cached row only, never touching the network.
    pub async fn find_cached(&self, uri: &str) -> AppResult<Option<actor::Model>> {
        self.ctx.stores.actors.find_actor_by_uri(uri).await
    }

    /// Resolve an actor, refetching remote actors older than the refresh
    /// interval.
    pub async fn resolve(&self, uri: &str) -> Result<actor::Model, ResolveError> {
        self.resolve_at(uri, Utc::now()).await
    }

    pub async fn resolve_at(
        &self,
        uri: &str,
        now: DateTime<Utc>,
    ) -> Result<actor::Model, ResolveError> {
        let cached = self.find_cached(uri).await?;

        if let Some(actor) = &cached {
            let age = now.signed_duration_since(actor.last_refreshed_at);
            if actor.is_local || age < Duration::seconds(self.ctx.config.actor_refresh_secs) {
                debug!(actor = %uri, "Actor cache hit");
                return Ok(actor.clone());
            }
        } else if self.ctx.is_local_uri(uri) {
            return Err(ResolveError::NotFound(uri.to_string()));
        }

        match self.fetch(uri, cached.as_ref(), now).await {
            Ok(actor) => Ok(actor),
            Err(e) => match cached {
                Some(stale) if !matches!(e, ResolveError::Local(_)) => {
                    warn!(actor = %uri, error = %e, "Actor refresh failed, using stale copy");
                    Ok(stale)
                }
                _ => Err(e),
            },
        }
    }

    async fn fetch(
        &self,
        uri: &str,
        cached: Option<&actor::Model>,
        now: DateTime<Utc>,
    ) -> Result<actor::Model, ResolveError> {
        if self.gate.is_instance_blocked(uri).await? {
            return Err(ResolveError::Blocked(uri.to_string()));
        }

        let url = Url::parse(uri).map_err(|e| ResolveError::Invalid(format!("{uri}: {e}")))?;
        let signer = self.ctx.system_signer().await?;

        info!(actor = %uri, "Fetching remote actor");
        let document = self.ctx.transport.fetch_object(&url, &signer).await?;
        let person: ApPerson = serde_json::from_value(document)
            .map_err(|e| ResolveError::Invalid(format!("{uri}: {e}")))?;

        let domain = host_of(uri).ok_or_else(|| ResolveError::Invalid(uri.to_string()))?;
        if person.id.as_str() != uri {
            return Err(ResolveError::Invalid(format!(
                "{uri} answered with actor {}",
                person.id
            )));
        }

        let avatar_remote_url = person.avatar_url();
        let header_remote_url = person.header_url();
        let avatar_url = self
            .cache_image(
                avatar_remote_url.as_deref(),
                cached.and_then(|c| c.avatar_remote_url.as_deref()),
                cached.and_then(|c| c.avatar_url.as_deref()),
            )
            .await;
        let header_url = self
            .cache_image(
                header_remote_url.as_deref(),
                cached.and_then(|c| c.header_remote_url.as_deref()),
                cached.and_then(|c| c.header_url.as_deref()),
            )
            .await;

        let profile_url = person.profile_url();
        let needs_profile_check = profile_url
            .as_deref()
            .is_some_and(|p| host_of(p).as_deref() != Some(domain.as_str()));

        let model = actor::Model {
            id: cached.map_or_else(|| self.ctx.ids.generate(), |c| c.id),
            uri: uri.to_string(),
            username: person.preferred_username.clone(),
            domain: Some(domain),
            is_local: false,
            display_name: person.name.clone(),
            summary: person.summary.clone(),
            inbox_url: person.inbox.to_string(),
            shared_inbox_url: person.shared_inbox().map(ToString::to_string),
            followers_url: person.followers.as_ref().map(ToString::to_string),
            profile_url,
            public_key_pem: person.public_key_pem().map(String::from),
            private_key_pem: None,
            manually_approves_followers: person.manually_approves_followers.unwrap_or(false),
            avatar_remote_url,
            avatar_url,
            header_remote_url,
            header_url,
            followers_count: 0,
            following_count: 0,
            status_count: 0,
            last_refreshed_at: now.into(),
            created_at: now.into(),
        };

        let stored = self.ctx.stores.actors.upsert_actor(model).await?;
        info!(actor = %uri, id = stored.id, "Stored remote actor");

        if needs_profile_check {
            self.ctx
                .queue
                .enqueue(
                    Job::ValidateProfileUrl(ValidateProfileUrlJob { actor_id: stored.id }),
                    self.ctx.max_attempts(),
                )
                .await?;
        }

        Ok(stored)
    }

    /// Download an avatar or header. Failures only cost the image.
    async fn cache_image(
        &self,
        remote: Option<&str>,
        previous_remote: Option<&str>,
        previous_local: Option<&str>,
    ) -> Option<String> {
        let remote = remote?;
        if previous_remote == Some(remote) && previous_local.is_some() {
            return previous_local.map(String::from);
        }

        let url = Url::parse(remote).ok()?;
        let media = match self.ctx.transport.fetch_media(&url).await {
            Ok(media) => media,
            Err(e) => {
                warn!(url = %remote, error = %e, "Failed to download actor image");
                return None;
            }
        };
        if !media.content_type.starts_with("image/") {
            warn!(url = %remote, content_type = %media.content_type, "Actor image is not an image");
            return None;
        }

        match self.ctx.media.store(&media.data, &media.content_type).await {
            Ok(stored) => Some(stored.url),
            Err(e) => {
                warn!(url = %remote, error = %e, "Failed to store actor image");
                None
            }
        }
    }

    /// Clear an actor's profile URL unless it is on the actor's own host.
    pub async fn validate_profile_url(&self, actor_id: i64) -> AppResult<()> {
        let Some(actor) = self.ctx.stores.actors.find_actor(actor_id).await? else {
            return Ok(());
        };
        let Some(profile_url) = actor.profile_url.as_deref() else {
            return Ok(());
        };

        if host_of(profile_url) != host_of(&actor.uri) {
            info!(actor = %actor.uri, profile_url = %profile_url, "Clearing cross-origin profile URL");
            self.ctx.stores.actors.set_profile_url(actor.id, None).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::{TestContext, person_document};
    use serde_json::json;
    use vitrine_db::{ActorStore, test_utils};

    const ALICE: &str = "https://remote.example/users/alice";

    #[tokio::test]
    async fn test_fetches_unknown_actor_once() {
        let t = TestContext::with_system_actor().await;
        t.transport.serve(ALICE, person_document(ALICE, None)).await;

        let first = t.actors.resolve(ALICE).await.unwrap();
        assert_eq!(first.username, "alice");
        assert_eq!(first.domain.as_deref(), Some("remote.example"));
        assert_eq!(first.shared_inbox_url.as_deref(), Some("https://remote.example/inbox"));
        assert!(first.private_key_pem.is_none());

        let second = t.actors.resolve(ALICE).await.unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(t.transport.fetched().await, vec![ALICE.to_string()]);
    }

    #[tokio::test]
    async fn test_refreshes_after_a_day() {
        let t = TestContext::with_system_actor().await;
        t.transport.serve(ALICE, person_document(ALICE, None)).await;
        let first = t.actors.resolve(ALICE).await.unwrap();

        let later = Utc::now() + Duration::hours(25);
        let refreshed = t.actors.resolve_at(ALICE, later).await.unwrap();
        assert_eq!(refreshed.id, first.id);
        assert_eq!(t.transport.fetched().await.len(), 2);
    }

    #[tokio::test]
    async fn test_stale_copy_survives_failed_refresh() {
        let t = TestContext::with_system_actor().await;
        let mut stale = test_utils::remote_actor(50, "alice", "remote.example");
        stale.last_refreshed_at = (Utc::now() - Duration::days(3)).into();
        t.store.upsert_actor(stale).await.unwrap();

        let actor = t.actors.resolve(ALICE).await.unwrap();
        assert_eq!(actor.id, 50);
    }

    #[tokio::test]
    async fn test_unknown_local_actor_is_not_fetched() {
        let t = TestContext::with_system_actor().await;
        let err = t
            .actors
            .resolve("https://vitrine.example/users/nobody")
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
        assert!(t.transport.fetched().await.is_empty());
    }

    #[tokio::test]
    async fn test_mismatched_id_is_invalid() {
        let t = TestContext::with_system_actor().await;
        t.transport
            .serve(ALICE, person_document("https://remote.example/users/mallory", None))
            .await;

        let err = t.actors.resolve(ALICE).await.unwrap_err();
        assert!(matches!(err, ResolveError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_avatar_download_failure_is_not_fatal() {
        let t = TestContext::with_system_actor().await;
        let mut doc = person_document(ALICE, None);
        doc["icon"] = json!({"type": "Image", "url": "https://remote.example/missing.png"});
        t.transport.serve(ALICE, doc).await;

        let actor = t.actors.resolve(ALICE).await.unwrap();
        assert_eq!(
            actor.avatar_remote_url.as_deref(),
            Some("https://remote.example/missing.png")
        );
        assert!(actor.avatar_url.is_none());
    }

    #[tokio::test]
    async fn test_avatar_is_cached() {
        let t = TestContext::with_system_actor().await;
        let mut doc = person_document(ALICE, None);
        doc["icon"] = json!({"type": "Image", "url": "https://remote.example/a.png"});
        t.transport.serve(ALICE, doc).await;
        t.transport
            .serve_media("https://remote.example/a.png", "image/png", b"png")
            .await;

        let actor = t.actors.resolve(ALICE).await.unwrap();
        assert!(actor.avatar_url.unwrap().starts_with("/files/"));
    }

    #[tokio::test]
    async fn test_cross_origin_profile_url_is_validated() {
        let t = TestContext::with_system_actor().await;
        let mut doc = person_document(ALICE, None);
        doc["url"] = json!("https://elsewhere.example/@alice");
        t.transport.serve(ALICE, doc).await;

        let actor = t.actors.resolve(ALICE).await.unwrap();
        let jobs = t.queue.jobs().await;
        assert_eq!(
            jobs,
            vec![Job::ValidateProfileUrl(ValidateProfileUrlJob { actor_id: actor.id })]
        );

        t.actors.validate_profile_url(actor.id).await.unwrap();
        let actor = t.store.find_actor(actor.id).await.unwrap().unwrap();
        assert!(actor.profile_url.is_none());
    }
}
