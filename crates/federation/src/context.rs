//! Shared federation context.
//!
//! Built once from [`vitrine_common::Config`] and handed to every component,
//! so nothing reads process-wide state.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use url::Url;
use uuid::Uuid;
use vitrine_common::{
    AppError, AppResult, Config, IdGenerator, MediaStore, config::FederationConfig,
    generate_rsa_keypair,
};
use vitrine_db::{Stores, entities::actor};

use crate::{client::ApTransport, jobs::JobQueue, signature::HttpSigner};

pub struct FederationContext {
    base: String,
    host: String,
    pub config: FederationConfig,
    pub ids: IdGenerator,
    pub stores: Stores,
    pub transport: Arc<dyn ApTransport>,
    pub media: Arc<dyn MediaStore>,
    pub queue: Arc<dyn JobQueue>,
}

impl FederationContext {
    pub fn new(
        base_url: &str,
        config: FederationConfig,
        stores: Stores,
        transport: Arc<dyn ApTransport>,
        media: Arc<dyn MediaStore>,
        queue: Arc<dyn JobQueue>,
    ) -> AppResult<Self> {
        let parsed = Url::parse(base_url)
            .map_err(|e| AppError::Config(format!("invalid server.url {base_url}: {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| AppError::Config(format!("server.url {base_url} has no host")))?
            .to_ascii_lowercase();

        Ok(Self {
            base: base_url.trim_end_matches('/').to_string(),
            host,
            config,
            ids: IdGenerator::new(),
            stores,
            transport,
            media,
            queue,
        })
    }

    /// Context for a loaded configuration.
    pub fn from_config(
        config: &Config,
        stores: Stores,
        transport: Arc<dyn ApTransport>,
        media: Arc<dyn MediaStore>,
        queue: Arc<dyn JobQueue>,
    ) -> AppResult<Self> {
        Self::new(
            &config.server.url,
            config.federation.clone(),
            stores,
            transport,
            media,
            queue,
        )
    }

    /// Base address without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base
    }

    #[must_use]
    pub fn local_host(&self) -> &str {
        &self.host
    }

    /// Whether `uri` points at this server.
    #[must_use]
    pub fn is_local_uri(&self, uri: &str) -> bool {
        Url::parse(uri)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.eq_ignore_ascii_case(&self.host)))
            .unwrap_or(false)
    }

    #[must_use]
    pub fn actor_uri(&self, username: &str) -> String {
        format!("{}/users/{username}", self.base)
    }

    #[must_use]
    pub fn status_uri(&self, id: i64) -> String {
        format!("{}/statuses/{id}", self.base)
    }

    /// Fresh id for an outbound activity.
    #[must_use]
    pub fn new_activity_uri(&self) -> String {
        format!("{}/activities/{}", self.base, Uuid::new_v4())
    }

    /// Attempt ceiling for queued jobs.
    #[must_use]
    pub const fn max_attempts(&self) -> usize {
        self.config.delivery_max_attempts
    }

    /// The instance actor that signs outbound fetches.
    ///
    /// Missing it is a local misconfiguration, so this is an internal error.
    pub async fn system_actor(&self) -> AppResult<actor::Model> {
        self.stores
            .actors
            .find_local_actor(&self.config.system_actor)
            .await?
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "system actor {} does not exist",
                    self.config.system_actor
                ))
            })
    }

    pub async fn system_signer(&self) -> AppResult<HttpSigner> {
        let actor = self.system_actor().await?;
        HttpSigner::for_actor(&actor)?.ok_or_else(|| {
            AppError::Internal(format!("system actor {} has no private key", actor.username))
        })
    }

    /// Create the instance actor with a fresh keypair unless it exists.
    pub async fn ensure_system_actor(&self) -> AppResult<actor::Model> {
        let username = &self.config.system_actor;
        if let Some(existing) = self.stores.actors.find_local_actor(username).await? {
            return Ok(existing);
        }

        let keys = generate_rsa_keypair()?;
        let uri = self.actor_uri(username);
        let now = Utc::now().into();
        let actor = self
            .stores
            .actors
            .upsert_actor(actor::Model {
                id: self.ids.generate(),
                inbox_url: format!("{uri}/inbox"),
                shared_inbox_url: Some(format!("{}/inbox", self.base)),
                followers_url: None,
                profile_url: None,
                uri,
                username: username.clone(),
                domain: None,
                is_local: true,
                display_name: None,
                summary: None,
                public_key_pem: Some(keys.public_key_pem),
                private_key_pem: Some(keys.private_key_pem),
                manually_approves_followers: true,
                avatar_remote_url: None,
                avatar_url: None,
                header_remote_url: None,
                header_url: None,
                followers_count: 0,
                following_count: 0,
                status_count: 0,
                last_refreshed_at: now,
                created_at: now,
            })
            .await?;

        info!(uri = %actor.uri, "Created system actor");
        Ok(actor)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::{BASE, TestContext};

    #[test]
    fn test_uris() {
        let ctx = TestContext::new().ctx;
        assert_eq!(ctx.base_url(), BASE);
        assert_eq!(ctx.local_host(), "vitrine.example");
        assert_eq!(ctx.actor_uri("bob"), "https://vitrine.example/users/bob");
        assert_eq!(ctx.status_uri(42), "https://vitrine.example/statuses/42");
        assert!(ctx.new_activity_uri().starts_with("https://vitrine.example/activities/"));
        assert!(ctx.is_local_uri("https://VITRINE.example/statuses/1"));
        assert!(!ctx.is_local_uri("https://remote.example/users/alice"));
        assert!(!ctx.is_local_uri("not a uri"));
    }

    #[tokio::test]
    async fn test_missing_system_actor_is_internal() {
        let ctx = TestContext::new().ctx;
        let err = ctx.system_signer().await.err().unwrap();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn test_ensure_system_actor_is_idempotent() {
        let ctx = TestContext::new().ctx;

        let created = ctx.ensure_system_actor().await.unwrap();
        assert!(created.is_local);
        assert_eq!(created.uri, "https://vitrine.example/users/instance.actor");
        assert!(ctx.system_signer().await.is_ok());

        let again = ctx.ensure_system_actor().await.unwrap();
        assert_eq!(again.id, created.id);
    }
}
