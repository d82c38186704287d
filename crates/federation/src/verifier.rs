//! Inbound HTTP Signature verification.

use std::{collections::HashMap, sync::Arc};

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};
use vitrine_common::{
    AppResult, SignatureError, SignatureHeader, body_hash, build_signing_string,
    crypto::parse_public_key,
};
use vitrine_db::entities::actor;

use crate::{
    context::FederationContext,
    domain_gate::{DomainGate, host_of},
    objects::ids_of,
    resolver::{ActorResolver, ResolveError},
    signature::parse_http_date,
};

/// What the verifier needs to know about an inbound request.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: String,
    /// Path and query, as signed in `(request-target)`.
    pub path: String,
    /// Header values keyed by lowercase name.
    pub headers: HashMap<String, String>,
    /// Base64 SHA-256 of the raw body.
    pub body_hash: String,
    pub activity: Value,
}

impl InboundRequest {
    #[must_use]
    pub fn new(method: &str, path: &str, headers: &HeaderMap, body: &[u8], activity: Value) -> Self {
        let mut values: HashMap<String, String> = HashMap::new();
        for (name, value) in headers {
            let Ok(value) = value.to_str() else { continue };
            values
                .entry(name.as_str().to_ascii_lowercase())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }

        Self {
            method: method.to_string(),
            path: path.to_string(),
            headers: values,
            body_hash: body_hash(body),
            activity,
        }
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Actor URIs named by the payload.
    #[must_use]
    pub fn payload_actors(&self) -> Vec<String> {
        self.activity.get("actor").map(ids_of).unwrap_or_default()
    }
}

/// Verifies inbound requests against the signer's published key.
#[derive(Clone)]
pub struct SignatureVerifier {
    ctx: Arc<FederationContext>,
    gate: DomainGate,
    actors: ActorResolver,
}

impl SignatureVerifier {
    #[must_use]
    pub fn new(ctx: Arc<FederationContext>) -> Self {
        let gate = DomainGate::new(ctx.stores.domain_blocks.clone());
        let actors = ActorResolver::new(ctx.clone());
        Self { ctx, gate, actors }
    }

    /// Verify a request, resolving unknown signers remotely. Returns the
    /// signing actor.
    pub async fn verify(&self, req: &InboundRequest) -> AppResult<actor::Model> {
        self.verify_at(req, Utc::now()).await
    }

    pub async fn verify_at(
        &self,
        req: &InboundRequest,
        now: DateTime<Utc>,
    ) -> AppResult<actor::Model> {
        let header = parse_header(req)?;
        let signer_uri = header.actor_id().to_string();
        let payload_actors = req.payload_actors();

        for uri in std::iter::once(&signer_uri).chain(payload_actors.iter()) {
            if self.gate.is_instance_blocked(uri).await? {
                warn!(actor = %uri, "Rejecting request from blocked domain");
                return Err(SignatureError::BlockedDomain(host_of(uri).unwrap_or_default()).into());
            }
        }

        self.check_date(req, now)?;

        let signer = self.resolve_actor(&signer_uri).await?;
        for uri in payload_actors.iter().filter(|uri| **uri != signer_uri) {
            self.resolve_actor(uri).await?;
        }

        check_signature(req, &header, &signer)?;
        debug!(actor = %signer.uri, "Signature verified");
        Ok(signer)
    }

    /// Verify against cached actors only. Used for an actor's own Delete,
    /// since the actor may already be gone remotely.
    pub async fn verify_local(&self, req: &InboundRequest) -> AppResult<actor::Model> {
        self.verify_local_at(req, Utc::now()).await
    }

    pub async fn verify_local_at(
        &self,
        req: &InboundRequest,
        now: DateTime<Utc>,
    ) -> AppResult<actor::Model> {
        let header = parse_header(req)?;
        self.check_date(req, now)?;

        let signer_uri = header.actor_id();
        let signer = self
            .actors
            .find_cached(signer_uri)
            .await?
            .ok_or_else(|| SignatureError::UnknownActor(signer_uri.to_string()))?;

        check_signature(req, &header, &signer)?;
        debug!(actor = %signer.uri, "Signature verified against cached key");
        Ok(signer)
    }

    fn check_date(&self, req: &InboundRequest, now: DateTime<Utc>) -> Result<(), SignatureError> {
        let date = parse_http_date(req.header("date").ok_or(SignatureError::MissingDate)?)?;

        // Only staleness is checked; clocks ahead of ours are tolerated.
        let age_secs = now.signed_duration_since(date).num_seconds();
        if age_secs > self.ctx.config.signature_max_age_secs {
            return Err(SignatureError::Expired { age_secs });
        }
        Ok(())
    }

    async fn resolve_actor(&self, uri: &str) -> AppResult<actor::Model> {
        match self.actors.resolve(uri).await {
            Ok(actor) => Ok(actor),
            Err(ResolveError::Local(e)) => Err(e),
            Err(e) => {
                warn!(actor = %uri, error = %e, "Could not resolve signing actor");
                Err(SignatureError::UnknownActor(uri.to_string()).into())
            }
        }
    }
}

fn parse_header(req: &InboundRequest) -> Result<SignatureHeader, SignatureError> {
    let value = req
        .header("signature")
        .ok_or_else(|| SignatureError::MissingHeader("signature".to_string()))?;
    SignatureHeader::parse(value)
}

fn check_signature(
    req: &InboundRequest,
    header: &SignatureHeader,
    signer: &actor::Model,
) -> Result<(), SignatureError> {
    let pem = signer
        .public_key_pem
        .as_deref()
        .ok_or_else(|| SignatureError::MissingPublicKey(signer.uri.clone()))?;

    // The signing string carries the hash of the body we received, so a
    // Digest header describing some other body cannot be honoured.
    if let Some(digest) = req.header("digest") {
        let matches = digest.split(',').map(str::trim).any(|d| {
            d.split_once('=').is_some_and(|(alg, value)| {
                alg.eq_ignore_ascii_case("sha-256") && value == req.body_hash
            })
        });
        if !matches {
            return Err(SignatureError::Invalid);
        }
    }

    let signing_string = build_signing_string(
        &req.method,
        &req.path,
        &req.headers,
        &header.headers,
        Some(&req.body_hash),
    )?;
    debug!(signing_string = %signing_string, "Verifying signature");

    let key = parse_public_key(pem).map_err(|_| SignatureError::Invalid)?;
    header
        .verify(&key, &signing_string)
        .map_err(|_| SignatureError::Invalid)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::{TestContext, local_keypair, remote_keypair, signed_request};
    use chrono::Duration;
    use serde_json::json;
    use vitrine_common::AppError;
    use vitrine_db::entities::domain_block::{self, BlockScope};

    const ALICE: &str = "https://remote.example/users/alice";
    const KEY: &str = "https://remote.example/users/alice#main-key";

    fn like_from(actor: &str) -> Value {
        json!({
            "id": "https://remote.example/likes/1",
            "type": "Like",
            "actor": actor,
            "object": "https://vitrine.example/statuses/1",
        })
    }

    async fn setup() -> (TestContext, SignatureVerifier) {
        let t = TestContext::with_system_actor().await;
        t.seed_remote_actor(50, "alice", "remote.example").await;
        let verifier = SignatureVerifier::new(t.ctx.clone());
        (t, verifier)
    }

    fn sig_err(err: AppError) -> String {
        err.to_string()
    }

    #[tokio::test]
    async fn test_valid_signature() {
        let (_t, verifier) = setup().await;
        let now = Utc::now();
        let req = signed_request(&like_from(ALICE), KEY, &remote_keypair().private_key_pem, now);

        let actor = verifier.verify_at(&req, now).await.unwrap();
        assert_eq!(actor.uri, ALICE);
    }

    #[tokio::test]
    async fn test_replay_window_boundary() {
        let (_t, verifier) = setup().await;
        let signed_at = Utc::now();
        let req = signed_request(&like_from(ALICE), KEY, &remote_keypair().private_key_pem, signed_at);

        assert!(verifier.verify_at(&req, signed_at + Duration::seconds(299)).await.is_ok());
        let err = verifier
            .verify_at(&req, signed_at + Duration::seconds(301))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        assert!(sig_err(err).contains("301"));
    }

    #[tokio::test]
    async fn test_future_dates_are_tolerated() {
        let (_t, verifier) = setup().await;
        let now = Utc::now();
        let req = signed_request(
            &like_from(ALICE),
            KEY,
            &remote_keypair().private_key_pem,
            now + Duration::hours(1),
        );
        assert!(verifier.verify_at(&req, now).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_and_garbled_date() {
        let (_t, verifier) = setup().await;
        let now = Utc::now();
        let mut req = signed_request(&like_from(ALICE), KEY, &remote_keypair().private_key_pem, now);

        req.headers.insert("date".to_string(), "last tuesday".to_string());
        assert!(sig_err(verifier.verify_at(&req, now).await.unwrap_err()).contains("Date"));

        req.headers.remove("date");
        assert!(sig_err(verifier.verify_at(&req, now).await.unwrap_err()).contains("missing Date"));
    }

    #[tokio::test]
    async fn test_wrong_key_is_opaque() {
        let (_t, verifier) = setup().await;
        let now = Utc::now();
        let req = signed_request(&like_from(ALICE), KEY, &local_keypair().private_key_pem, now);

        let err = verifier.verify_at(&req, now).await.unwrap_err();
        assert_eq!(sig_err(err), "Unauthorized: signature invalid");
    }

    #[tokio::test]
    async fn test_tampered_body_is_invalid() {
        let (_t, verifier) = setup().await;
        let now = Utc::now();
        let mut req = signed_request(&like_from(ALICE), KEY, &remote_keypair().private_key_pem, now);
        req.body_hash = body_hash(b"{}");

        let err = verifier.verify_at(&req, now).await.unwrap_err();
        assert_eq!(sig_err(err), "Unauthorized: signature invalid");
    }

    #[tokio::test]
    async fn test_blocked_signer_domain() {
        let (t, verifier) = setup().await;
        t.store
            .add_domain_block(domain_block::Model {
                id: 1,
                domain: "REMOTE.example".to_string(),
                scope: BlockScope::Instance,
                owner_id: None,
                created_at: Utc::now().into(),
            })
            .await;
        let now = Utc::now();
        let req = signed_request(&like_from(ALICE), KEY, &remote_keypair().private_key_pem, now);

        let err = verifier.verify_at(&req, now).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_blocked_payload_actor_domain() {
        let (t, verifier) = setup().await;
        t.store
            .add_domain_block(domain_block::Model {
                id: 1,
                domain: "evil.example".to_string(),
                scope: BlockScope::Instance,
                owner_id: None,
                created_at: Utc::now().into(),
            })
            .await;
        let now = Utc::now();
        let req = signed_request(
            &like_from("https://evil.example/users/mallory"),
            KEY,
            &remote_keypair().private_key_pem,
            now,
        );

        let err = verifier.verify_at(&req, now).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_unknown_payload_actor_is_rejected() {
        let (_t, verifier) = setup().await;
        let now = Utc::now();
        let req = signed_request(
            &like_from("https://other.example/users/carol"),
            KEY,
            &remote_keypair().private_key_pem,
            now,
        );

        let err = verifier.verify_at(&req, now).await.unwrap_err();
        assert!(sig_err(err).contains("unknown actor"));
    }

    #[tokio::test]
    async fn test_known_payload_actor_is_accepted() {
        let (t, verifier) = setup().await;
        t.seed_remote_actor(51, "carol", "other.example").await;
        let now = Utc::now();
        let req = signed_request(
            &like_from("https://other.example/users/carol"),
            KEY,
            &remote_keypair().private_key_pem,
            now,
        );

        let signer = verifier.verify_at(&req, now).await.unwrap();
        assert_eq!(signer.uri, ALICE);
    }

    #[tokio::test]
    async fn test_missing_signature_header() {
        let (_t, verifier) = setup().await;
        let now = Utc::now();
        let mut req = signed_request(&like_from(ALICE), KEY, &remote_keypair().private_key_pem, now);
        req.headers.remove("signature");

        let err = verifier.verify_at(&req, now).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_mismatched_digest_header() {
        let (_t, verifier) = setup().await;
        let now = Utc::now();
        let mut req = signed_request(&like_from(ALICE), KEY, &remote_keypair().private_key_pem, now);
        req.headers
            .insert("digest".to_string(), format!("SHA-256={}", body_hash(b"other")));

        let err = verifier.verify_at(&req, now).await.unwrap_err();
        assert_eq!(sig_err(err), "Unauthorized: signature invalid");
    }

    #[tokio::test]
    async fn test_local_mode_uses_cache_only() {
        let (t, verifier) = setup().await;
        let now = Utc::now();
        let delete = json!({
            "id": "https://remote.example/users/alice#delete",
            "type": "Delete",
            "actor": ALICE,
            "object": ALICE,
        });
        let req = signed_request(&delete, KEY, &remote_keypair().private_key_pem, now);
        assert_eq!(verifier.verify_local_at(&req, now).await.unwrap().id, 50);

        let gone = "https://gone.example/users/dave";
        let req = signed_request(
            &like_from(gone),
            "https://gone.example/users/dave#main-key",
            &remote_keypair().private_key_pem,
            now,
        );
        assert!(verifier.verify_local_at(&req, now).await.is_err());
        assert!(t.transport.fetched().await.is_empty());
    }
}
