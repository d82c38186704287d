//! Test helpers: a stub network, an in-memory media store and a fully wired
//! [`FederationContext`] over the in-memory store.

#![allow(clippy::expect_used, missing_docs)]

use std::{
    collections::HashMap,
    sync::{
        Arc, OnceLock,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use axum::http::HeaderMap;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use url::Url;
use uuid::Uuid;
use vitrine_common::{
    AppResult, MediaStore, RsaKeypair, StoredMedia, config::FederationConfig, generate_rsa_keypair,
};
use vitrine_db::{ActorStore, MemoryStore, Stores, entities::actor, test_utils};

use crate::{
    client::{ApClientError, ApTransport, FetchedMedia},
    context::FederationContext,
    jobs::InMemoryJobQueue,
    objects::PUBLIC_COLLECTION,
    resolver::{ActorResolver, StatusResolver},
    signature::HttpSigner,
    verifier::InboundRequest,
};

pub const BASE: &str = "https://vitrine.example";

/// Keypair shared by local test actors.
pub fn local_keypair() -> &'static RsaKeypair {
    static KEYS: OnceLock<RsaKeypair> = OnceLock::new();
    KEYS.get_or_init(|| generate_rsa_keypair().expect("generate local keypair"))
}

/// Keypair shared by remote test actors.
pub fn remote_keypair() -> &'static RsaKeypair {
    static KEYS: OnceLock<RsaKeypair> = OnceLock::new();
    KEYS.get_or_init(|| generate_rsa_keypair().expect("generate remote keypair"))
}

/// Network double serving canned documents and recording deliveries.
#[derive(Default)]
pub struct StubTransport {
    objects: Mutex<HashMap<String, Value>>,
    media: Mutex<HashMap<String, (String, Bytes)>>,
    fetched: Mutex<Vec<String>>,
    posted: Mutex<Vec<(String, Value)>>,
    post_failure: Mutex<Option<u16>>,
    post_attempts: AtomicUsize,
}

impl StubTransport {
    pub async fn serve(&self, url: &str, document: Value) {
        self.objects.lock().await.insert(url.to_string(), document);
    }

    pub async fn serve_media(&self, url: &str, content_type: &str, data: &[u8]) {
        self.media.lock().await.insert(
            url.to_string(),
            (content_type.to_string(), Bytes::copy_from_slice(data)),
        );
    }

    /// Answer every POST with `status` instead of 202.
    pub async fn fail_posts_with(&self, status: u16) {
        *self.post_failure.lock().await = Some(status);
    }

    /// Object URLs fetched so far.
    pub async fn fetched(&self) -> Vec<String> {
        self.fetched.lock().await.clone()
    }

    /// POSTs tried so far, failed ones included.
    pub fn post_attempts(&self) -> usize {
        self.post_attempts.load(Ordering::SeqCst)
    }

    /// `(inbox, activity)` pairs posted so far.
    pub async fn posted(&self) -> Vec<(String, Value)> {
        self.posted.lock().await.clone()
    }
}

fn not_found() -> ApClientError {
    ApClientError::Status {
        status: 404,
        body: String::new(),
    }
}

#[async_trait]
impl ApTransport for StubTransport {
    async fn fetch_object(&self, url: &Url, _signer: &HttpSigner) -> Result<Value, ApClientError> {
        self.fetched.lock().await.push(url.to_string());
        self.objects
            .lock()
            .await
            .get(url.as_str())
            .cloned()
            .ok_or_else(not_found)
    }

    async fn fetch_media(&self, url: &Url) -> Result<FetchedMedia, ApClientError> {
        self.media
            .lock()
            .await
            .get(url.as_str())
            .map(|(content_type, data)| FetchedMedia {
                content_type: content_type.clone(),
                data: data.clone(),
            })
            .ok_or_else(not_found)
    }

    async fn post_activity(
        &self,
        inbox: &Url,
        body: Bytes,
        _signer: &HttpSigner,
    ) -> Result<(), ApClientError> {
        self.post_attempts.fetch_add(1, Ordering::SeqCst);
        match *self.post_failure.lock().await {
            Some(410) => return Err(ApClientError::Gone),
            Some(status) => {
                return Err(ApClientError::Status {
                    status,
                    body: String::new(),
                });
            }
            None => {}
        }
        let activity = serde_json::from_slice(&body)
            .map_err(|e| ApClientError::InvalidBody(e.to_string()))?;
        self.posted.lock().await.push((inbox.to_string(), activity));
        Ok(())
    }
}

/// Media store keeping files in memory under `/files/`.
#[derive(Default)]
pub struct MemoryMediaStore {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn store(&self, data: &[u8], content_type: &str) -> AppResult<StoredMedia> {
        let key = Uuid::new_v4().simple().to_string();
        self.files.lock().await.insert(key.clone(), data.to_vec());
        Ok(StoredMedia {
            url: self.public_url(&key),
            key,
            size: data.len() as u64,
            content_type: content_type.to_string(),
            md5: String::new(),
        })
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.files.lock().await.remove(key);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("/files/{key}")
    }
}

/// A [`FederationContext`] over in-memory collaborators, with handles to
/// each of them.
pub struct TestContext {
    pub ctx: Arc<FederationContext>,
    pub store: Arc<MemoryStore>,
    pub queue: Arc<InMemoryJobQueue>,
    pub transport: Arc<StubTransport>,
    pub actors: ActorResolver,
    pub statuses: StatusResolver,
}

impl TestContext {
    /// Context without any actors. Outbound fetches fail for lack of a
    /// system actor.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(FederationConfig::default())
    }

    #[must_use]
    pub fn with_config(config: FederationConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(InMemoryJobQueue::new());
        let transport = Arc::new(StubTransport::default());
        let ctx = Arc::new(
            FederationContext::new(
                BASE,
                config,
                Stores::memory(store.clone()),
                transport.clone(),
                Arc::new(MemoryMediaStore::default()),
                queue.clone(),
            )
            .expect("build test context"),
        );
        let actors = ActorResolver::new(ctx.clone());
        let statuses = StatusResolver::new(ctx.clone(), actors.clone());

        Self {
            ctx,
            store,
            queue,
            transport,
            actors,
            statuses,
        }
    }

    /// Context whose system actor exists and can sign fetches.
    pub async fn with_system_actor() -> Self {
        let t = Self::new();
        let username = t.ctx.config.system_actor.clone();
        t.seed_local_actor(1, &username).await;
        t
    }

    /// Store a local actor holding [`local_keypair`].
    pub async fn seed_local_actor(&self, id: i64, username: &str) -> actor::Model {
        let keys = local_keypair();
        let actor = actor::Model {
            public_key_pem: Some(keys.public_key_pem.clone()),
            private_key_pem: Some(keys.private_key_pem.clone()),
            ..test_utils::local_actor(id, username, BASE)
        };
        self.store.upsert_actor(actor).await.expect("seed local actor")
    }

    /// Store a freshly refreshed remote actor holding [`remote_keypair`].
    pub async fn seed_remote_actor(&self, id: i64, username: &str, domain: &str) -> actor::Model {
        let actor = actor::Model {
            public_key_pem: Some(remote_keypair().public_key_pem.clone()),
            ..test_utils::remote_actor(id, username, domain)
        };
        self.store.upsert_actor(actor).await.expect("seed remote actor")
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Actor document for `uri` (`https://<host>/users/<name>`).
#[must_use]
pub fn person_document(uri: &str, public_key_pem: Option<&str>) -> Value {
    let url = Url::parse(uri).expect("actor uri");
    let host = url.host_str().unwrap_or_default();
    let username = url.path_segments().and_then(Iterator::last).unwrap_or_default();

    let mut doc = json!({
        "@context": ["https://www.w3.org/ns/activitystreams", "https://w3id.org/security/v1"],
        "type": "Person",
        "id": uri,
        "preferredUsername": username,
        "inbox": format!("{uri}/inbox"),
        "outbox": format!("{uri}/outbox"),
        "followers": format!("{uri}/followers"),
        "endpoints": { "sharedInbox": format!("https://{host}/inbox") },
    });
    if let Some(pem) = public_key_pem {
        doc["publicKey"] = json!({
            "id": format!("{uri}#main-key"),
            "owner": uri,
            "publicKeyPem": pem,
        });
    }
    doc
}

/// Public note by `author`, optionally carrying one image.
#[must_use]
pub fn note_document(uri: &str, author: &str, with_image: bool) -> Value {
    let mut doc = json!({
        "type": "Note",
        "id": uri,
        "attributedTo": author,
        "content": "<p>hello</p>",
        "published": "2026-01-01T00:00:00Z",
        "to": [PUBLIC_COLLECTION],
        "cc": [format!("{author}/followers")],
    });
    if with_image {
        doc["attachment"] = json!([{
            "type": "Document",
            "mediaType": "image/jpeg",
            "url": format!("{uri}/image.jpg"),
        }]);
    }
    doc
}

/// A POST to the shared inbox signed with `private_key_pem` at `at`.
#[must_use]
pub fn signed_request(
    activity: &Value,
    key_id: &str,
    private_key_pem: &str,
    at: DateTime<Utc>,
) -> InboundRequest {
    let body = serde_json::to_vec(activity).expect("serialize activity");
    let url = Url::parse(&format!("{BASE}/inbox")).expect("inbox url");
    let signer = HttpSigner::new(private_key_pem, key_id.to_string()).expect("signer");
    let headers: HeaderMap = signer
        .sign_request_at("POST", &url, Some(&body), at)
        .expect("sign request");

    InboundRequest::new("POST", "/inbox", &headers, &body, activity.clone())
}
