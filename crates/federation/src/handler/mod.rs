//! `ActivityPub` request handlers.

#![allow(missing_docs)]

mod actor;
mod inbox;

pub use actor::actor_handler;
pub use inbox::{InboxState, inbox_handler, user_inbox_handler};

use axum::{
    Router,
    routing::{get, post},
};

/// Routes of the federation surface.
pub fn router(state: InboxState) -> Router {
    Router::new()
        .route("/inbox", post(inbox_handler))
        .route("/users/{username}", get(actor_handler))
        .route("/users/{username}/inbox", post(user_inbox_handler))
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{
        jobs::Job,
        signature::HttpSigner,
        test_utils::{BASE, TestContext, local_keypair, person_document, remote_keypair},
    };
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use url::Url;
    use vitrine_common::RsaKeypair;

    const ALICE: &str = "https://remote.example/users/alice";

    fn follow() -> Value {
        json!({
            "@context": "https://www.w3.org/ns/activitystreams",
            "id": "https://remote.example/follows/1",
            "type": "Follow",
            "actor": ALICE,
            "object": "https://vitrine.example/users/bob",
        })
    }

    /// A POST request signed the way remote servers sign deliveries.
    fn signed_post(path: &str, body: &Value, key_id: &str, keypair: &RsaKeypair) -> Request<Body> {
        let body = serde_json::to_vec(body).unwrap();
        let url = Url::parse(&format!("{BASE}{path}")).unwrap();
        let headers = HttpSigner::new(&keypair.private_key_pem, key_id.to_string())
            .unwrap()
            .sign_request("POST", &url, Some(&body))
            .unwrap();

        let mut request = Request::builder().method("POST").uri(path);
        for (name, value) in &headers {
            request = request.header(name, value);
        }
        request.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn test_signed_follow_is_queued() {
        let t = TestContext::with_system_actor().await;
        t.seed_local_actor(10, "bob").await;
        t.transport
            .serve(ALICE, person_document(ALICE, Some(&remote_keypair().public_key_pem)))
            .await;

        let response = router(InboxState::new(t.ctx.clone()))
            .oneshot(signed_post(
                "/users/bob/inbox",
                &follow(),
                &format!("{ALICE}#main-key"),
                remote_keypair(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(matches!(t.queue.jobs().await.as_slice(), [Job::Inbox(_)]));
    }

    #[tokio::test]
    async fn test_unsigned_request_is_rejected() {
        let t = TestContext::with_system_actor().await;
        let request = Request::builder()
            .method("POST")
            .uri("/inbox")
            .body(Body::from(serde_json::to_vec(&follow()).unwrap()))
            .unwrap();

        let response = router(InboxState::new(t.ctx.clone())).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(t.queue.jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_key_is_unauthorized() {
        let t = TestContext::with_system_actor().await;
        t.transport
            .serve(ALICE, person_document(ALICE, Some(&remote_keypair().public_key_pem)))
            .await;

        let response = router(InboxState::new(t.ctx.clone()))
            .oneshot(signed_post("/inbox", &follow(), &format!("{ALICE}#main-key"), local_keypair()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(t.queue.jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_activity_is_bad_request() {
        let t = TestContext::with_system_actor().await;
        let request = Request::builder()
            .method("POST")
            .uri("/inbox")
            .body(Body::from(r#"{"type": "Follow"}"#))
            .unwrap();

        let response = router(InboxState::new(t.ctx.clone())).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_user_inbox_is_not_found() {
        let t = TestContext::with_system_actor().await;
        let request = Request::builder()
            .method("POST")
            .uri("/users/nobody/inbox")
            .body(Body::from(serde_json::to_vec(&follow()).unwrap()))
            .unwrap();

        let response = router(InboxState::new(t.ctx.clone())).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_actor_document() {
        let t = TestContext::with_system_actor().await;
        t.seed_local_actor(10, "bob").await;

        let response = router(InboxState::new(t.ctx.clone()))
            .oneshot(Request::builder().uri("/users/bob").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let document: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(document["id"], "https://vitrine.example/users/bob");
        assert_eq!(document["publicKey"]["id"], "https://vitrine.example/users/bob#main-key");
    }
}
