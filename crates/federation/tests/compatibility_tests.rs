//! Shape of what we send.
//!
//! Mastodon, Pleroma/Akkoma and Misskey all accept these documents; the
//! tests pin the fields they rely on.

#![allow(clippy::unwrap_used)]

use serde_json::Value;
use vitrine_db::{
    FavouriteStore, FollowStore, NewStatus, StatusStore,
    entities::{
        favourite,
        status::Visibility,
        status_tag::{self, TagKind},
    },
    test_utils,
};
use vitrine_federation::{Dispatcher, objects::PUBLIC_COLLECTION, test_utils::TestContext};

const POST: &str = "https://vitrine.example/statuses/100";

/// bob (local) with alice (remote) following him.
async fn setup() -> TestContext {
    let t = TestContext::with_system_actor().await;
    t.seed_local_actor(10, "bob").await;
    t.seed_remote_actor(50, "alice", "remote.example").await;
    t.store
        .insert_follow(test_utils::follow(60, 50, 10, true))
        .await
        .unwrap();
    t
}

async fn publish(t: &TestContext, visibility: Visibility) -> Value {
    let mut status = test_utils::status(100, 10, POST, true);
    status.visibility = visibility;
    status.content = "<p>sunset #photo</p>".to_string();
    status.content_warning = Some("bright".to_string());
    status.sensitive = true;
    let mut attachment = test_utils::image_attachment(101, 100);
    attachment.description = Some("orange sky over the bay".to_string());

    t.store
        .insert_status(NewStatus {
            status,
            attachments: vec![attachment],
            tags: vec![
                status_tag::Model {
                    id: 102,
                    status_id: 100,
                    kind: TagKind::Hashtag,
                    name: "photo".to_string(),
                    actor_id: None,
                },
                status_tag::Model {
                    id: 103,
                    status_id: 100,
                    kind: TagKind::Mention,
                    name: "https://remote.example/users/alice".to_string(),
                    actor_id: Some(50),
                },
            ],
        })
        .await
        .unwrap();

    Dispatcher::new(t.ctx.clone()).publish_status(100).await.unwrap();
    t.queue.deliveries().await.remove(0).activity
}

mod mastodon {
    use super::*;

    #[tokio::test]
    async fn test_create_has_required_fields() {
        let t = setup().await;
        let create = publish(&t, Visibility::Public).await;

        assert_eq!(create["@context"], "https://www.w3.org/ns/activitystreams");
        assert_eq!(create["type"], "Create");
        assert_eq!(create["actor"], "https://vitrine.example/users/bob");
        assert_eq!(create["id"], format!("{POST}/activity"));

        let note = &create["object"];
        assert_eq!(note["type"], "Note");
        assert_eq!(note["id"], POST);
        assert_eq!(note["attributedTo"], "https://vitrine.example/users/bob");
        assert!(note["content"].as_str().unwrap().starts_with("<p>"));
        assert!(note["published"].is_string());
    }

    #[tokio::test]
    async fn test_public_addressing() {
        let t = setup().await;
        let create = publish(&t, Visibility::Public).await;

        assert_eq!(create["to"][0], PUBLIC_COLLECTION);
        let cc: Vec<&str> = create["object"]["cc"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert!(cc.contains(&"https://vitrine.example/users/bob/followers"));
        assert!(cc.contains(&"https://remote.example/users/alice"));
    }

    #[tokio::test]
    async fn test_followers_only_addressing_omits_public() {
        let t = setup().await;
        let create = publish(&t, Visibility::Followers).await;

        let to = create["object"]["to"].as_array().unwrap();
        assert!(!to.iter().any(|v| v == PUBLIC_COLLECTION));
        assert_eq!(to[0], "https://vitrine.example/users/bob/followers");
    }

    #[tokio::test]
    async fn test_attachment_and_content_warning() {
        let t = setup().await;
        let note = publish(&t, Visibility::Public).await["object"].clone();

        let attachment = &note["attachment"][0];
        assert_eq!(attachment["type"], "Document");
        assert!(attachment["url"].is_string());
        assert_eq!(attachment["mediaType"], "image/png");
        assert_eq!(attachment["name"], "orange sky over the bay");

        assert_eq!(note["summary"], "bright");
        assert_eq!(note["sensitive"], true);
    }

    #[tokio::test]
    async fn test_tags() {
        let t = setup().await;
        let note = publish(&t, Visibility::Public).await["object"].clone();
        let tags = note["tag"].as_array().unwrap();

        let hashtag = tags.iter().find(|tag| tag["type"] == "Hashtag").unwrap();
        assert_eq!(hashtag["name"], "#photo");
        assert_eq!(hashtag["href"], "https://vitrine.example/tags/photo");

        let mention = tags.iter().find(|tag| tag["type"] == "Mention").unwrap();
        assert_eq!(mention["href"], "https://remote.example/users/alice");
    }
}

mod misskey {
    use super::*;

    /// Misskey matches an Undo to its Like by the embedded activity.
    #[tokio::test]
    async fn test_undo_like_embeds_the_like() {
        let t = setup().await;
        t.store
            .insert_status(NewStatus {
                status: test_utils::status(200, 50, "https://remote.example/notes/200", false),
                attachments: vec![test_utils::image_attachment(201, 200)],
                tags: vec![],
            })
            .await
            .unwrap();
        let like = favourite::Model {
            id: 300,
            actor_id: 10,
            status_id: 200,
            activity_uri: Some("https://vitrine.example/likes/300".to_string()),
            created_at: chrono::Utc::now().into(),
        };
        t.store.insert_favourite(like.clone()).await.unwrap();

        Dispatcher::new(t.ctx.clone()).deliver_unlike(&like).await.unwrap();
        let undo = t.queue.deliveries().await.remove(0).activity;

        assert_eq!(undo["type"], "Undo");
        assert_eq!(undo["actor"], "https://vitrine.example/users/bob");
        assert_eq!(undo["object"]["type"], "Like");
        assert_eq!(undo["object"]["id"], "https://vitrine.example/likes/300");
        assert_eq!(undo["object"]["object"], "https://remote.example/notes/200");
    }
}
