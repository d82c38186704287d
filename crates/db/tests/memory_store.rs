//! Behaviour of the in-memory store that the federation core relies on.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use vitrine_db::{
    ActorStore, FavouriteStore, FollowStore, MemoryStore, NewStatus, StatusStore, Stores,
    TimelineStore,
    entities::{favourite, status, timeline_entry},
    test_utils::{follow, image_attachment, local_actor, remote_actor, status},
};

const BASE: &str = "https://vitrine.example";

async fn seeded() -> (Arc<MemoryStore>, Stores) {
    let store = Arc::new(MemoryStore::new());
    let stores = Stores::memory(store.clone());
    stores.actors.upsert_actor(local_actor(1, "bob", BASE)).await.unwrap();
    stores
        .actors
        .upsert_actor(remote_actor(2, "alice", "remote.example"))
        .await
        .unwrap();
    (store, stores)
}

#[tokio::test]
async fn upsert_by_uri_keeps_identity_and_counters() {
    let (_, stores) = seeded().await;
    stores.follows.insert_follow(follow(10, 1, 2, true)).await.unwrap();
    stores.actors.recount_follows(2).await.unwrap();

    let mut refreshed = remote_actor(99, "alice", "remote.example");
    refreshed.display_name = Some("Alice".to_string());
    let stored = stores.actors.upsert_actor(refreshed).await.unwrap();

    assert_eq!(stored.id, 2);
    assert_eq!(stored.followers_count, 1);
    assert_eq!(stored.display_name.as_deref(), Some("Alice"));
}

#[tokio::test]
async fn local_followers_are_paged_in_id_order() {
    let (_, stores) = seeded().await;
    for id in [5, 3, 4] {
        stores
            .actors
            .upsert_actor(local_actor(id, &format!("user{id}"), BASE))
            .await
            .unwrap();
        stores.follows.insert_follow(follow(100 + id, id, 2, true)).await.unwrap();
    }
    stores.follows.insert_follow(follow(200, 1, 2, false)).await.unwrap();

    let first = stores.follows.local_followers(2, None, 2).await.unwrap();
    let second = stores.follows.local_followers(2, Some(4), 2).await.unwrap();

    assert_eq!(first, vec![3, 4]);
    assert_eq!(second, vec![5]);
    assert_eq!(stores.follows.count_local_followers(2).await.unwrap(), 3);
}

#[tokio::test]
async fn deleting_a_status_cascades() {
    let (store, stores) = seeded().await;
    let post = stores
        .statuses
        .insert_status(NewStatus {
            status: status(20, 2, "https://remote.example/notes/1", false),
            attachments: vec![image_attachment(21, 20)],
            tags: vec![],
        })
        .await
        .unwrap();
    stores
        .statuses
        .insert_status(NewStatus {
            status: status::Model {
                reblog_of_id: Some(post.id),
                ..status(30, 1, "https://vitrine.example/statuses/30/activity", true)
            },
            attachments: vec![],
            tags: vec![],
        })
        .await
        .unwrap();
    stores
        .favourites
        .insert_favourite(favourite::Model {
            id: 40,
            actor_id: 1,
            status_id: 20,
            activity_uri: None,
            created_at: chrono::Utc::now().into(),
        })
        .await
        .unwrap();
    stores
        .timelines
        .insert_timeline_entry(timeline_entry::Model {
            id: 50,
            owner_id: 1,
            status_id: 20,
            content_status_id: 20,
            created_at: chrono::Utc::now().into(),
        })
        .await
        .unwrap();

    stores.statuses.delete_status(20).await.unwrap();

    assert_eq!(store.status_count().await, 0);
    assert_eq!(store.favourite_count().await, 0);
    assert!(stores.statuses.attachments(20).await.unwrap().is_empty());
    assert!(!stores.timelines.timeline_contains(1, 20).await.unwrap());
}

#[tokio::test]
async fn insert_status_is_idempotent_by_uri() {
    let (store, stores) = seeded().await;
    let first = stores
        .statuses
        .insert_status(NewStatus {
            status: status(20, 2, "https://remote.example/notes/1", false),
            attachments: vec![],
            tags: vec![],
        })
        .await
        .unwrap();
    let second = stores
        .statuses
        .insert_status(NewStatus {
            status: status(21, 2, "https://remote.example/notes/1", false),
            attachments: vec![],
            tags: vec![],
        })
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(store.status_count().await, 1);
}

#[tokio::test]
async fn counters_are_recomputed_from_rows() {
    let (_, stores) = seeded().await;
    stores
        .statuses
        .insert_status(NewStatus {
            status: status(20, 2, "https://remote.example/notes/1", false),
            attachments: vec![],
            tags: vec![],
        })
        .await
        .unwrap();
    stores.actors.recount_statuses(2).await.unwrap();
    stores.actors.recount_statuses(2).await.unwrap();

    let alice = stores.actors.find_actor(2).await.unwrap().unwrap();
    assert_eq!(alice.status_count, 1);
}
