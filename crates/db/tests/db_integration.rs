//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DATABASE_URL` (default: see `TestDatabase::DEFAULT_URL`)

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use vitrine_db::{
    Stores,
    test_utils::{TestDatabase, follow, local_actor, remote_actor},
};

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_concurrent_actor_upserts_converge() {
    let db = TestDatabase::new().await.expect("Failed to connect");
    db.cleanup().await.unwrap();
    let stores = Stores::database(Arc::new(db.conn));

    let (a, b) = tokio::join!(
        stores.actors.upsert_actor(remote_actor(1, "alice", "remote.example")),
        stores.actors.upsert_actor(remote_actor(2, "alice", "remote.example")),
    );

    assert_eq!(a.unwrap().id, b.unwrap().id);
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_follow_counts() {
    let db = TestDatabase::new().await.expect("Failed to connect");
    db.cleanup().await.unwrap();
    let stores = Stores::database(Arc::new(db.conn));

    stores
        .actors
        .upsert_actor(local_actor(1, "bob", "https://vitrine.example"))
        .await
        .unwrap();
    stores
        .actors
        .upsert_actor(remote_actor(2, "alice", "remote.example"))
        .await
        .unwrap();
    let (_, created) = stores.follows.insert_follow(follow(3, 1, 2, true)).await.unwrap();
    let (_, again) = stores.follows.insert_follow(follow(4, 1, 2, true)).await.unwrap();
    stores.actors.recount_follows(2).await.unwrap();

    assert!(created);
    assert!(!again);
    let alice = stores.actors.find_actor(2).await.unwrap().unwrap();
    assert_eq!(alice.followers_count, 1);
    assert_eq!(stores.follows.count_local_followers(2).await.unwrap(), 1);
}
