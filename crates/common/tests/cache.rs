//! Integration tests for cache coherence across store writes

mod common;

use std::time::Duration;

use ::common::cache::keys::{node_key, search_key, user_key};
use ::common::prelude::*;

#[tokio::test]
async fn test_node_entry_is_dropped_after_update() {
    let env = common::setup_test_env().await;
    let file = common::create_file(&env.drive, "alice", "notes", "").await;
    let key = node_key("alice", &file.id);

    env.cache
        .set(&key, CacheValue::Node(file.clone()), Duration::from_millis(300_000))
        .unwrap();
    assert!(matches!(env.cache.get(&key).unwrap(), Some(CacheValue::Node(n)) if n.id == file.id));

    let rename = NodeUpdate {
        name: Some("x".to_string()),
        ..Default::default()
    };
    env.drive
        .store()
        .update_node("alice", &file.id, &rename)
        .await
        .unwrap();
    assert!(env.cache.get(&key).unwrap().is_none());
}

#[tokio::test]
async fn test_every_search_entry_is_dropped_after_update() {
    let env = common::setup_test_env().await;
    let file = common::create_file(&env.drive, "alice", "report", "").await;
    let store = env.drive.store();

    let queries = [
        SearchQuery::all(),
        SearchQuery::all().matching("type", "file"),
        SearchQuery::all().regex("name", "^rep"),
    ];
    for query in &queries {
        store.search_nodes("alice", query).await.unwrap();
        let key = search_key("alice", query).unwrap();
        assert!(env.cache.get(&key).unwrap().is_some());
    }
    env.drive.list("alice", &ListingRequest::root()).await.unwrap();

    env.drive.rename("alice", &file.id, "summary").await.unwrap();

    for query in &queries {
        let key = search_key("alice", query).unwrap();
        assert!(env.cache.get(&key).unwrap().is_none());
    }
    let listing = env.drive.list("alice", &ListingRequest::root()).await.unwrap();
    assert_eq!(listing.nodes[0].node.name, "summary");
}

#[tokio::test]
async fn test_writes_leave_other_users_cached() {
    let env = common::setup_test_env().await;
    let alice_file = common::create_file(&env.drive, "alice", "a", "").await;
    let bob_file = common::create_file(&env.drive, "bob", "b", "").await;

    env.drive.node("bob", &bob_file.id).await.unwrap();
    env.drive.user("bob").await.unwrap();
    env.drive.rename("alice", &alice_file.id, "renamed").await.unwrap();

    assert!(env.cache.get(&node_key("bob", &bob_file.id)).unwrap().is_some());
    assert!(env
        .cache
        .get(&user_key("bob", "profile", ""))
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_profile_update_invalidates_profile() {
    let env = common::setup_test_env().await;
    assert_eq!(env.drive.user("alice").await.unwrap().email, "alice@example.com");

    let update = UserUpdate {
        email: Some("alice@example.org".to_string()),
        ..Default::default()
    };
    env.drive.update_user("alice", &update).await.unwrap();
    assert_eq!(env.drive.user("alice").await.unwrap().email, "alice@example.org");
}

#[tokio::test]
async fn test_entries_expire_after_ttl() {
    let env = common::setup_test_env_with(DriveConfig {
        cache: CacheConfig {
            default_ttl: Duration::from_millis(200),
            ..Default::default()
        },
        retry: RetryPolicy::new(3, Duration::ZERO),
        ..Default::default()
    })
    .await;
    let file = common::create_file(&env.drive, "alice", "notes", "").await;

    env.drive.node("alice", &file.id).await.unwrap();
    let calls = env.store.calls();
    env.drive.node("alice", &file.id).await.unwrap();
    assert_eq!(env.store.calls(), calls);

    tokio::time::sleep(Duration::from_millis(300)).await;
    env.drive.node("alice", &file.id).await.unwrap();
    assert_eq!(env.store.calls(), calls + 1);
}

#[tokio::test]
async fn test_failed_cache_reads_fall_through() {
    let env = common::setup_test_env().await;
    let file = common::create_file(&env.drive, "alice", "notes", "").await;

    // a wrongly-typed entry behaves like a miss
    env.cache
        .set(
            &node_key("alice", &file.id),
            CacheValue::Nodes(Vec::new()),
            Duration::from_secs(60),
        )
        .unwrap();
    let node = env.drive.node("alice", &file.id).await.unwrap();
    assert_eq!(node.id, file.id);
}
