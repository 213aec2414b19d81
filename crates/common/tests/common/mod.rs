//! Shared test utilities for Drive integration tests
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use common::prelude::*;

pub type TestDrive = Drive<Arc<MemoryNodeStore>>;

pub struct TestEnv {
    pub drive: TestDrive,
    pub store: Arc<MemoryNodeStore>,
    pub cache: Arc<MemoryCache<CacheValue>>,
    pub clock: Arc<ManualClock>,
}

/// A drive over the in-memory store with users `alice` and `bob`,
/// a manual clock and no retry backoff
pub async fn setup_test_env() -> TestEnv {
    setup_test_env_with(DriveConfig {
        retry: RetryPolicy::new(3, Duration::ZERO),
        ..Default::default()
    })
    .await
}

pub async fn setup_test_env_with(config: DriveConfig) -> TestEnv {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let clock = Arc::new(ManualClock::new(
        Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
    ));
    let store = Arc::new(MemoryNodeStore::with_clock(clock.clone()));
    let cache = Arc::new(MemoryCache::<CacheValue>::new());
    let drive = Drive::new(store.clone(), cache.clone(), config).with_clock(clock.clone());

    for name in ["alice", "bob"] {
        drive
            .store()
            .create_user(&NewUser {
                username: name.to_string(),
                email: format!("{name}@example.com"),
                salt: "salt".to_string(),
                key: "key".to_string(),
            })
            .await
            .unwrap();
    }

    TestEnv {
        drive,
        store,
        cache,
        clock,
    }
}

pub async fn create_file(drive: &TestDrive, owner: &str, name: &str, text: &str) -> Node {
    drive
        .create_node(owner, NewNode::file(name, text, vec![]), None)
        .await
        .unwrap()
}
