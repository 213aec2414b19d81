use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::{NodeStore, RetryPolicy, SearchQuery, StoreError};
use crate::cache::keys::{node_key, search_key, user_key};
use crate::cache::{Cache, CacheConfig};
use crate::listing::ListingSnapshot;
use crate::node::{NewNode, NewUser, Node, NodeUpdate, User, UserUpdate};

/// Everything the store layer keeps in the cache
#[derive(Debug, Clone)]
pub enum CacheValue {
    User(User),
    Node(Node),
    Nodes(Vec<Node>),
    Listing(Arc<ListingSnapshot>),
}

/// Read-through cache and retry in front of a [`NodeStore`].
///
/// Reads consult the cache first. Writes go straight to the store, and once
/// the store has acknowledged a write every cached entry of the affected
/// user is dropped. A write whose outcome is unknown (retries exhausted)
/// also invalidates; a rejected write does not.
#[derive(Debug)]
pub struct CachedStore<S> {
    store: S,
    cache: Arc<dyn Cache<CacheValue>>,
    config: CacheConfig,
    retry: RetryPolicy,
}

impl<S: NodeStore> CachedStore<S> {
    pub fn new(
        store: S,
        cache: Arc<dyn Cache<CacheValue>>,
        config: CacheConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            cache,
            config,
            retry,
        }
    }

    /// The store behind the cache
    pub fn inner(&self) -> &S {
        &self.store
    }

    fn cache_get(&self, key: &str) -> Option<CacheValue> {
        match self.cache.get(key) {
            Ok(Some(value)) => {
                tracing::debug!(key, "cache hit");
                Some(value)
            }
            Ok(None) => {
                tracing::debug!(key, "cache miss");
                None
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "cache read failed, falling through to store");
                None
            }
        }
    }

    fn cache_set(&self, key: &str, value: CacheValue, ttl: Duration) {
        if let Err(e) = self.cache.set(key, value, ttl) {
            tracing::warn!(key, error = %e, "cache write failed");
        }
    }

    fn query_key<Q: Serialize + ?Sized>(&self, owner: &str, query: &Q) -> Option<String> {
        search_key(owner, query)
            .inspect_err(|e| tracing::warn!(owner, error = %e, "uncacheable query"))
            .ok()
    }

    /// Drop every cached entry owned by `username`
    pub fn invalidate(&self, username: &str) {
        if let Err(e) = self.cache.invalidate_namespace(username) {
            tracing::warn!(username, error = %e, "cache invalidation failed");
        }
    }

    fn settle<T>(&self, owners: &[&str], result: Result<T, StoreError>) -> Result<T, StoreError> {
        let invalidate = match &result {
            Ok(_) => true,
            Err(e) => e.outcome_unknown(),
        };
        if invalidate {
            for owner in owners {
                self.invalidate(owner);
            }
        }
        result
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_user(&self, username: &str) -> Result<User, StoreError> {
        let key = user_key(username, "profile", "");
        if let Some(CacheValue::User(user)) = self.cache_get(&key) {
            return Ok(user);
        }
        let user = self
            .retry
            .run("get_user", move || self.store.get_user(username))
            .await?;
        self.cache_set(&key, CacheValue::User(user.clone()), self.config.default_ttl);
        Ok(user)
    }

    pub async fn create_user(&self, user: &NewUser) -> Result<User, StoreError> {
        let result = self
            .retry
            .run("create_user", move || self.store.create_user(user))
            .await;
        self.settle(&[user.username.as_str()], result)
    }

    pub async fn update_user(&self, username: &str, update: &UserUpdate) -> Result<(), StoreError> {
        let result = self
            .retry
            .run("update_user", move || self.store.update_user(username, update))
            .await;
        self.settle(&[username], result)
    }

    pub async fn delete_user(&self, username: &str) -> Result<(), StoreError> {
        let result = self
            .retry
            .run("delete_user", move || self.store.delete_user(username))
            .await;
        self.settle(&[username], result)
    }

    /// Never cached: a stale answer here would outlive a key change
    pub async fn authenticate_user(&self, username: &str, key: &str) -> Result<bool, StoreError> {
        self.retry
            .run("authenticate_user", move || {
                self.store.authenticate_user(username, key)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn search_nodes(
        &self,
        owner: &str,
        query: &SearchQuery,
    ) -> Result<Vec<Node>, StoreError> {
        let key = self.query_key(owner, query);
        if let Some(CacheValue::Nodes(nodes)) = key.as_deref().and_then(|k| self.cache_get(k)) {
            return Ok(nodes);
        }
        let nodes = self
            .retry
            .run("search_nodes", move || self.store.search_nodes(owner, query))
            .await?;
        if let Some(key) = key {
            self.cache_set(&key, CacheValue::Nodes(nodes.clone()), self.config.default_ttl);
        }
        Ok(nodes)
    }

    /// Fetch nodes by id, in request order. Cached ids are served from the
    /// cache; the rest are fetched in a single store call.
    #[tracing::instrument(skip(self))]
    pub async fn get_nodes(&self, owner: &str, ids: &[String]) -> Result<Vec<Node>, StoreError> {
        let mut found: Vec<Option<Node>> = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();
        for id in ids {
            match self.cache_get(&node_key(owner, id)) {
                Some(CacheValue::Node(node)) => found.push(Some(node)),
                _ => {
                    found.push(None);
                    if !missing.contains(id) {
                        missing.push(id.clone());
                    }
                }
            }
        }

        if !missing.is_empty() {
            let missing = &missing;
            let fetched = self
                .retry
                .run("get_nodes", move || self.store.get_nodes(owner, missing))
                .await?;
            for node in fetched {
                self.cache_set(
                    &node_key(owner, &node.id),
                    CacheValue::Node(node.clone()),
                    self.config.default_ttl,
                );
                for (slot, id) in found.iter_mut().zip(ids) {
                    if slot.is_none() && *id == node.id {
                        *slot = Some(node.clone());
                    }
                }
            }
        }

        Ok(found.into_iter().flatten().collect())
    }

    pub async fn get_node(&self, owner: &str, id: &str) -> Result<Option<Node>, StoreError> {
        let ids = [id.to_string()];
        Ok(self.get_nodes(owner, &ids).await?.into_iter().next())
    }

    pub async fn create_node(&self, owner: &str, node: &NewNode) -> Result<Node, StoreError> {
        let result = self
            .retry
            .run("create_node", move || self.store.create_node(owner, node))
            .await;
        self.settle(&[owner], result)
    }

    pub async fn update_node(
        &self,
        owner: &str,
        id: &str,
        update: &NodeUpdate,
    ) -> Result<(), StoreError> {
        let result = self
            .retry
            .run("update_node", move || self.store.update_node(owner, id, update))
            .await;
        match &update.owner {
            Some(new_owner) => self.settle(&[owner, new_owner.as_str()], result),
            None => self.settle(&[owner], result),
        }
    }

    pub async fn delete_nodes(&self, owner: &str, ids: &[String]) -> Result<(), StoreError> {
        let result = self
            .retry
            .run("delete_nodes", move || self.store.delete_nodes(owner, ids))
            .await;
        self.settle(&[owner], result)
    }

    /// A cached explorer listing, keyed by the query that produced it
    pub fn cached_listing<Q: Serialize>(
        &self,
        owner: &str,
        query: &Q,
    ) -> Option<Arc<ListingSnapshot>> {
        let key = self.query_key(owner, query)?;
        match self.cache_get(&key) {
            Some(CacheValue::Listing(snapshot)) => Some(snapshot),
            _ => None,
        }
    }

    pub fn cache_listing<Q: Serialize>(
        &self,
        owner: &str,
        query: &Q,
        snapshot: Arc<ListingSnapshot>,
    ) {
        if let Some(key) = self.query_key(owner, query) {
            self.cache_set(&key, CacheValue::Listing(snapshot), self.config.listing_ttl);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::keys::{node_key, search_key};
    use crate::cache::MemoryCache;
    use crate::store::MemoryNodeStore;

    type Setup = (
        CachedStore<Arc<MemoryNodeStore>>,
        Arc<MemoryNodeStore>,
        Arc<MemoryCache<CacheValue>>,
    );

    fn setup() -> Setup {
        let store = Arc::new(MemoryNodeStore::new());
        let cache = Arc::new(MemoryCache::<CacheValue>::new());
        let cached = CachedStore::new(
            store.clone(),
            cache.clone(),
            CacheConfig::default(),
            RetryPolicy::new(3, Duration::ZERO),
        );
        (cached, store, cache)
    }

    async fn seed(cached: &CachedStore<Arc<MemoryNodeStore>>) -> Node {
        cached
            .create_user(&NewUser {
                username: "alice".into(),
                email: "alice@example.com".into(),
                salt: "s".into(),
                key: "k".into(),
            })
            .await
            .unwrap();
        cached
            .create_node("alice", &NewNode::file("notes", "hi", vec![]))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_reads_are_served_from_cache() {
        let (cached, store, _) = setup();
        let node = seed(&cached).await;

        cached.get_node("alice", &node.id).await.unwrap().unwrap();
        let calls = store.calls();
        let again = cached.get_node("alice", &node.id).await.unwrap().unwrap();
        assert_eq!(again.id, node.id);
        assert_eq!(store.calls(), calls);

        cached.search_nodes("alice", &SearchQuery::all()).await.unwrap();
        cached.search_nodes("alice", &SearchQuery::all()).await.unwrap();
        assert_eq!(store.calls(), calls + 1);
    }

    #[tokio::test]
    async fn test_update_invalidates_node_and_searches() {
        let (cached, _, cache) = setup();
        let node = seed(&cached).await;
        cached.get_node("alice", &node.id).await.unwrap();
        cached.search_nodes("alice", &SearchQuery::all()).await.unwrap();
        let search = search_key("alice", &SearchQuery::all()).unwrap();
        assert!(cache.get(&search).unwrap().is_some());

        let rename = NodeUpdate {
            name: Some("x".into()),
            ..Default::default()
        };
        cached.update_node("alice", &node.id, &rename).await.unwrap();
        assert!(cache.get(&node_key("alice", &node.id)).unwrap().is_none());
        assert!(cache.get(&search).unwrap().is_none());

        let fresh = cached.get_node("alice", &node.id).await.unwrap().unwrap();
        assert_eq!(fresh.name, "x");
    }

    #[tokio::test]
    async fn test_rejected_write_keeps_cache() {
        let (cached, _, cache) = setup();
        let node = seed(&cached).await;
        cached.get_node("alice", &node.id).await.unwrap();

        let result = cached
            .update_node("alice", "ghost", &NodeUpdate::clear_lock())
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
        assert!(cache.get(&node_key("alice", &node.id)).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let (cached, store, _) = setup();
        seed(&cached).await;

        store.fail_next(2);
        assert_eq!(cached.get_user("alice").await.unwrap().username, "alice");

        store.fail_next(5);
        let result = cached.search_nodes("alice", &SearchQuery::all()).await;
        assert!(matches!(result, Err(StoreError::Exhausted { attempts: 3, .. })));
    }

    #[tokio::test]
    async fn test_get_nodes_keeps_request_order() {
        let (cached, _, _) = setup();
        let a = seed(&cached).await;
        let b = cached
            .create_node("alice", &NewNode::directory("dir"))
            .await
            .unwrap();
        // warm only one of the two
        cached.get_node("alice", &b.id).await.unwrap();

        let ids = vec![b.id.clone(), "ghost".to_string(), a.id.clone()];
        let nodes = cached.get_nodes("alice", &ids).await.unwrap();
        let got: Vec<_> = nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(got, [b.id.as_str(), a.id.as_str()]);
    }
}
