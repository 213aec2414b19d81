use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use uuid::Uuid;

use super::{NodeStore, SearchQuery, StoreError};
use crate::clock::{Clock, SystemClock};
use crate::node::{NewNode, NewUser, Node, NodeType, NodeUpdate, User, UserUpdate};

#[derive(Debug)]
struct StoredUser {
    user: User,
    key: String,
}

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<String, StoredUser>,
    // insertion order doubles as the `after` cursor order
    nodes: Vec<Node>,
}

/// An in-process node store with the remote store's semantics.
///
/// Useful for tests and for running the server without a backend. Calls can
/// be made to fail transiently with [`MemoryNodeStore::fail_next`], and a
/// node update can be held back with [`MemoryNodeStore::delay_next_write`].
#[derive(Debug)]
pub struct MemoryNodeStore {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
    pending_failures: AtomicU32,
    calls: AtomicU32,
    write_delay_ms: AtomicU64,
}

impl Default for MemoryNodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryNodeStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            clock,
            pending_failures: AtomicU32::new(0),
            calls: AtomicU32::new(0),
            write_delay_ms: AtomicU64::new(0),
        }
    }

    /// Make the next `n` calls fail with [`StoreError::Transient`]
    pub fn fail_next(&self, n: u32) {
        self.pending_failures.store(n, Ordering::SeqCst);
    }

    /// Make the next node update wait `delay` before it is applied
    pub fn delay_next_write(&self, delay: Duration) {
        self.write_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Total calls received, including injected failures
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn inner(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|e| StoreError::Internal(format!("failed to acquire store lock: {}", e)))
    }

    /// Count the call and consume one injected failure, if any
    fn enter(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Transient("injected failure (555)".to_string()));
        }
        self.inner()
    }
}

fn size_of(node_type: NodeType, text: Option<&str>) -> Option<u64> {
    match node_type {
        NodeType::File => Some(text.map_or(0, |t| t.len() as u64)),
        _ => None,
    }
}

fn field_value(node: &Node, field: &str) -> Option<serde_json::Value> {
    match field {
        "name" => Some(node.name.clone().into()),
        "type" => Some(node.node_type.to_string().into()),
        "owner" => Some(node.owner.clone().into()),
        "node_id" => Some(node.id.clone().into()),
        "size" => node.size.map(Into::into),
        "tags" => Some(node.tags.clone().into()),
        _ => None,
    }
}

fn matches(node: &Node, field: &str, expected: &serde_json::Value) -> bool {
    match (field_value(node, field), expected) {
        // a tag query matches when the node carries that tag
        (Some(serde_json::Value::Array(tags)), serde_json::Value::String(_)) => {
            tags.contains(expected)
        }
        (Some(actual), _) => &actual == expected,
        (None, _) => false,
    }
}

fn regex_matches(node: &Node, field: &str, pattern: &Regex) -> bool {
    match field {
        "name" => pattern.is_match(&node.name),
        "text" => node.text.as_deref().is_some_and(|t| pattern.is_match(t)),
        "tags" => node.tags.iter().any(|t| pattern.is_match(t)),
        "type" => pattern.is_match(&node.node_type.to_string()),
        _ => false,
    }
}

#[async_trait]
impl NodeStore for MemoryNodeStore {
    async fn get_user(&self, username: &str) -> Result<User, StoreError> {
        let inner = self.enter()?;
        inner
            .users
            .get(username)
            .map(|stored| stored.user.clone())
            .ok_or_else(|| StoreError::NotFound(format!("user {username}")))
    }

    async fn create_user(&self, new: &NewUser) -> Result<User, StoreError> {
        let mut inner = self.enter()?;
        if inner.users.contains_key(&new.username) {
            return Err(StoreError::Rejected {
                status: 400,
                message: format!("user {} already exists", new.username),
            });
        }
        let user = User {
            username: new.username.clone(),
            email: new.email.clone(),
            salt: Some(new.salt.clone()),
        };
        inner.users.insert(
            new.username.clone(),
            StoredUser {
                user: user.clone(),
                key: new.key.clone(),
            },
        );
        Ok(user)
    }

    async fn update_user(&self, username: &str, update: &UserUpdate) -> Result<(), StoreError> {
        let mut inner = self.enter()?;
        let stored = inner
            .users
            .get_mut(username)
            .ok_or_else(|| StoreError::NotFound(format!("user {username}")))?;
        if let Some(email) = &update.email {
            stored.user.email = email.clone();
        }
        if let Some(salt) = &update.salt {
            stored.user.salt = Some(salt.clone());
        }
        if let Some(key) = &update.key {
            stored.key = key.clone();
        }
        Ok(())
    }

    async fn delete_user(&self, username: &str) -> Result<(), StoreError> {
        let mut inner = self.enter()?;
        if inner.users.remove(username).is_none() {
            return Err(StoreError::NotFound(format!("user {username}")));
        }
        inner.nodes.retain(|node| node.owner != username);
        Ok(())
    }

    async fn authenticate_user(&self, username: &str, key: &str) -> Result<bool, StoreError> {
        let inner = self.enter()?;
        let stored = inner
            .users
            .get(username)
            .ok_or_else(|| StoreError::NotFound(format!("user {username}")))?;
        Ok(stored.key == key)
    }

    async fn search_nodes(
        &self,
        owner: &str,
        query: &SearchQuery,
    ) -> Result<Vec<Node>, StoreError> {
        let patterns = query
            .regex_match
            .iter()
            .map(|(field, pattern)| {
                Regex::new(pattern)
                    .map(|re| (field.as_str(), re))
                    .map_err(|e| StoreError::Rejected {
                        status: 400,
                        message: format!("invalid regexMatch for {field}: {e}"),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let inner = self.enter()?;
        let owned = inner.nodes.iter().filter(|node| node.owner == owner);
        let start = match &query.after {
            Some(after) => owned
                .clone()
                .position(|node| &node.id == after)
                .map_or(usize::MAX, |i| i + 1),
            None => 0,
        };

        Ok(owned
            .skip(start)
            .filter(|node| {
                query
                    .match_fields
                    .iter()
                    .all(|(field, value)| matches(node, field, value))
            })
            .filter(|node| {
                patterns
                    .iter()
                    .all(|(field, re)| regex_matches(node, field, re))
            })
            .cloned()
            .collect())
    }

    async fn get_nodes(&self, owner: &str, ids: &[String]) -> Result<Vec<Node>, StoreError> {
        let inner = self.enter()?;
        Ok(ids
            .iter()
            .filter_map(|id| {
                inner
                    .nodes
                    .iter()
                    .find(|node| &node.id == id && node.owner == owner)
            })
            .cloned()
            .collect())
    }

    async fn create_node(&self, owner: &str, new: &NewNode) -> Result<Node, StoreError> {
        let now = self.clock.now();
        let mut inner = self.enter()?;
        if !inner.users.contains_key(owner) {
            return Err(StoreError::NotFound(format!("user {owner}")));
        }
        let node = Node {
            id: Uuid::new_v4().simple().to_string(),
            node_type: new.node_type,
            owner: owner.to_string(),
            name: new.name.clone(),
            tags: new.tags.clone(),
            text: new.text.clone(),
            contents: new.contents.clone(),
            size: size_of(new.node_type, new.text.as_deref()),
            created_at: now,
            modified_at: Some(now),
            lock: None,
        };
        inner.nodes.push(node.clone());
        Ok(node)
    }

    async fn update_node(
        &self,
        owner: &str,
        id: &str,
        update: &NodeUpdate,
    ) -> Result<(), StoreError> {
        let delay = self.write_delay_ms.swap(0, Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let now = self.clock.now();
        let mut inner = self.enter()?;
        if let Some(new_owner) = &update.owner {
            if !inner.users.contains_key(new_owner) {
                return Err(StoreError::Rejected {
                    status: 400,
                    message: format!("user {new_owner} does not exist"),
                });
            }
        }
        let node = inner
            .nodes
            .iter_mut()
            .find(|node| node.id == id && node.owner == owner)
            .ok_or_else(|| StoreError::NotFound(format!("node {id}")))?;

        if let Some(name) = &update.name {
            node.name = name.clone();
        }
        if let Some(text) = &update.text {
            node.text = Some(text.clone());
            node.size = size_of(node.node_type, node.text.as_deref());
        }
        if let Some(tags) = &update.tags {
            node.tags = tags.clone();
        }
        if let Some(contents) = &update.contents {
            node.contents = contents.clone();
        }
        if let Some(new_owner) = &update.owner {
            node.owner = new_owner.clone();
        }
        if let Some(lock) = &update.lock {
            node.lock = lock.clone();
        }
        node.modified_at = Some(now);
        Ok(())
    }

    async fn delete_nodes(&self, owner: &str, ids: &[String]) -> Result<(), StoreError> {
        let mut inner = self.enter()?;
        for id in ids {
            if !inner
                .nodes
                .iter()
                .any(|node| &node.id == id && node.owner == owner)
            {
                return Err(StoreError::NotFound(format!("node {id}")));
            }
        }
        inner
            .nodes
            .retain(|node| node.owner != owner || !ids.contains(&node.id));
        Ok(())
    }
}
