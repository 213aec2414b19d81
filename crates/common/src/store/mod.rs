//! The remote node/user store
//!
//! [`NodeStore`] is the narrow interface to the authoritative store. It is
//! owner-scoped: every node call names the user whose nodes it touches, and
//! nodes belonging to anyone else are invisible to it.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::node::{NewNode, NewUser, Node, NodeUpdate, User, UserUpdate};

mod cached;
mod memory;
mod retry;

pub use cached::{CacheValue, CachedStore};
pub use memory::MemoryNodeStore;
pub use retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),
    /// Worth retrying: the store signalled a transient failure (HTTP 555)
    ///  or the request never reached it
    #[error("transient store failure: {0}")]
    Transient(String),
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<StoreError>,
    },
    /// The store refused the request; retrying will not help
    #[error("store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("store error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }

    /// Whether the write may or may not have been applied
    pub fn outcome_unknown(&self) -> bool {
        matches!(
            self,
            StoreError::Transient(_) | StoreError::Exhausted { .. } | StoreError::Internal(_)
        )
    }
}

/// Filters for a node search.
///
/// Maps are ordered so the JSON encoding is stable and can be folded into
/// a cache key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Only return nodes stored after this id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    /// Exact field matches, e.g. `{"type": "directory"}`
    #[serde(rename = "match", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_fields: BTreeMap<String, serde_json::Value>,
    /// Regex matches against string fields, e.g. `{"name": "^report"}`
    #[serde(
        rename = "regexMatch",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub regex_match: BTreeMap<String, String>,
}

impl SearchQuery {
    /// Every node the user owns
    pub fn all() -> Self {
        Self::default()
    }

    pub fn matching(mut self, field: &str, value: impl Into<serde_json::Value>) -> Self {
        self.match_fields.insert(field.to_string(), value.into());
        self
    }

    pub fn regex(mut self, field: &str, pattern: &str) -> Self {
        self.regex_match
            .insert(field.to_string(), pattern.to_string());
        self
    }

    pub fn after(mut self, id: &str) -> Self {
        self.after = Some(id.to_string());
        self
    }
}

#[async_trait]
pub trait NodeStore: Debug + Send + Sync {
    async fn get_user(&self, username: &str) -> Result<User, StoreError>;

    async fn create_user(&self, user: &NewUser) -> Result<User, StoreError>;

    async fn update_user(&self, username: &str, update: &UserUpdate) -> Result<(), StoreError>;

    async fn delete_user(&self, username: &str) -> Result<(), StoreError>;

    /// Check a derived login key; `Ok(false)` on a wrong key
    async fn authenticate_user(&self, username: &str, key: &str) -> Result<bool, StoreError>;

    async fn search_nodes(&self, owner: &str, query: &SearchQuery)
        -> Result<Vec<Node>, StoreError>;

    /// Fetch nodes by id. Ids the owner cannot see are left out of the
    ///  result rather than failing the whole call.
    async fn get_nodes(&self, owner: &str, ids: &[String]) -> Result<Vec<Node>, StoreError>;

    async fn create_node(&self, owner: &str, node: &NewNode) -> Result<Node, StoreError>;

    async fn update_node(
        &self,
        owner: &str,
        id: &str,
        update: &NodeUpdate,
    ) -> Result<(), StoreError>;

    async fn delete_nodes(&self, owner: &str, ids: &[String]) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: NodeStore + ?Sized> NodeStore for Arc<T> {
    async fn get_user(&self, username: &str) -> Result<User, StoreError> {
        (**self).get_user(username).await
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, StoreError> {
        (**self).create_user(user).await
    }

    async fn update_user(&self, username: &str, update: &UserUpdate) -> Result<(), StoreError> {
        (**self).update_user(username, update).await
    }

    async fn delete_user(&self, username: &str) -> Result<(), StoreError> {
        (**self).delete_user(username).await
    }

    async fn authenticate_user(&self, username: &str, key: &str) -> Result<bool, StoreError> {
        (**self).authenticate_user(username, key).await
    }

    async fn search_nodes(
        &self,
        owner: &str,
        query: &SearchQuery,
    ) -> Result<Vec<Node>, StoreError> {
        (**self).search_nodes(owner, query).await
    }

    async fn get_nodes(&self, owner: &str, ids: &[String]) -> Result<Vec<Node>, StoreError> {
        (**self).get_nodes(owner, ids).await
    }

    async fn create_node(&self, owner: &str, node: &NewNode) -> Result<Node, StoreError> {
        (**self).create_node(owner, node).await
    }

    async fn update_node(
        &self,
        owner: &str,
        id: &str,
        update: &NodeUpdate,
    ) -> Result<(), StoreError> {
        (**self).update_node(owner, id, update).await
    }

    async fn delete_nodes(&self, owner: &str, ids: &[String]) -> Result<(), StoreError> {
        (**self).delete_nodes(owner, ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_query_wire_format() {
        let query = SearchQuery::all()
            .regex("name", "^rep")
            .matching("type", "file")
            .after("n9");
        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            serde_json::json!({
                "after": "n9",
                "match": { "type": "file" },
                "regexMatch": { "name": "^rep" }
            })
        );
        assert_eq!(serde_json::to_value(SearchQuery::all()).unwrap(), serde_json::json!({}));
    }
}
