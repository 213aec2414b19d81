//! Node and user records
//!
//! These mirror the JSON shapes served by the remote filesystem API. Field
//! names on the wire follow the remote store (`node_id`, `createdAt`, ...);
//! timestamps travel as milliseconds since the Unix epoch.
//!
//! Containment is parent-defined: a directory lists the ids of its children
//! in `contents`, and nothing on the child points back. A symlink stores its
//! target id as the single element of `contents`.

use std::fmt;

use chrono::serde::{ts_milliseconds, ts_milliseconds_option};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod validate;

pub use validate::{
    parse_tags, validate_name, validate_tags, validate_text, ValidationError, MAX_TAGS,
    MAX_TEXT_BYTES,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    File,
    Directory,
    Symlink,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::File => write!(f, "file"),
            NodeType::Directory => write!(f, "directory"),
            NodeType::Symlink => write!(f, "symlink"),
        }
    }
}

/// An advisory edit lock as recorded on a node.
///
/// Nothing stops a write that ignores it; it only coordinates editor
/// sessions that go through the [`LockManager`](crate::lock::LockManager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    #[serde(rename = "user")]
    pub owner: String,
    /// Session-scoped client id, distinguishes two tabs of the same user
    pub client: String,
    #[serde(rename = "createdAt", with = "ts_milliseconds")]
    pub acquired_at: DateTime<Utc>,
}

impl Lock {
    pub fn new(owner: &str, client: &str, acquired_at: DateTime<Utc>) -> Self {
        Self {
            owner: owner.to_string(),
            client: client.to_string(),
            acquired_at,
        }
    }

    /// Whether this lock belongs to exactly this owner + client session
    pub fn held_by(&self, owner: &str, client: &str) -> bool {
        self.owner == owner && self.client == client
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "node_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub owner: String,
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub contents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(rename = "createdAt", with = "ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(
        rename = "modifiedAt",
        default,
        with = "ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub modified_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock: Option<Lock>,
}

impl Node {
    pub fn is_file(&self) -> bool {
        self.node_type == NodeType::File
    }

    pub fn is_directory(&self) -> bool {
        self.node_type == NodeType::Directory
    }

    pub fn is_symlink(&self) -> bool {
        self.node_type == NodeType::Symlink
    }

    /// The id a symlink points at, if any
    pub fn symlink_target(&self) -> Option<&str> {
        if !self.is_symlink() {
            return None;
        }
        self.contents.first().map(String::as_str)
    }

    /// Modification time, falling back to creation time
    pub fn last_modified(&self) -> DateTime<Utc> {
        self.modified_at.unwrap_or(self.created_at)
    }
}

/// Payload for creating a node. The store assigns id, owner and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNode {
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub contents: Vec<String>,
}

impl NewNode {
    pub fn file(name: &str, text: &str, tags: Vec<String>) -> Self {
        Self {
            node_type: NodeType::File,
            name: name.to_string(),
            text: Some(text.to_string()),
            tags,
            contents: Vec::new(),
        }
    }

    pub fn directory(name: &str) -> Self {
        Self {
            node_type: NodeType::Directory,
            name: name.to_string(),
            text: None,
            tags: Vec::new(),
            contents: Vec::new(),
        }
    }

    pub fn symlink(name: &str, target: &str) -> Self {
        Self {
            node_type: NodeType::Symlink,
            name: name.to_string(),
            text: None,
            tags: Vec::new(),
            contents: vec![target.to_string()],
        }
    }
}

/// A partial node update. Unset fields are left untouched by the store.
///
/// `lock` is tri-state: `None` leaves the lock alone, `Some(None)` clears
/// it (serialised as `null`), `Some(Some(lock))` sets it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodeUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contents: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock: Option<Option<Lock>>,
}

impl NodeUpdate {
    pub fn set_lock(lock: Lock) -> Self {
        Self {
            lock: Some(Some(lock)),
            ..Default::default()
        }
    }

    pub fn clear_lock() -> Self {
        Self {
            lock: Some(None),
            ..Default::default()
        }
    }

    pub fn contents(contents: Vec<String>) -> Self {
        Self {
            contents: Some(contents),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub salt: String,
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_node_wire_format() {
        let raw = serde_json::json!({
            "node_id": "n1",
            "type": "symlink",
            "owner": "alice",
            "name": "shortcut",
            "contents": ["n2"],
            "createdAt": 1_700_000_000_000i64,
            "lock": { "user": "alice", "client": "tab-a", "createdAt": 1_700_000_060_000i64 }
        });

        let node: Node = serde_json::from_value(raw).unwrap();
        assert_eq!(node.id, "n1");
        assert!(node.is_symlink());
        assert_eq!(node.symlink_target(), Some("n2"));
        assert!(node.tags.is_empty());
        assert_eq!(node.last_modified(), node.created_at);

        let lock = node.lock.unwrap();
        assert!(lock.held_by("alice", "tab-a"));
        assert!(!lock.held_by("alice", "tab-b"));
        assert_eq!(
            lock.acquired_at,
            Utc.timestamp_millis_opt(1_700_000_060_000).unwrap()
        );
    }

    #[test]
    fn test_update_lock_tristate() {
        let untouched = serde_json::to_value(NodeUpdate::contents(vec!["a".into()])).unwrap();
        assert_eq!(untouched, serde_json::json!({ "contents": ["a"] }));

        let cleared = serde_json::to_value(NodeUpdate::clear_lock()).unwrap();
        assert_eq!(cleared, serde_json::json!({ "lock": null }));

        let lock = Lock::new("bob", "c1", Utc.timestamp_millis_opt(5_000).unwrap());
        let set = serde_json::to_value(NodeUpdate::set_lock(lock)).unwrap();
        assert_eq!(
            set,
            serde_json::json!({ "lock": { "user": "bob", "client": "c1", "createdAt": 5000 } })
        );
    }
}
