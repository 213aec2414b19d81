//! The service facade the web layer talks to
//!
//! `Drive` ties the lock table, the cached store and the tree helpers
//! together. It never holds a lock-table or cache mutex across an await;
//! the only suspension points are store calls.
//!
//! Editor session calls on one node run one at a time, so the lock recorded
//! on the remote node always matches the in-process lock table once a call
//! returns.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::cache::{Cache, CacheConfig};
use crate::clock::{Clock, SystemClock};
use crate::error::DriveError;
use crate::listing::{paginate, ListedNode, Listing, ListingRequest, ListingSnapshot};
use crate::lock::{LockConfig, LockConflict, LockHolder, LockManager};
use crate::node::{
    validate_name, validate_tags, validate_text, NewNode, Node, NodeType, NodeUpdate, User,
    UserUpdate, ValidationError,
};
use crate::search::{self, SearchRequest, SearchResults};
use crate::store::{CacheValue, CachedStore, NodeStore, RetryPolicy, SearchQuery};
use crate::tree;

const SESSION_STRIPES: usize = 64;

#[derive(Debug, Clone, Default)]
pub struct DriveConfig {
    pub lock: LockConfig,
    pub cache: CacheConfig,
    pub retry: RetryPolicy,
}

/// Changes an editor session wants saved. Unset fields stay as they are.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileEdit {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Result of a conflict poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictStatus {
    pub conflict: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder: Option<LockHolder>,
}

impl From<Option<LockConflict>> for ConflictStatus {
    fn from(conflict: Option<LockConflict>) -> Self {
        match conflict {
            Some(c) => Self {
                conflict: true,
                remaining_secs: Some(c.remaining_secs),
                holder: Some(c.holder),
            },
            None => Self {
                conflict: false,
                remaining_secs: None,
                holder: None,
            },
        }
    }
}

#[derive(Debug)]
pub struct Drive<S> {
    store: CachedStore<S>,
    locks: LockManager,
    clock: Arc<dyn Clock>,
    // serialises read-modify-write of directory contents within this process
    structure: Mutex<()>,
    // editor sessions, striped by node id
    sessions: Vec<Mutex<()>>,
}

impl<S: NodeStore> Drive<S> {
    pub fn new(store: S, cache: Arc<dyn Cache<CacheValue>>, config: DriveConfig) -> Self {
        Self {
            store: CachedStore::new(store, cache, config.cache, config.retry),
            locks: LockManager::new(config.lock),
            clock: Arc::new(SystemClock),
            structure: Mutex::new(()),
            sessions: (0..SESSION_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &CachedStore<S> {
        &self.store
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// A node `owner` can see, or `NotFound`
    pub async fn node(&self, owner: &str, id: &str) -> Result<Node, DriveError> {
        let node = self
            .store
            .get_node(owner, id)
            .await?
            .ok_or_else(|| DriveError::not_found(format!("node {id}")))?;
        if node.owner != owner {
            return Err(DriveError::NotOwner);
        }
        Ok(node)
    }

    async fn file(&self, owner: &str, id: &str) -> Result<Node, DriveError> {
        let node = self.node(owner, id).await?;
        if !node.is_file() {
            return Err(DriveError::InvalidNodeType(node.node_type.to_string()));
        }
        // pick up a lock recorded by an earlier run of this process
        self.locks.adopt(id, node.lock.as_ref(), self.clock.now());
        Ok(node)
    }

    async fn all_nodes(&self, owner: &str) -> Result<Vec<Node>, DriveError> {
        Ok(self.store.search_nodes(owner, &SearchQuery::all()).await?)
    }

    /// Held from the lock-table change until the remote node mirrors it
    fn session(&self, id: &str) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        &self.sessions[hasher.finish() as usize % self.sessions.len()]
    }

    /// Start an editing session on a file
    #[tracing::instrument(skip(self))]
    pub async fn open_editor(
        &self,
        owner: &str,
        client: &str,
        id: &str,
    ) -> Result<Node, DriveError> {
        let _session = self.session(id).lock().await;
        let mut node = self.file(owner, id).await?;
        let lock = self.locks.acquire(id, owner, client, self.clock.now())?;

        let mirrored = self
            .store
            .update_node(owner, id, &NodeUpdate::set_lock(lock.clone()))
            .await;
        if let Err(e) = mirrored {
            self.locks.release(id, owner, client);
            return Err(e.into());
        }

        node.lock = Some(lock);
        Ok(node)
    }

    /// Save editor content under the session's lock.
    ///
    /// Nothing is written when another live session holds the lock.
    #[tracing::instrument(skip(self, edit))]
    pub async fn autosave(
        &self,
        owner: &str,
        client: &str,
        id: &str,
        edit: FileEdit,
    ) -> Result<Node, DriveError> {
        if let Some(text) = &edit.text {
            validate_text(text)?;
        }
        let tags = edit.tags.as_deref().map(validate_tags).transpose()?;
        let name = edit.name.as_deref().map(validate_name).transpose()?;

        let _session = self.session(id).lock().await;
        self.file(owner, id).await?;
        let lock = self.locks.autosave(id, owner, client, self.clock.now())?;

        let update = NodeUpdate {
            name,
            text: edit.text,
            tags,
            lock: Some(Some(lock)),
            ..Default::default()
        };
        self.store.update_node(owner, id, &update).await?;
        tracing::debug!(node_id = %id, owner, "autosaved");
        self.node(owner, id).await
    }

    /// Poll whether another session has taken the file
    pub async fn check_conflict(
        &self,
        owner: &str,
        client: &str,
        id: &str,
    ) -> Result<ConflictStatus, DriveError> {
        self.file(owner, id).await?;
        Ok(self
            .locks
            .check_conflict(id, owner, client, self.clock.now())
            .into())
    }

    /// Take the lock regardless of who holds it. Owner only.
    #[tracing::instrument(skip(self))]
    pub async fn force_takeover(
        &self,
        owner: &str,
        client: &str,
        id: &str,
    ) -> Result<Node, DriveError> {
        let _session = self.session(id).lock().await;
        let mut node = self.file(owner, id).await?;
        let (lock, _) = self.locks.force_acquire(id, owner, client, self.clock.now());
        self.store
            .update_node(owner, id, &NodeUpdate::set_lock(lock.clone()))
            .await?;
        node.lock = Some(lock);
        Ok(node)
    }

    /// End an editing session. Returns whether this session held the lock;
    /// releasing someone else's lock does nothing.
    #[tracing::instrument(skip(self))]
    pub async fn release(&self, owner: &str, client: &str, id: &str) -> Result<bool, DriveError> {
        let _session = self.session(id).lock().await;
        let node = self.store.get_node(owner, id).await?;
        if let Some(node) = &node {
            self.locks.adopt(id, node.lock.as_ref(), self.clock.now());
        }
        if !self.locks.release(id, owner, client) {
            return Ok(false);
        }
        if node.is_some() {
            self.store
                .update_node(owner, id, &NodeUpdate::clear_lock())
                .await?;
        }
        Ok(true)
    }

    /// Create a node, optionally inside the directory `parent`
    #[tracing::instrument(skip(self, new), fields(name = %new.name, node_type = %new.node_type))]
    pub async fn create_node(
        &self,
        owner: &str,
        new: NewNode,
        parent: Option<&str>,
    ) -> Result<Node, DriveError> {
        let mut new = new;
        new.name = validate_name(&new.name)?;
        new.tags = validate_tags(&new.tags)?;
        match new.node_type {
            NodeType::File => validate_text(new.text.as_deref().unwrap_or_default())?,
            NodeType::Symlink if new.contents.len() > 1 => {
                return Err(ValidationError::InvalidSymlink.into())
            }
            _ => {}
        }

        let _guard = self.structure.lock().await;
        if let Some(parent) = parent {
            let dir = self.node(owner, parent).await?;
            if !dir.is_directory() {
                return Err(DriveError::InvalidNodeType(dir.node_type.to_string()));
            }
        }
        if new.node_type == NodeType::Directory && !new.contents.is_empty() {
            let all = self.all_nodes(owner).await?;
            if let Some(taken) = new
                .contents
                .iter()
                .find(|id| !tree::containers_of(id, &all).is_empty())
            {
                return Err(DriveError::AlreadyContained(taken.clone()));
            }
        }

        let node = self.store.create_node(owner, &new).await?;
        if let Some(parent) = parent {
            // re-read: the directory may have changed since the check above
            let dir = self.node(owner, parent).await?;
            let mut contents = dir.contents;
            contents.push(node.id.clone());
            self.store
                .update_node(owner, parent, &NodeUpdate::contents(contents))
                .await?;
        }
        tracing::info!(node_id = %node.id, owner, "created node");
        Ok(node)
    }

    /// Delete a node and drop it from every directory listing it.
    ///
    /// Children of a deleted directory are not deleted; they surface at the
    /// root.
    #[tracing::instrument(skip(self))]
    pub async fn delete_node(&self, owner: &str, id: &str) -> Result<(), DriveError> {
        let _guard = self.structure.lock().await;
        let all = self.all_nodes(owner).await?;
        if tree::find(&all, id).is_none() {
            return Err(DriveError::not_found(format!("node {id}")));
        }

        self.store.delete_nodes(owner, &[id.to_string()]).await?;
        self.locks.forget(id);
        self.detach(owner, id, &all, None).await?;
        tracing::info!(node_id = %id, owner, "deleted node");
        Ok(())
    }

    pub async fn rename(&self, owner: &str, id: &str, name: &str) -> Result<Node, DriveError> {
        let name = validate_name(name)?;
        self.node(owner, id).await?;
        let update = NodeUpdate {
            name: Some(name),
            ..Default::default()
        };
        self.store.update_node(owner, id, &update).await?;
        self.node(owner, id).await
    }

    /// Replace a file's tags
    pub async fn update_tags(
        &self,
        owner: &str,
        id: &str,
        tags: &[String],
    ) -> Result<Node, DriveError> {
        let tags = validate_tags(tags)?;
        self.file(owner, id).await?;
        let update = NodeUpdate {
            tags: Some(tags),
            ..Default::default()
        };
        self.store.update_node(owner, id, &update).await?;
        self.node(owner, id).await
    }

    /// Hand a node to another existing user.
    ///
    /// The node leaves the old owner's directories, so it shows up at the new
    /// owner's root.
    #[tracing::instrument(skip(self))]
    pub async fn change_owner(
        &self,
        owner: &str,
        id: &str,
        new_owner: &str,
    ) -> Result<(), DriveError> {
        let _guard = self.structure.lock().await;
        self.node(owner, id).await?;
        self.store.get_user(new_owner).await?;

        let all = self.all_nodes(owner).await?;
        let update = NodeUpdate {
            owner: Some(new_owner.to_string()),
            lock: Some(None),
            ..Default::default()
        };
        self.store.update_node(owner, id, &update).await?;
        self.locks.forget(id);
        self.detach(owner, id, &all, None).await?;
        tracing::info!(node_id = %id, owner, new_owner, "changed owner");
        Ok(())
    }

    /// Put a node that is not in any directory into `directory`
    #[tracing::instrument(skip(self))]
    pub async fn attach(&self, owner: &str, id: &str, directory: &str) -> Result<(), DriveError> {
        let _guard = self.structure.lock().await;
        let all = self.all_nodes(owner).await?;
        let (node, dir) = self.move_endpoints(&all, id, directory)?;
        if !tree::containers_of(id, &all).is_empty() {
            return Err(DriveError::AlreadyContained(id.to_string()));
        }
        self.append(owner, dir, &node.id).await
    }

    /// Move a node into `to`, or to the root when `to` is `None`.
    ///
    /// The node is first removed from every directory that lists it, so
    /// afterwards it has at most one parent.
    #[tracing::instrument(skip(self))]
    pub async fn move_node(
        &self,
        owner: &str,
        id: &str,
        to: Option<&str>,
    ) -> Result<(), DriveError> {
        let _guard = self.structure.lock().await;
        let all = self.all_nodes(owner).await?;
        match to {
            Some(to) => {
                let (node, dir) = self.move_endpoints(&all, id, to)?;
                self.detach(owner, &node.id, &all, Some(dir.id.as_str())).await?;
                if !dir.contents.contains(&node.id) {
                    self.append(owner, dir, &node.id).await?;
                }
            }
            None => {
                if tree::find(&all, id).is_none() {
                    return Err(DriveError::not_found(format!("node {id}")));
                }
                self.detach(owner, id, &all, None).await?;
            }
        }
        Ok(())
    }

    fn move_endpoints<'a>(
        &self,
        all: &'a [Node],
        id: &str,
        to: &str,
    ) -> Result<(&'a Node, &'a Node), DriveError> {
        let node = tree::find(all, id).ok_or_else(|| DriveError::not_found(format!("node {id}")))?;
        let dir =
            tree::find(all, to).ok_or_else(|| DriveError::not_found(format!("directory {to}")))?;
        if !dir.is_directory() {
            return Err(DriveError::InvalidNodeType(dir.node_type.to_string()));
        }
        if node.id == dir.id || tree::descendants(node, all).contains(&dir.id) {
            return Err(DriveError::ContainmentCycle(id.to_string()));
        }
        Ok((node, dir))
    }

    async fn append(&self, owner: &str, dir: &Node, id: &str) -> Result<(), DriveError> {
        let mut contents = dir.contents.clone();
        contents.push(id.to_string());
        self.store
            .update_node(owner, &dir.id, &NodeUpdate::contents(contents))
            .await?;
        Ok(())
    }

    /// Remove `id` from every directory in `all` that lists it, except `keep`
    async fn detach(
        &self,
        owner: &str,
        id: &str,
        all: &[Node],
        keep: Option<&str>,
    ) -> Result<(), DriveError> {
        for dir in tree::containers_of(id, all) {
            if Some(dir.id.as_str()) == keep {
                continue;
            }
            let contents = dir.contents.iter().filter(|c| *c != id).cloned().collect();
            self.store
                .update_node(owner, &dir.id, &NodeUpdate::contents(contents))
                .await?;
        }
        Ok(())
    }

    pub async fn user(&self, username: &str) -> Result<User, DriveError> {
        Ok(self.store.get_user(username).await?)
    }

    pub async fn update_user(&self, username: &str, update: &UserUpdate) -> Result<(), DriveError> {
        Ok(self.store.update_user(username, update).await?)
    }

    /// Delete a user and every node they own, after checking their login key.
    ///
    /// Returns how many nodes were deleted.
    #[tracing::instrument(skip(self, key))]
    pub async fn delete_account(&self, username: &str, key: &str) -> Result<usize, DriveError> {
        if !self.store.authenticate_user(username, key).await? {
            return Err(DriveError::Unauthorized);
        }

        let _guard = self.structure.lock().await;
        let ids: Vec<String> = self
            .all_nodes(username)
            .await?
            .into_iter()
            .map(|node| node.id)
            .collect();
        if !ids.is_empty() {
            self.store.delete_nodes(username, &ids).await?;
        }
        for id in &ids {
            self.locks.forget(id);
        }
        self.store.delete_user(username).await?;
        tracing::info!(username, nodes = ids.len(), "deleted account");
        Ok(ids.len())
    }

    /// Whether the symlink `id` fails to resolve
    pub async fn is_broken(&self, owner: &str, id: &str) -> Result<bool, DriveError> {
        let all = self.all_nodes(owner).await?;
        let node = tree::find(&all, id).ok_or_else(|| DriveError::not_found(format!("node {id}")))?;
        if !node.is_symlink() {
            return Err(DriveError::InvalidNodeType(node.node_type.to_string()));
        }
        Ok(tree::is_broken(node, &all, owner))
    }

    /// One page of the root view or of a directory
    #[tracing::instrument(skip(self))]
    pub async fn list(&self, owner: &str, request: &ListingRequest) -> Result<Listing, DriveError> {
        let key = request.snapshot_key();
        let snapshot = match self.store.cached_listing(owner, &key) {
            Some(snapshot) => snapshot,
            None => {
                let snapshot = Arc::new(self.build_listing(owner, request).await?);
                self.store.cache_listing(owner, &key, snapshot.clone());
                snapshot
            }
        };

        let (page, limit) = request.page_params();
        let (mut nodes, pagination) = paginate(&snapshot.nodes, page, limit);
        self.overlay_locks(&mut nodes);

        let breadcrumb = match &snapshot.current_dir {
            Some(_) => tree::breadcrumb(&request.path),
            None => Vec::new(),
        };
        Ok(Listing {
            nodes,
            current_dir: snapshot.current_dir.clone(),
            breadcrumb,
            pagination,
            sort: request.sort,
            path: request.path.clone(),
        })
    }

    /// Every node of `owner` matching `request`, unpaginated
    #[tracing::instrument(skip(self))]
    pub async fn search(
        &self,
        owner: &str,
        request: &SearchRequest,
    ) -> Result<SearchResults, DriveError> {
        if !request.is_active() {
            return Ok(SearchResults::default());
        }

        let key = request.snapshot_key();
        let snapshot = match self.store.cached_listing(owner, &key) {
            Some(snapshot) => snapshot,
            None => {
                let all = self.all_nodes(owner).await?;
                let nodes = search::search(&all, request)
                    .into_iter()
                    .map(|node| ListedNode::new(node, &all, owner))
                    .collect();
                let snapshot = Arc::new(ListingSnapshot {
                    nodes,
                    current_dir: None,
                });
                self.store.cache_listing(owner, &key, snapshot.clone());
                snapshot
            }
        };

        let mut nodes = snapshot.nodes.clone();
        self.overlay_locks(&mut nodes);
        Ok(SearchResults {
            result_count: nodes.len(),
            nodes,
            searched: true,
        })
    }

    // locks change without a store write being visible to cached views, so
    //  they are applied after the cache
    fn overlay_locks(&self, nodes: &mut [ListedNode]) {
        let now = self.clock.now();
        for listed in nodes {
            listed.node.lock = match self.locks.current(&listed.node.id, now) {
                Some(lock) => Some(lock),
                None => listed
                    .node
                    .lock
                    .take()
                    .filter(|lock| !self.locks.is_expired(lock, now)),
            };
        }
    }

    async fn build_listing(
        &self,
        owner: &str,
        request: &ListingRequest,
    ) -> Result<ListingSnapshot, DriveError> {
        let all = self.all_nodes(owner).await?;
        let current_dir = if request.path.is_empty() {
            None
        } else {
            let dir = tree::find(&all, &request.path)
                .filter(|node| node.is_directory())
                .ok_or_else(|| DriveError::not_found(format!("directory {}", request.path)))?;
            Some(dir.clone())
        };
        Ok(ListingSnapshot::build(&all, current_dir, request.sort, owner))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{Duration as ChronoDuration, TimeZone, Utc};

    use super::*;
    use crate::cache::MemoryCache;
    use crate::clock::ManualClock;
    use crate::node::NewUser;
    use crate::store::MemoryNodeStore;

    async fn drive() -> (Drive<Arc<MemoryNodeStore>>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()));
        let store = Arc::new(MemoryNodeStore::with_clock(clock.clone()));
        let config = DriveConfig {
            retry: RetryPolicy::new(3, Duration::ZERO),
            ..Default::default()
        };
        let cache = Arc::new(MemoryCache::<CacheValue>::new());
        let drive = Drive::new(store, cache, config).with_clock(clock.clone());
        for name in ["alice", "bob"] {
            drive
                .store()
                .create_user(&NewUser {
                    username: name.into(),
                    email: format!("{name}@example.com"),
                    salt: "s".into(),
                    key: "k".into(),
                })
                .await
                .unwrap();
        }
        (drive, clock)
    }

    #[tokio::test]
    async fn test_open_editor_mirrors_lock() {
        let (drive, _) = drive().await;
        let file = drive
            .create_node("alice", NewNode::file("notes", "hi", vec![]), None)
            .await
            .unwrap();

        let opened = drive.open_editor("alice", "tab-a", &file.id).await.unwrap();
        assert!(opened.lock.unwrap().held_by("alice", "tab-a"));

        let stored = drive.node("alice", &file.id).await.unwrap();
        assert!(stored.lock.unwrap().held_by("alice", "tab-a"));

        assert!(drive.release("alice", "tab-a", &file.id).await.unwrap());
        assert!(drive.node("alice", &file.id).await.unwrap().lock.is_none());
    }

    #[tokio::test]
    async fn test_editor_rejects_directories() {
        let (drive, _) = drive().await;
        let dir = drive
            .create_node("alice", NewNode::directory("docs"), None)
            .await
            .unwrap();
        let err = drive.open_editor("alice", "a", &dir.id).await.unwrap_err();
        assert!(matches!(err, DriveError::InvalidNodeType(_)));
    }

    #[tokio::test]
    async fn test_conflicting_autosave_writes_nothing() {
        let (drive, clock) = drive().await;
        let file = drive
            .create_node("alice", NewNode::file("notes", "v1", vec![]), None)
            .await
            .unwrap();
        drive.open_editor("alice", "tab-a", &file.id).await.unwrap();

        clock.advance(ChronoDuration::seconds(30));
        let edit = FileEdit {
            text: Some("v2".into()),
            ..Default::default()
        };
        let err = drive
            .autosave("alice", "tab-b", &file.id, edit)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DriveError::LockConflict {
                remaining_secs: 270,
                holder: LockHolder::SelfOtherTab
            }
        ));
        assert_eq!(drive.node("alice", &file.id).await.unwrap().text.as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn test_invalid_edit_is_rejected_before_locking() {
        let (drive, _) = drive().await;
        let file = drive
            .create_node("alice", NewNode::file("notes", "", vec![]), None)
            .await
            .unwrap();
        let edit = FileEdit {
            tags: Some(vec!["not valid".into()]),
            ..Default::default()
        };
        let err = drive.autosave("alice", "a", &file.id, edit).await.unwrap_err();
        assert!(matches!(err, DriveError::Validation(_)));
        assert!(drive.locks().current(&file.id, Utc::now()).is_none());
    }

    #[tokio::test]
    async fn test_force_takeover_and_check_conflict() {
        let (drive, _) = drive().await;
        let file = drive
            .create_node("alice", NewNode::file("notes", "", vec![]), None)
            .await
            .unwrap();
        drive.open_editor("alice", "crashed", &file.id).await.unwrap();

        let taken = drive.force_takeover("alice", "fresh", &file.id).await.unwrap();
        assert!(taken.lock.unwrap().held_by("alice", "fresh"));

        let status = drive.check_conflict("alice", "crashed", &file.id).await.unwrap();
        assert!(status.conflict);
        assert_eq!(status.holder, Some(LockHolder::SelfOtherTab));
        assert!(!drive.release("alice", "crashed", &file.id).await.unwrap());
        assert!(!drive.check_conflict("alice", "fresh", &file.id).await.unwrap().conflict);
    }

    #[tokio::test(start_paused = true)]
    async fn test_takeover_waits_for_slow_autosave_mirror() {
        let (drive, clock) = drive().await;
        let file = drive
            .create_node("alice", NewNode::file("notes", "v1", vec![]), None)
            .await
            .unwrap();
        drive.open_editor("alice", "tab-a", &file.id).await.unwrap();

        // tab-a's lock write lands after tab-b has started its takeover
        drive.store().inner().delay_next_write(Duration::from_millis(50));
        let edit = FileEdit {
            text: Some("v2".into()),
            ..Default::default()
        };
        let (saved, taken) = tokio::join!(
            drive.autosave("alice", "tab-a", &file.id, edit),
            drive.force_takeover("alice", "tab-b", &file.id),
        );
        saved.unwrap();
        taken.unwrap();

        let stored = drive.node("alice", &file.id).await.unwrap();
        assert_eq!(stored.text.as_deref(), Some("v2"));
        assert!(stored.lock.unwrap().held_by("alice", "tab-b"));
        let current = drive.locks().current(&file.id, clock.now()).unwrap();
        assert!(current.held_by("alice", "tab-b"));
    }

    #[tokio::test]
    async fn test_search_is_cached_and_shows_live_locks() {
        let (drive, _) = drive().await;
        let file = drive
            .create_node("alice", NewNode::file("Report", "q3", vec![]), None)
            .await
            .unwrap();
        drive
            .create_node("bob", NewNode::file("report", "", vec![]), None)
            .await
            .unwrap();

        let request = SearchRequest::text("report");
        let found = drive.search("alice", &request).await.unwrap();
        assert!(found.searched);
        assert_eq!(found.result_count, 1);
        assert!(found.nodes[0].node.lock.is_none());

        // taking the lock writes to the store, so the cached result is dropped
        drive.open_editor("alice", "tab-a", &file.id).await.unwrap();
        let calls = drive.store().inner().calls();
        let found = drive.search("alice", &request).await.unwrap();
        assert!(found.nodes[0].node.lock.is_some());
        assert!(drive.store().inner().calls() > calls);

        let calls = drive.store().inner().calls();
        drive.search("alice", &request).await.unwrap();
        assert_eq!(drive.store().inner().calls(), calls);

        let idle = drive.search("alice", &SearchRequest::default()).await.unwrap();
        assert!(!idle.searched);
        assert!(idle.nodes.is_empty());
    }

    #[tokio::test]
    async fn test_delete_account_needs_the_key() {
        let (drive, _) = drive().await;
        let file = drive
            .create_node("alice", NewNode::file("notes", "", vec![]), None)
            .await
            .unwrap();
        drive.open_editor("alice", "tab-a", &file.id).await.unwrap();

        let err = drive.delete_account("alice", "wrong").await.unwrap_err();
        assert!(matches!(err, DriveError::Unauthorized));
        assert!(drive.node("alice", &file.id).await.is_ok());

        assert_eq!(drive.delete_account("alice", "k").await.unwrap(), 1);
        assert!(matches!(drive.user("alice").await, Err(DriveError::NotFound(_))));
        assert!(drive.locks().current(&file.id, Utc::now()).is_none());
        assert!(drive.user("bob").await.is_ok());
    }

    #[tokio::test]
    async fn test_single_parent_is_enforced() {
        let (drive, _) = drive().await;
        let a = drive.create_node("alice", NewNode::directory("a"), None).await.unwrap();
        let b = drive.create_node("alice", NewNode::directory("b"), None).await.unwrap();
        let f = drive
            .create_node("alice", NewNode::file("f", "", vec![]), Some(&a.id))
            .await
            .unwrap();

        let err = drive.attach("alice", &f.id, &b.id).await.unwrap_err();
        assert!(matches!(err, DriveError::AlreadyContained(_)));

        drive.move_node("alice", &f.id, Some(&b.id)).await.unwrap();
        assert!(drive.node("alice", &a.id).await.unwrap().contents.is_empty());
        assert_eq!(drive.node("alice", &b.id).await.unwrap().contents, vec![f.id.clone()]);

        let err = drive.move_node("alice", &a.id, Some(&a.id)).await.unwrap_err();
        assert!(matches!(err, DriveError::ContainmentCycle(_)));
        drive.move_node("alice", &a.id, Some(&b.id)).await.unwrap();
        let err = drive.move_node("alice", &b.id, Some(&a.id)).await.unwrap_err();
        assert!(matches!(err, DriveError::ContainmentCycle(_)));
    }

    #[tokio::test]
    async fn test_delete_detaches_from_parent() {
        let (drive, _) = drive().await;
        let dir = drive.create_node("alice", NewNode::directory("d"), None).await.unwrap();
        let f = drive
            .create_node("alice", NewNode::file("f", "", vec![]), Some(&dir.id))
            .await
            .unwrap();

        drive.delete_node("alice", &f.id).await.unwrap();
        assert!(drive.node("alice", &dir.id).await.unwrap().contents.is_empty());
        assert!(matches!(
            drive.delete_node("alice", &f.id).await,
            Err(DriveError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_change_owner_moves_node_to_new_root() {
        let (drive, _) = drive().await;
        let dir = drive.create_node("alice", NewNode::directory("d"), None).await.unwrap();
        let f = drive
            .create_node("alice", NewNode::file("gift", "", vec![]), Some(&dir.id))
            .await
            .unwrap();

        let err = drive.change_owner("alice", &f.id, "ghost").await.unwrap_err();
        assert!(matches!(err, DriveError::NotFound(_)));

        drive.change_owner("alice", &f.id, "bob").await.unwrap();
        assert!(drive.node("alice", &dir.id).await.unwrap().contents.is_empty());
        let listing = drive.list("bob", &ListingRequest::root()).await.unwrap();
        assert_eq!(listing.nodes[0].node.id, f.id);
    }

    #[tokio::test]
    async fn test_listing_is_cached_until_write() {
        let (drive, _) = drive().await;
        drive.create_node("alice", NewNode::file("b", "", vec![]), None).await.unwrap();
        let first = drive.list("alice", &ListingRequest::root()).await.unwrap();
        assert_eq!(first.nodes.len(), 1);

        let calls = drive.store().inner().calls();
        drive.list("alice", &ListingRequest::root()).await.unwrap();
        assert_eq!(drive.store().inner().calls(), calls);

        drive.create_node("alice", NewNode::file("a", "", vec![]), None).await.unwrap();
        let listing = drive.list("alice", &ListingRequest::root()).await.unwrap();
        let names: Vec<_> = listing.nodes.iter().map(|n| n.node.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[tokio::test]
    async fn test_listing_missing_directory() {
        let (drive, _) = drive().await;
        let file = drive
            .create_node("alice", NewNode::file("f", "", vec![]), None)
            .await
            .unwrap();
        for path in ["ghost", file.id.as_str()] {
            let err = drive
                .list("alice", &ListingRequest::directory(path))
                .await
                .unwrap_err();
            assert!(matches!(err, DriveError::NotFound(_)));
        }
    }
}
