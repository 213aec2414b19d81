/**
 * Process-wide, namespaced TTL cache with
 *  prefix invalidation. Backs read-through
 *  access to the remote node store.
 */
pub mod cache;
/**
 * Injectable wall clock, so lock expiry can be
 *  driven deterministically in tests.
 */
pub mod clock;
/**
 * The `Drive` facade: composes the lock manager,
 *  the cached store and the tree helpers into the
 *  operations the web layer calls.
 */
pub mod drive;
/**
 * Caller-facing error taxonomy.
 */
pub mod error;
/**
 * Explorer listings: root or directory view,
 *  sorted, annotated and paginated.
 */
pub mod listing;
/**
 * Advisory per-node edit locks with expiry,
 *  conflict detection and forced takeover.
 */
pub mod lock;
/**
 * Node and user records as exchanged with the
 *  remote store, plus input validation.
 */
pub mod node;
/**
 * Remote node store abstraction, retry policy,
 *  in-memory implementation and cached wrapper.
 */
pub mod store;
/**
 * Explorer search over a user's nodes by text,
 *  type, tags and creation date.
 */
pub mod search;
/**
 * Pure helpers deriving a tree from a flat,
 *  owner-scoped node collection.
 */
pub mod tree;

pub mod prelude {
    pub use crate::cache::{Cache, CacheConfig, CacheError, MemoryCache};
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::drive::{ConflictStatus, Drive, DriveConfig, FileEdit};
    pub use crate::error::DriveError;
    pub use crate::listing::{ListedNode, Listing, ListingRequest};
    pub use crate::lock::{LockConfig, LockConflict, LockHolder, LockManager};
    pub use crate::node::{Lock, NewNode, NewUser, Node, NodeType, NodeUpdate, User, UserUpdate};
    pub use crate::search::{SearchRequest, SearchResults, TypeFilter};
    pub use crate::store::{
        CacheValue, CachedStore, MemoryNodeStore, NodeStore, RetryPolicy, SearchQuery, StoreError,
    };
    pub use crate::tree::SortKey;
}
