//! Namespaced TTL cache
//!
//! Keys are built by the helpers in [`keys`] and always start with a kind
//! segment followed by the owning username:
//!
//! ```text
//! user:<username>:<resource>:<params>
//! node:<username>:<node id>
//! search:<username>:<base64(json(query))>
//! ```
//!
//! so every entry belonging to one user can be dropped with a single
//! [`Cache::invalidate_namespace`] call after a write.
//!
//! Expiry is checked on every read; an expired entry is indistinguishable
//! from a missing one. [`MemoryCache::sweep`] only reclaims memory.
//!
//! The cache is an optimisation. Callers treat any [`CacheError`] as a
//! miss and go to the remote store instead.

use std::fmt::Debug;
use std::time::Duration;

pub mod keys;
mod memory;

pub use memory::MemoryCache;

/// Default entry lifetime (5 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Lifetime of cached explorer listings (3 minutes)
pub const LISTING_TTL: Duration = Duration::from_secs(180);

/// Entry cap before least-recently-used eviction
pub const DEFAULT_MAX_ENTRIES: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Lifetime of user, node and search entries
    pub default_ttl: Duration,
    /// Lifetime of explorer listing and search entries
    pub listing_ttl: Duration,
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            listing_ttl: LISTING_TTL,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
    #[error("failed to build cache key: {0}")]
    Key(String),
}

/// Key/value store with per-entry expiry.
///
/// Each call is a single atomic step with respect to other calls on the
/// same key.
pub trait Cache<V>: Debug + Send + Sync {
    /// A hit requires the entry to exist and not be expired
    fn get(&self, key: &str) -> Result<Option<V>, CacheError>;

    /// Insert or overwrite `key`, expiring `ttl` from now
    fn set(&self, key: &str, value: V, ttl: Duration) -> Result<(), CacheError>;

    /// Remove `key`. Removing a missing key is not an error.
    fn del(&self, key: &str) -> Result<(), CacheError>;

    /// Remove every entry in `username`'s namespaces. Entries written
    /// afterwards are unaffected.
    fn invalidate_namespace(&self, username: &str) -> Result<(), CacheError>;
}
