use std::fmt;
use std::time::{Duration, Instant};

use moka::sync::Cache as MokaCache;
use moka::Expiry;

use super::keys::namespace_prefixes;
use super::{Cache, CacheError, DEFAULT_MAX_ENTRIES};

/// Entries carry their own lifetime so one cache can hold both
/// short-lived listings and longer-lived node and user records
struct EntryTtl;

impl<V> Expiry<String, (V, Duration)> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &(V, Duration),
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.1)
    }

    // an overwrite restarts the clock with the new entry's ttl
    fn expire_after_update(
        &self,
        _key: &String,
        value: &(V, Duration),
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.1)
    }
}

/// In-process cache backed by moka.
///
/// moka checks expiry on every read, so an expired entry is never returned
/// even if [`MemoryCache::sweep`] has not run.
pub struct MemoryCache<V> {
    entries: MokaCache<String, (V, Duration)>,
}

impl<V: Clone + Send + Sync + 'static> MemoryCache<V> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(max_entries: u64) -> Self {
        Self {
            entries: MokaCache::builder()
                .max_capacity(max_entries)
                .expire_after(EntryTtl)
                .support_invalidation_closures()
                .build(),
        }
    }

    /// Run moka's pending maintenance: evict expired entries and apply
    /// namespace invalidations
    pub fn sweep(&self) {
        self.entries.run_pending_tasks();
    }

    /// Approximate number of stored entries; exact right after a sweep
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }
}

impl<V: Clone + Send + Sync + 'static> Default for MemoryCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + Sync + 'static> fmt::Debug for MemoryCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

impl<V: Clone + Send + Sync + 'static> Cache<V> for MemoryCache<V> {
    fn get(&self, key: &str) -> Result<Option<V>, CacheError> {
        Ok(self.entries.get(key).map(|(value, _)| value))
    }

    fn set(&self, key: &str, value: V, ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(key.to_string(), (value, ttl));
        Ok(())
    }

    fn del(&self, key: &str) -> Result<(), CacheError> {
        self.entries.invalidate(key);
        Ok(())
    }

    fn invalidate_namespace(&self, username: &str) -> Result<(), CacheError> {
        let prefixes = namespace_prefixes(username);
        self.entries
            .invalidate_entries_if(move |key, _| {
                prefixes.iter().any(|p| key.starts_with(p.as_str()))
            })
            .map_err(|e| {
                CacheError::Unavailable(format!("failed to invalidate namespace: {e}"))
            })?;
        tracing::debug!(username, "invalidated cache namespace");
        Ok(())
    }
}
