//! Advisory edit locks
//!
//! One lock per node id, held by an `(owner, client)` session. A lock whose
//! age has reached the timeout is treated as absent: the next party to touch
//! the node silently reclaims it. There is no background timer.
//!
//! ```text
//!             acquire / force_acquire / autosave
//!   Unlocked ────────────────────────────────────▶ Locked(owner, client, t)
//!      ▲                                              │
//!      └──────── release by holder, or age ≥ timeout ─┘
//! ```
//!
//! Every operation takes the table mutex for its whole read-decide-write
//! step, so two sessions racing on the same node can never both observe
//! `Unlocked`.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::node::Lock;

/// Default lock timeout (5 minutes)
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Age after which an unreleased lock is considered abandoned
    pub timeout: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

/// Who is holding a conflicting lock, relative to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LockHolder {
    /// The same user, in another tab or browser
    SelfOtherTab,
    OtherUser,
}

impl fmt::Display for LockHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockHolder::SelfOtherTab => write!(f, "you in another tab"),
            LockHolder::OtherUser => write!(f, "another user"),
        }
    }
}

/// Another session holds a live lock on the node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConflict {
    /// Seconds until the holder's lock expires, rounded up
    pub remaining_secs: u64,
    pub holder: LockHolder,
}

/// What happened to a previous lock when a session took the node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquired {
    /// Node was unlocked
    Fresh,
    /// Same session already held it; `acquired_at` moved forward
    Refreshed,
    /// A stale lock from another session was silently replaced
    Reclaimed(Lock),
}

#[derive(Debug)]
pub struct LockManager {
    config: LockConfig,
    table: Mutex<HashMap<String, Lock>>,
}

impl LockManager {
    pub fn new(config: LockConfig) -> Self {
        Self {
            config,
            table: Mutex::new(HashMap::new()),
        }
    }

    // A poisoned table only means another request panicked mid-call;
    //  every mutation is a single insert/remove so the map is still whole.
    fn table(&self) -> MutexGuard<'_, HashMap<String, Lock>> {
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn age(lock: &Lock, now: DateTime<Utc>) -> Duration {
        // a lock stamped in the future (clock skew) counts as brand new
        (now - lock.acquired_at).to_std().unwrap_or(Duration::ZERO)
    }

    /// Whether `lock` has reached the timeout as of `now`
    pub fn is_expired(&self, lock: &Lock, now: DateTime<Utc>) -> bool {
        Self::age(lock, now) >= self.config.timeout
    }

    fn conflict(&self, lock: &Lock, owner: &str, now: DateTime<Utc>) -> LockConflict {
        let remaining = self.config.timeout.saturating_sub(Self::age(lock, now));
        let remaining_secs = remaining.as_millis().div_ceil(1000) as u64;
        let holder = if lock.owner == owner {
            LockHolder::SelfOtherTab
        } else {
            LockHolder::OtherUser
        };
        LockConflict {
            remaining_secs,
            holder,
        }
    }

    fn take(
        &self,
        node_id: &str,
        owner: &str,
        client: &str,
        now: DateTime<Utc>,
    ) -> Result<(Lock, Acquired), LockConflict> {
        let mut table = self.table();
        let outcome = match table.get(node_id) {
            None => Acquired::Fresh,
            Some(current) if current.held_by(owner, client) => Acquired::Refreshed,
            Some(current) if self.is_expired(current, now) => Acquired::Reclaimed(current.clone()),
            Some(current) => return Err(self.conflict(current, owner, now)),
        };

        let lock = Lock::new(owner, client, now);
        table.insert(node_id.to_string(), lock.clone());
        Ok((lock, outcome))
    }

    /// Take the lock for an editing session.
    ///
    /// Succeeds when the node is unlocked, when the current lock is stale,
    /// or when this exact session already holds it (refresh). Otherwise
    /// reports the live holder and its remaining time.
    pub fn acquire(
        &self,
        node_id: &str,
        owner: &str,
        client: &str,
        now: DateTime<Utc>,
    ) -> Result<Lock, LockConflict> {
        match self.take(node_id, owner, client, now) {
            Ok((lock, outcome)) => {
                if let Acquired::Reclaimed(stale) = outcome {
                    tracing::info!(
                        node_id,
                        owner,
                        client,
                        stale_owner = %stale.owner,
                        stale_client = %stale.client,
                        "reclaimed stale lock"
                    );
                }
                Ok(lock)
            }
            Err(conflict) => {
                tracing::debug!(node_id, owner, client, ?conflict, "lock conflict");
                Err(conflict)
            }
        }
    }

    /// Unconditionally take the lock, returning the lock it replaced.
    ///
    /// Used when the node's owner explicitly recovers from a crashed
    /// session. Ownership is the caller's concern.
    pub fn force_acquire(
        &self,
        node_id: &str,
        owner: &str,
        client: &str,
        now: DateTime<Utc>,
    ) -> (Lock, Option<Lock>) {
        let lock = Lock::new(owner, client, now);
        let previous = self.table().insert(node_id.to_string(), lock.clone());
        if let Some(previous) = &previous {
            tracing::info!(
                node_id,
                owner,
                client,
                previous_owner = %previous.owner,
                previous_client = %previous.client,
                "forced lock takeover"
            );
        }
        (lock, previous)
    }

    /// Read-only conflict check for polling editors.
    ///
    /// Reports a conflict iff a live lock exists that belongs to a different
    /// owner, or to a different client of the same owner.
    pub fn check_conflict(
        &self,
        node_id: &str,
        owner: &str,
        client: &str,
        now: DateTime<Utc>,
    ) -> Option<LockConflict> {
        let table = self.table();
        let current = table.get(node_id)?;
        if current.held_by(owner, client) || self.is_expired(current, now) {
            return None;
        }
        Some(self.conflict(current, owner, now))
    }

    /// Clear the lock only if this exact session holds it.
    ///
    /// Returns whether a lock was removed. A release from any other session
    /// is a no-op, so a stale tab can never drop someone else's live lock.
    pub fn release(&self, node_id: &str, owner: &str, client: &str) -> bool {
        let mut table = self.table();
        match table.get(node_id) {
            Some(current) if current.held_by(owner, client) => {
                table.remove(node_id);
                true
            }
            _ => false,
        }
    }

    /// Lock check for a save.
    ///
    /// Reclaims an unlocked or stale node for this session, refreshes this
    /// session's own lock, and fails when another live session holds it.
    /// On failure the caller must not write any content.
    pub fn autosave(
        &self,
        node_id: &str,
        owner: &str,
        client: &str,
        now: DateTime<Utc>,
    ) -> Result<Lock, LockConflict> {
        match self.take(node_id, owner, client, now) {
            Ok((lock, Acquired::Refreshed)) => Ok(lock),
            Ok((lock, _)) => {
                tracing::debug!(node_id, owner, client, "lock reclaimed on save");
                Ok(lock)
            }
            Err(conflict) => {
                tracing::debug!(node_id, owner, client, ?conflict, "save blocked by lock");
                Err(conflict)
            }
        }
    }

    /// The live lock on a node, if any
    pub fn current(&self, node_id: &str, now: DateTime<Utc>) -> Option<Lock> {
        self.table()
            .get(node_id)
            .filter(|lock| !self.is_expired(lock, now))
            .cloned()
    }

    /// Seed the table from a lock recorded on the remote node.
    ///
    /// Only applies when this process has no entry for the node and the
    /// recorded lock is still live, so locks survive a restart without
    /// overriding anything observed since.
    pub fn adopt(&self, node_id: &str, recorded: Option<&Lock>, now: DateTime<Utc>) {
        let Some(recorded) = recorded else {
            return;
        };
        if self.is_expired(recorded, now) {
            return;
        }
        self.table()
            .entry(node_id.to_string())
            .or_insert_with(|| recorded.clone());
    }

    /// Drop whatever lock a node has, e.g. after it was deleted
    pub fn forget(&self, node_id: &str) {
        self.table().remove(node_id);
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(LockConfig::default())
    }
}
