use crate::lock::{LockConflict, LockHolder};
use crate::node::ValidationError;
use crate::store::StoreError;

/// Errors surfaced by [`Drive`](crate::drive::Drive) to its callers.
///
/// Cache failures never show up here; they degrade to a store read.
#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    #[error("node is being edited by {holder} ({remaining_secs}s remaining)")]
    LockConflict {
        remaining_secs: u64,
        holder: LockHolder,
    },
    #[error("{0} not found")]
    NotFound(String),
    #[error("only the owner can do that")]
    NotOwner,
    #[error("wrong username or key")]
    Unauthorized,
    #[error("invalid node type: {0}")]
    InvalidNodeType(String),
    #[error("node {0} is already in a directory")]
    AlreadyContained(String),
    #[error("moving {0} there would put a directory inside itself")]
    ContainmentCycle(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("remote store unavailable after {attempts} attempts, try again")]
    UpstreamUnavailable { attempts: u32 },
    #[error("remote store rejected the request: {0}")]
    UpstreamError(String),
}

impl DriveError {
    pub fn not_found(what: impl Into<String>) -> Self {
        DriveError::NotFound(what.into())
    }
}

impl From<LockConflict> for DriveError {
    fn from(conflict: LockConflict) -> Self {
        DriveError::LockConflict {
            remaining_secs: conflict.remaining_secs,
            holder: conflict.holder,
        }
    }
}

impl From<StoreError> for DriveError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => DriveError::NotFound(what),
            StoreError::Transient(_) => DriveError::UpstreamUnavailable { attempts: 1 },
            StoreError::Exhausted { attempts, .. } => DriveError::UpstreamUnavailable { attempts },
            StoreError::Rejected { status, message } => {
                DriveError::UpstreamError(format!("{status}: {message}"))
            }
            StoreError::Internal(message) => DriveError::UpstreamError(message),
        }
    }
}
