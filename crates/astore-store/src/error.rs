use crate::key::Key;

/// Errors from document store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An update targeted a key with no live entity.
    #[error("entity not found: {0}")]
    NotFound(Key),

    /// An insert targeted a key that already holds an entity.
    #[error("entity already exists: {0}")]
    AlreadyExists(Key),

    /// The transaction observed data that changed before it committed.
    #[error("transaction aborted: concurrent modification of {0}")]
    Conflict(Key),

    /// An incomplete key was used where a complete one is required.
    #[error("incomplete key: {0}")]
    IncompleteKey(Key),

    /// The backend is unreachable or refused the call.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Lock poisoning or another internal failure.
    #[error("internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Returns `true` for optimistic-concurrency aborts worth retrying.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
