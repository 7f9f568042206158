use serde::{Deserialize, Serialize};
use thiserror::Error;

use astore_blob::BlobError;
use astore_store::StoreError;
use astore_types::TypeError;

/// Caller-facing classification of an [`AstoreError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    Unavailable,
    Cancelled,
    DeadlineExceeded,
    Internal,
}

#[derive(Debug, Error)]
pub enum AstoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("call cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("blob store error: {0}")]
    Blob(#[from] BlobError),

    #[error("identifier error: {0}")]
    Id(#[from] TypeError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AstoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::AlreadyExists(_) => ErrorCode::AlreadyExists,
            Self::Unavailable(_) => ErrorCode::Unavailable,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::DeadlineExceeded => ErrorCode::DeadlineExceeded,
            Self::Store(StoreError::NotFound(_)) => ErrorCode::NotFound,
            Self::Store(StoreError::AlreadyExists(_)) => ErrorCode::AlreadyExists,
            Self::Store(StoreError::Unavailable(_)) => ErrorCode::Unavailable,
            Self::Blob(BlobError::NotFound(_)) => ErrorCode::NotFound,
            Self::Blob(BlobError::Unavailable(_)) => ErrorCode::Unavailable,
            Self::Store(_) | Self::Blob(_) | Self::Id(_) | Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Optimistic-concurrency aborts are the only errors a transaction retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_conflict())
    }
}

pub type AstoreResult<T> = Result<T, AstoreError>;
