/// Errors from blob store operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BlobError {
    /// No object exists at the path.
    #[error("object not found: {0}")]
    NotFound(String),

    /// A capability URL could not be built.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// The signing key is malformed.
    #[error("invalid signing key: {0}")]
    InvalidKey(String),

    /// The capability signature does not match.
    #[error("invalid signature for {0}")]
    InvalidSignature(String),

    /// The capability URL is past its expiry.
    #[error("capability for {object} expired at {expires}")]
    Expired { object: String, expires: i64 },

    /// The backend is unreachable or refused the call.
    #[error("blob store unavailable: {0}")]
    Unavailable(String),

    /// Lock poisoning or another internal failure.
    #[error("internal blob store error: {0}")]
    Internal(String),
}

/// Result alias for blob store operations.
pub type BlobResult<T> = Result<T, BlobError>;
