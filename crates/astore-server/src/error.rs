use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use thiserror::Error;

use astore_blob::BlobError;
use astore_core::{AstoreError, ErrorCode};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Astore(#[from] AstoreError),

    #[error("blob gateway: {0}")]
    Blob(#[from] BlobError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// Status used for calls abandoned by the client.
const CLIENT_CLOSED_REQUEST: u16 = 499;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

impl ServerError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Astore(e) => e.code(),
            Self::Blob(BlobError::NotFound(_)) => ErrorCode::NotFound,
            Self::Blob(
                BlobError::InvalidUrl(_)
                | BlobError::InvalidSignature(_)
                | BlobError::Expired { .. },
            )
            | Self::InvalidRequest(_) => ErrorCode::InvalidArgument,
            Self::Blob(BlobError::Unavailable(_)) => ErrorCode::Unavailable,
            Self::Blob(_) | Self::Config(_) | Self::Io(_) | Self::Internal(_) => ErrorCode::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        if let Self::Blob(BlobError::InvalidSignature(_) | BlobError::Expired { .. }) = self {
            return StatusCode::FORBIDDEN;
        }
        match self.code() {
            ErrorCode::InvalidArgument => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::AlreadyExists => StatusCode::CONFLICT,
            ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::Cancelled => {
                StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::BAD_REQUEST)
            }
            ErrorCode::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }
        let body = ErrorBody {
            code: self.code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
