use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderName};

use crate::error::{ServerError, ServerResult};

/// The caller a request is attributed to. Recorded as the creator of
/// everything the request writes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self { name: "anonymous".into() }
    }

    pub fn user(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Resolves the caller of a request.
///
/// Authentication itself happens in front of the server; providers only
/// read what the fronting proxy established.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn identify(&self, headers: &HeaderMap) -> ServerResult<Identity>;
}

/// Takes the identity from a header set by a trusted proxy.
#[derive(Clone, Debug)]
pub struct TrustedHeaderIdentity {
    header: HeaderName,
}

impl TrustedHeaderIdentity {
    pub fn new(header: &str) -> ServerResult<Self> {
        let header = HeaderName::try_from(header)
            .map_err(|e| ServerError::Config(format!("creator header {header:?} - {e}")))?;
        Ok(Self { header })
    }
}

#[async_trait]
impl IdentityProvider for TrustedHeaderIdentity {
    async fn identify(&self, headers: &HeaderMap) -> ServerResult<Identity> {
        let Some(value) = headers.get(&self.header) else {
            return Ok(Identity::anonymous());
        };
        let name = value
            .to_str()
            .map_err(|_| ServerError::InvalidRequest(format!("{} is not valid text", self.header)))?
            .trim();
        if name.is_empty() {
            return Ok(Identity::anonymous());
        }
        Ok(Identity::user(name))
    }
}
