//! The [`BlobStore`] trait defining the object storage interface.
//!
//! Artifact bytes never pass through the artifact service. Clients upload
//! and download through capability URLs; the service only stats objects,
//! stamps their metadata, and mints those URLs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::BlobResult;
use crate::signer::Method;

/// Attributes of a stored object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectAttrs {
    pub name: String,
    pub md5: [u8; 16],
    pub size: u64,
    pub metadata: BTreeMap<String, String>,
    pub updated: DateTime<Utc>,
}

/// Storage backend for artifact bytes.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Bucket all objects live in.
    fn bucket(&self) -> &str;

    /// Read object attributes.
    ///
    /// Fails with [`BlobError::NotFound`](crate::BlobError::NotFound) when
    /// nothing has been uploaded at `object`.
    async fn stat(&self, object: &str) -> BlobResult<ObjectAttrs>;

    /// Replace the custom metadata of an existing object.
    async fn update_metadata(
        &self,
        object: &str,
        metadata: BTreeMap<String, String>,
    ) -> BlobResult<ObjectAttrs>;

    /// Mint a capability URL for `method` on `object` valid until `expires`.
    ///
    /// Does not check that the object exists.
    fn sign_url(&self, object: &str, method: Method, expires: DateTime<Utc>) -> BlobResult<Url>;
}
