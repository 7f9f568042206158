//! In-memory blob store for testing and single-process deployments.
//!
//! [`InMemoryBlobStore`] keeps object bytes in a `HashMap` behind a
//! `RwLock` and signs capability URLs with its own [`UrlSigner`]. The
//! server's blob gateway calls [`InMemoryBlobStore::authorize`] before
//! serving a `put` or `get` so that the minted URLs are real capabilities.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use url::Url;

use crate::error::{BlobError, BlobResult};
use crate::signer::{Method, UrlSigner};
use crate::traits::{BlobStore, ObjectAttrs};

#[derive(Clone, Debug)]
struct StoredObject {
    data: Bytes,
    attrs: ObjectAttrs,
}

/// An in-memory implementation of [`BlobStore`].
///
/// Clones share the same objects. Data is lost when the last clone drops.
#[derive(Clone, Debug)]
pub struct InMemoryBlobStore {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
    signer: Arc<UrlSigner>,
}

impl InMemoryBlobStore {
    pub fn new(signer: UrlSigner) -> Self {
        Self {
            objects: Arc::new(RwLock::new(HashMap::new())),
            signer: Arc::new(signer),
        }
    }

    pub fn signer(&self) -> &UrlSigner {
        &self.signer
    }

    /// Store `data` at `object`, replacing any previous content and metadata.
    pub fn put(&self, object: &str, data: Bytes) -> BlobResult<ObjectAttrs> {
        let digest = Md5::digest(&data);
        let mut md5 = [0u8; 16];
        md5.copy_from_slice(&digest);

        let attrs = ObjectAttrs {
            name: object.to_string(),
            md5,
            size: data.len() as u64,
            metadata: BTreeMap::new(),
            updated: Utc::now(),
        };
        let mut objects = self
            .objects
            .write()
            .map_err(|e| BlobError::Internal(format!("lock poisoned: {e}")))?;
        objects.insert(
            object.to_string(),
            StoredObject {
                data,
                attrs: attrs.clone(),
            },
        );
        tracing::debug!(object, size = attrs.size, "stored object");
        Ok(attrs)
    }

    /// Read the bytes stored at `object`.
    pub fn get(&self, object: &str) -> BlobResult<Bytes> {
        let objects = self
            .objects
            .read()
            .map_err(|e| BlobError::Internal(format!("lock poisoned: {e}")))?;
        objects
            .get(object)
            .map(|o| o.data.clone())
            .ok_or_else(|| BlobError::NotFound(object.to_string()))
    }

    /// Check a capability presented for `method` on `object`.
    pub fn authorize(
        &self,
        object: &str,
        method: Method,
        expires: i64,
        signature: &str,
    ) -> BlobResult<()> {
        self.signer
            .verify(object, method, expires, signature, Utc::now())
    }

    pub fn len(&self) -> usize {
        self.objects.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    fn bucket(&self) -> &str {
        self.signer.bucket()
    }

    async fn stat(&self, object: &str) -> BlobResult<ObjectAttrs> {
        let objects = self
            .objects
            .read()
            .map_err(|e| BlobError::Internal(format!("lock poisoned: {e}")))?;
        objects
            .get(object)
            .map(|o| o.attrs.clone())
            .ok_or_else(|| BlobError::NotFound(object.to_string()))
    }

    async fn update_metadata(
        &self,
        object: &str,
        metadata: BTreeMap<String, String>,
    ) -> BlobResult<ObjectAttrs> {
        let mut objects = self
            .objects
            .write()
            .map_err(|e| BlobError::Internal(format!("lock poisoned: {e}")))?;
        let stored = objects
            .get_mut(object)
            .ok_or_else(|| BlobError::NotFound(object.to_string()))?;
        stored.attrs.metadata = metadata;
        stored.attrs.updated = Utc::now();
        Ok(stored.attrs.clone())
    }

    fn sign_url(&self, object: &str, method: Method, expires: DateTime<Utc>) -> BlobResult<Url> {
        self.signer.sign(object, method, expires)
    }
}
