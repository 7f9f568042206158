use std::fmt;

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{BlobError, BlobResult};

/// Operation a capability URL grants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Get,
    Put,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Put => write!(f, "PUT"),
        }
    }
}

/// Mints and checks time-limited capability URLs.
///
/// A capability is `<base><bucket>/<object>?method=..&expires=..&signature=..`
/// where the signature is a keyed BLAKE3 MAC over method, object and expiry.
/// Signing is pure computation: no I/O, the expiry is fixed when the URL is
/// minted.
pub struct UrlSigner {
    key: [u8; 32],
    base: Url,
    bucket: String,
}

impl UrlSigner {
    /// Create a signer from a raw 32-byte key.
    pub fn new(key: [u8; 32], base: Url, bucket: impl Into<String>) -> BlobResult<Self> {
        if base.cannot_be_a_base() {
            return Err(BlobError::InvalidUrl(format!("{base} cannot be a base url")));
        }
        let mut base = base;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            key,
            base,
            bucket: bucket.into(),
        })
    }

    /// Create a signer with a fresh random key.
    pub fn generate(base: Url, bucket: impl Into<String>) -> BlobResult<Self> {
        let mut key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        Self::new(key, base, bucket)
    }

    /// Create a signer from a hex-encoded 32-byte key.
    pub fn from_hex(key: &str, base: Url, bucket: impl Into<String>) -> BlobResult<Self> {
        let bytes = hex::decode(key.trim()).map_err(|e| BlobError::InvalidKey(e.to_string()))?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| BlobError::InvalidKey(format!("expected 32 bytes, got {}", b.len())))?;
        Self::new(key, base, bucket)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn mac(&self, method: Method, object: &str, expires: i64) -> blake3::Hash {
        let message = format!("{method}\n{}/{object}\n{expires}", self.bucket);
        blake3::keyed_hash(&self.key, message.as_bytes())
    }

    /// Mint a capability URL for `method` on `object`, valid until `expires`.
    pub fn sign(&self, object: &str, method: Method, expires: DateTime<Utc>) -> BlobResult<Url> {
        let object = object.trim_start_matches('/');
        let expires = expires.timestamp();
        let mut url = self
            .base
            .join(&format!("{}/{object}", self.bucket))
            .map_err(|e| BlobError::InvalidUrl(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("method", &method.to_string())
            .append_pair("expires", &expires.to_string())
            .append_pair("signature", self.mac(method, object, expires).to_hex().as_str());
        Ok(url)
    }

    /// Check a presented capability against the object and method it is used for.
    pub fn verify(
        &self,
        object: &str,
        method: Method,
        expires: i64,
        signature: &str,
        now: DateTime<Utc>,
    ) -> BlobResult<()> {
        let object = object.trim_start_matches('/');
        let presented = blake3::Hash::from_hex(signature)
            .map_err(|_| BlobError::InvalidSignature(object.to_string()))?;
        // blake3::Hash equality is constant-time.
        if presented != self.mac(method, object, expires) {
            return Err(BlobError::InvalidSignature(object.to_string()));
        }
        if now.timestamp() > expires {
            return Err(BlobError::Expired {
                object: object.to_string(),
                expires,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UrlSigner")
            .field("key", &"<redacted>")
            .field("base", &self.base.as_str())
            .field("bucket", &self.bucket)
            .finish()
    }
}
