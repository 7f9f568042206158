use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use astore_blob::UrlSigner;
use astore_core::AstoreOptions;

use crate::error::{ServerError, ServerResult};

/// Server configuration, loaded from TOML. Every field has a default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Externally visible URL of this server, used to build publish and blob URLs.
    pub site_url: String,
    /// Deadline applied to every engine call. Zero disables it.
    pub request_timeout_secs: u64,
    /// Request header carrying the already authenticated caller.
    pub creator_header: String,
    /// Hex encoded 32 byte key for signing blob URLs. A random key is used when unset.
    pub signing_key: Option<String>,
    pub astore: AstoreOptions,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 6433)),
            site_url: "http://localhost:6433".to_string(),
            request_timeout_secs: 30,
            creator_header: "x-astore-creator".to_string(),
            signing_key: None,
            astore: AstoreOptions::default(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))
    }

    pub fn to_toml(&self) -> ServerResult<String> {
        toml::to_string_pretty(self).map_err(|e| ServerError::Config(e.to_string()))
    }

    fn site(&self) -> &str {
        self.site_url.trim_end_matches('/')
    }

    /// Prefix of published URLs: the explicit option if set, `<site_url>/l/` otherwise.
    pub fn publish_base_url(&self) -> String {
        if !self.astore.publish_base_url.is_empty() {
            return self.astore.publish_base_url.clone();
        }
        if self.site().is_empty() {
            return String::new();
        }
        format!("{}/l/", self.site())
    }

    /// Base of the capability URLs served by the blob gateway.
    pub fn blob_base_url(&self) -> ServerResult<Url> {
        Url::parse(&format!("{}/blob/", self.site()))
            .map_err(|e| ServerError::Config(format!("site_url {:?} - {e}", self.site_url)))
    }

    /// Engine options with the publish base resolved.
    pub fn astore_options(&self) -> AstoreOptions {
        self.astore
            .clone()
            .with_publish_base_url(self.publish_base_url())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    pub fn signer(&self) -> ServerResult<UrlSigner> {
        let base = self.blob_base_url()?;
        let bucket = self.astore.bucket.as_str();
        let signer = match &self.signing_key {
            Some(key) => UrlSigner::from_hex(key, base, bucket)?,
            None => {
                tracing::warn!("no signing_key configured, blob URLs will not survive a restart");
                UrlSigner::generate(base, bucket)?
            }
        };
        Ok(signer)
    }
}
