use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use astore_blob::BlobStore;
use astore_store::DocumentStore;
use astore_types::IdGenerator;

use crate::error::{AstoreError, AstoreResult};
use crate::options::AstoreOptions;

/// The artifact store metadata engine.
///
/// Holds no per-request state: every durable fact lives in the document
/// store or the blob store, so clones can serve requests concurrently.
#[derive(Clone)]
pub struct Astore {
    pub(crate) docs: Arc<dyn DocumentStore>,
    pub(crate) blobs: Arc<dyn BlobStore>,
    pub(crate) ids: Arc<IdGenerator>,
    pub(crate) options: AstoreOptions,
}

impl Astore {
    pub fn new(
        docs: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        options: AstoreOptions,
    ) -> Self {
        if blobs.bucket() != options.bucket {
            tracing::warn!(
                configured = %options.bucket,
                backend = %blobs.bucket(),
                "blob store bucket differs from configured bucket"
            );
        }
        Self {
            docs,
            blobs,
            ids: Arc::new(IdGenerator::new()),
            options,
        }
    }

    /// Replace the identifier source, e.g. with a seeded one for tests.
    pub fn with_id_generator(mut self, ids: IdGenerator) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    pub fn options(&self) -> &AstoreOptions {
        &self.options
    }

    /// Expiry for a capability URL minted now.
    pub(crate) fn url_expiry(&self) -> AstoreResult<DateTime<Utc>> {
        let validity = chrono::Duration::from_std(self.options.signed_url_validity)
            .map_err(|e| AstoreError::Internal(format!("invalid url validity: {e}")))?;
        Ok(Utc::now() + validity)
    }
}

impl fmt::Debug for Astore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Astore")
            .field("bucket", &self.blobs.bucket())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
