//! Blob storage for artifact bytes.
//!
//! Provides the [`BlobStore`] interface the artifact service needs (stat,
//! metadata update, capability URL minting), keyed-BLAKE3 capability URLs
//! via [`UrlSigner`], and an in-memory backend.
//!
//! Capability URLs are bearer tokens: whoever holds one may perform the
//! signed method on the signed object until it expires.

pub mod error;
pub mod memory;
pub mod signer;
pub mod traits;

pub use error::{BlobError, BlobResult};
pub use memory::InMemoryBlobStore;
pub use signer::{Method, UrlSigner};
pub use traits::{BlobStore, ObjectAttrs};
