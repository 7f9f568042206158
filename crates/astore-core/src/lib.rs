//! Metadata engine of the artifact store.
//!
//! Clients upload bytes straight to a blob store and file them here under a
//! virtual path, an optional architecture and a set of tags. The engine
//! keeps the catalog in a document store that only offers key lookups,
//! ancestor queries and optimistic transactions:
//!
//! - [`keys`] derives key chains from paths
//! - [`Astore::store`] and [`Astore::commit`] run the two-phase upload
//! - [`Astore::retrieve`] and [`Astore::list`] plan queries
//! - [`consistency`] keeps each tag on at most one artifact per scope
//! - [`Astore::publish`] binds public paths to live selections
//!
//! Every call takes a [`CallContext`] carrying the caller identity, a
//! cancellation token and an optional deadline.

pub mod annotate;
pub mod consistency;
pub mod context;
pub mod error;
pub mod keys;
pub mod options;
pub mod publish;
pub mod query;
pub mod retry;
pub mod service;
pub mod upload;

#[cfg(test)]
pub(crate) mod testing;

pub use context::CallContext;
pub use error::{AstoreError, AstoreResult, ErrorCode};
pub use options::{AstoreOptions, RetryConfig, DEFAULT_SIGNED_URL_VALIDITY};
pub use service::Astore;
