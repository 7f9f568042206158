//! Document store interface for the artifact store.
//!
//! The metadata index lives in a document database that only offers key
//! lookups, ancestor/property queries and optimistic transactions. This
//! crate models exactly that surface.
//!
//! # Model
//!
//! - [`Key`] — kind + name (or allocated id) chained to a parent key
//! - [`Entity`] — the records stored under keys
//! - [`Query`] — kind, optional ancestor, equality [`Filter`]s, [`Order`], limit
//! - [`Mutation`] — insert / update / upsert / delete, applied in atomic batches
//!
//! # Backends
//!
//! All backends implement [`DocumentStore`] and [`Transaction`]:
//!
//! - [`InMemoryDocumentStore`] -- versioned `HashMap` store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Batches are atomic: every mutation applies or none does.
//! 2. Transactions never lock; they abort with [`StoreError::Conflict`] when
//!    something they read changed before commit.
//! 3. Ancestor scope includes the ancestor key itself.

pub mod entity;
pub mod error;
pub mod key;
pub mod memory;
pub mod mutation;
pub mod query;
pub mod traits;

pub use entity::{Entity, Property};
pub use error::{StoreError, StoreResult};
pub use key::{Key, KeyName, Kind};
pub use memory::InMemoryDocumentStore;
pub use mutation::Mutation;
pub use query::{Filter, Order, Query};
pub use traits::{DocumentStore, Transaction};
