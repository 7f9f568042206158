//! Foundation types for the artifact store.
//!
//! Every other astore crate depends on `astore-types`.
//!
//! # Key Types
//!
//! - [`Uid`] / [`Sid`] — unique and storage identifiers, minted by [`IdGenerator`]
//! - [`TagFilter`] — tri-state tag constraint of retrieve/list requests
//! - [`ArtifactRecord`], [`PathElementRecord`], [`ArchitectureRecord`],
//!   [`PublishedRecord`] — records persisted in the document store
//! - [`api`] — RPC request and response messages

pub mod api;
pub mod error;
pub mod id;
pub mod record;
pub mod tags;

pub use api::{
    Artifact, CommitRequest, CommitResponse, Element, ListRequest, ListResponse, NoteRequest,
    NoteResponse, PublishRequest, PublishResponse, RetrieveRequest, RetrieveResponse, Selection,
    StoreResponse, TagRequest, TagResponse, UnpublishRequest, UnpublishResponse,
};
pub use error::TypeError;
pub use id::{IdGenerator, Sid, Uid, ID_ALPHABET, SID_LEN, UID_LEN};
pub use record::{ArchitectureRecord, ArtifactRecord, PathElementRecord, PublishedRecord};
pub use tags::{clean_unique, clean_unique_delete, TagFilter, LATEST_TAG};
