use crate::entity::Entity;
use crate::key::Key;

/// A single write applied as part of an atomic batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    /// Create the entity; fails with `AlreadyExists` if the key is live.
    /// Incomplete keys are allocated an id.
    Insert(Key, Entity),
    /// Replace an existing entity; fails with `NotFound` if absent.
    Update(Key, Entity),
    /// Remove the entity. Deleting a missing key is a no-op.
    Delete(Key),
}

impl Mutation {
    pub fn key(&self) -> &Key {
        match self {
            Self::Insert(k, _) | Self::Update(k, _) | Self::Delete(k) => k,
        }
    }
}
