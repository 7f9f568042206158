use async_trait::async_trait;

use crate::entity::Entity;
use crate::error::StoreResult;
use crate::key::Key;
use crate::mutation::Mutation;
use crate::query::Query;

/// Document database offering key lookups, ancestor queries and optimistic
/// transactions.
///
/// All implementations must satisfy these invariants:
/// - A batch passed to [`DocumentStore::mutate`] or committed through a
///   [`Transaction`] is applied atomically: every mutation or none.
/// - A transaction aborts with [`crate::StoreError::Conflict`] at commit if
///   any entity it read, or any entity in the scope of a query it ran, was
///   written after the transaction began.
/// - No locks are held between calls; contention is resolved by aborting.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read an entity by key. Returns `Ok(None)` if absent.
    async fn get(&self, key: &Key) -> StoreResult<Option<Entity>>;

    /// Run a query outside any transaction.
    async fn query(&self, query: &Query) -> StoreResult<Vec<(Key, Entity)>>;

    /// Apply a batch of mutations atomically and return the final keys, in
    /// order, with incomplete keys completed.
    async fn mutate(&self, mutations: Vec<Mutation>) -> StoreResult<Vec<Key>>;

    /// Start an optimistic transaction.
    async fn begin(&self) -> StoreResult<Box<dyn Transaction>>;
}

/// An optimistic read-then-write unit of work.
///
/// Reads are tracked; mutations are buffered until [`Transaction::commit`].
/// Dropping a transaction without committing rolls it back.
#[async_trait]
pub trait Transaction: Send {
    async fn get(&mut self, key: &Key) -> StoreResult<Option<Entity>>;

    async fn query(&mut self, query: &Query) -> StoreResult<Vec<(Key, Entity)>>;

    /// Buffer mutations for commit.
    fn mutate(&mut self, mutations: Vec<Mutation>);

    /// Validate reads and apply the buffered mutations atomically.
    async fn commit(self: Box<Self>) -> StoreResult<Vec<Key>>;
}
