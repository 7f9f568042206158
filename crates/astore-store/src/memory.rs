use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::debug;

use crate::entity::Entity;
use crate::error::{StoreError, StoreResult};
use crate::key::Key;
use crate::mutation::Mutation;
use crate::query::Query;
use crate::traits::{DocumentStore, Transaction};

/// A stored entity, or a tombstone, stamped with the commit that wrote it.
#[derive(Debug)]
struct Record {
    version: u64,
    entity: Option<Entity>,
}

#[derive(Debug, Default)]
struct State {
    records: HashMap<Key, Record>,
    /// Sequence number of the last applied batch.
    seq: u64,
    next_id: u64,
}

/// What a transaction looked at.
#[derive(Debug)]
enum Read {
    Key(Key),
    Query(Query),
}

impl Read {
    fn covers(&self, key: &Key) -> bool {
        match self {
            Self::Key(k) => k == key,
            Self::Query(q) => q.covers(key),
        }
    }
}

impl State {
    fn live(&self, key: &Key) -> Option<&Entity> {
        self.records.get(key).and_then(|r| r.entity.as_ref())
    }

    fn query(&self, query: &Query) -> Vec<(Key, Entity)> {
        let results = self
            .records
            .iter()
            .filter_map(|(k, r)| r.entity.as_ref().map(|e| (k, e)))
            .filter(|(k, e)| query.matches(k, e))
            .map(|(k, e)| (k.clone(), e.clone()))
            .collect();
        query.finish(results)
    }

    /// First key written after `snapshot` that any of `reads` depends on.
    fn conflict(&self, snapshot: u64, reads: &[Read]) -> Option<Key> {
        self.records
            .iter()
            .filter(|(_, r)| r.version > snapshot)
            .find(|(k, _)| reads.iter().any(|read| read.covers(k)))
            .map(|(k, _)| k.clone())
    }

    /// Validate a batch against the current state, then apply all of it.
    fn apply(&mut self, mutations: Vec<Mutation>) -> StoreResult<Vec<Key>> {
        let mut next_id = self.next_id;
        let mut staged: HashMap<Key, Option<Entity>> = HashMap::new();
        let mut keys = Vec::with_capacity(mutations.len());

        for mutation in mutations {
            let exists = |staged: &HashMap<Key, Option<Entity>>, key: &Key| match staged.get(key) {
                Some(entry) => entry.is_some(),
                None => self.live(key).is_some(),
            };
            match mutation {
                Mutation::Insert(key, entity) if key.is_incomplete() => {
                    next_id += 1;
                    let key = key.completed(next_id);
                    staged.insert(key.clone(), Some(entity));
                    keys.push(key);
                }
                Mutation::Insert(key, entity) => {
                    if exists(&staged, &key) {
                        return Err(StoreError::AlreadyExists(key));
                    }
                    staged.insert(key.clone(), Some(entity));
                    keys.push(key);
                }
                Mutation::Update(key, entity) => {
                    if key.is_incomplete() {
                        return Err(StoreError::IncompleteKey(key));
                    }
                    if !exists(&staged, &key) {
                        return Err(StoreError::NotFound(key));
                    }
                    staged.insert(key.clone(), Some(entity));
                    keys.push(key);
                }
                Mutation::Delete(key) => {
                    if key.is_incomplete() {
                        return Err(StoreError::IncompleteKey(key));
                    }
                    if exists(&staged, &key) {
                        staged.insert(key.clone(), None);
                    }
                    keys.push(key);
                }
            }
        }

        self.next_id = next_id;
        if staged.is_empty() {
            return Ok(keys);
        }
        self.seq += 1;
        let version = self.seq;
        for (key, entity) in staged {
            self.records.insert(key, Record { version, entity });
        }
        Ok(keys)
    }
}

/// In-memory document store with optimistic transactions.
///
/// Intended for tests, local development and embedding. Every applied batch
/// bumps a global sequence number; a transaction remembers the sequence it
/// started at and aborts at commit if a later batch wrote anything it read.
/// Cloning yields another handle to the same data.
#[derive(Clone, Debug, Default)]
pub struct InMemoryDocumentStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryDocumentStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read_state(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|e| StoreError::Internal(format!("lock poisoned: {e}")))
    }

    fn write_state(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|e| StoreError::Internal(format!("lock poisoned: {e}")))
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.read_state()
            .map(|s| s.records.values().filter(|r| r.entity.is_some()).count())
            .unwrap_or(0)
    }

    /// Returns `true` if the store holds no live entities.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, key: &Key) -> StoreResult<Option<Entity>> {
        Ok(self.read_state()?.live(key).cloned())
    }

    async fn query(&self, query: &Query) -> StoreResult<Vec<(Key, Entity)>> {
        Ok(self.read_state()?.query(query))
    }

    async fn mutate(&self, mutations: Vec<Mutation>) -> StoreResult<Vec<Key>> {
        self.write_state()?.apply(mutations)
    }

    async fn begin(&self) -> StoreResult<Box<dyn Transaction>> {
        let snapshot = self.read_state()?.seq;
        Ok(Box::new(MemoryTransaction {
            store: self.clone(),
            snapshot,
            reads: Vec::new(),
            pending: Vec::new(),
        }))
    }
}

/// Transaction over an [`InMemoryDocumentStore`].
struct MemoryTransaction {
    store: InMemoryDocumentStore,
    snapshot: u64,
    reads: Vec<Read>,
    pending: Vec<Mutation>,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn get(&mut self, key: &Key) -> StoreResult<Option<Entity>> {
        self.reads.push(Read::Key(key.clone()));
        Ok(self.store.read_state()?.live(key).cloned())
    }

    async fn query(&mut self, query: &Query) -> StoreResult<Vec<(Key, Entity)>> {
        self.reads.push(Read::Query(query.clone()));
        Ok(self.store.read_state()?.query(query))
    }

    fn mutate(&mut self, mutations: Vec<Mutation>) {
        self.pending.extend(mutations);
    }

    async fn commit(self: Box<Self>) -> StoreResult<Vec<Key>> {
        let MemoryTransaction {
            store,
            snapshot,
            reads,
            pending,
        } = *self;
        let mut state = store.write_state()?;
        let written: Vec<Read> = pending
            .iter()
            .filter(|m| !m.key().is_incomplete())
            .map(|m| Read::Key(m.key().clone()))
            .collect();
        if let Some(key) = state
            .conflict(snapshot, &reads)
            .or_else(|| state.conflict(snapshot, &written))
        {
            debug!(%key, snapshot, "transaction conflict");
            return Err(StoreError::Conflict(key));
        }
        state.apply(pending)
    }
}
