//! Shared fixtures for the engine tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use url::Url;

use astore_blob::{InMemoryBlobStore, UrlSigner};
use astore_store::{
    DocumentStore, Entity, InMemoryDocumentStore, Key, Kind, Mutation, Property, Query, StoreError,
    StoreResult, Transaction,
};
use astore_types::{Artifact, ArtifactRecord, CommitRequest, IdGenerator, Sid};

use crate::context::CallContext;
use crate::options::{AstoreOptions, RetryConfig};
use crate::service::Astore;

pub(crate) const CREATOR: &str = "alice@example.com";
pub(crate) const PUBLISH_BASE: &str = "https://astore.example.com/l/";

pub(crate) fn artifact_record(tags: &[&str]) -> ArtifactRecord {
    let ids = IdGenerator::new();
    ArtifactRecord {
        uid: ids.uid().unwrap(),
        sid: ids.sid().unwrap(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        md5: [0; 16],
        size: 0,
        parent: "root".into(),
        creator: CREATOR.into(),
        created: Utc::now(),
        note: String::new(),
    }
}

fn options() -> AstoreOptions {
    AstoreOptions::default()
        .with_bucket("test-bucket")
        .with_publish_base_url(PUBLISH_BASE)
        .with_retry(RetryConfig {
            attempts: 50,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
        })
}

pub(crate) struct Fixture {
    pub astore: Astore,
    pub docs: InMemoryDocumentStore,
    pub blobs: InMemoryBlobStore,
}

impl Fixture {
    pub fn new() -> Self {
        let docs = InMemoryDocumentStore::new();
        Self::build(Arc::new(docs.clone()), docs, options())
    }

    pub fn unpublished() -> Self {
        let docs = InMemoryDocumentStore::new();
        Self::build(
            Arc::new(docs.clone()),
            docs,
            options().with_publish_base_url(""),
        )
    }

    /// A fixture whose first `failures` transaction commits abort with a conflict.
    pub fn flaky(failures: usize, attempts: usize) -> (Self, Arc<AtomicUsize>) {
        let (fx, flaky) = Self::wrapped(failures, attempts);
        (fx, flaky.commits)
    }

    /// A fixture where, once the returned flag is set, another writer
    /// commits an artifact under `tools/other` just before every
    /// transaction commit.
    pub fn busy(attempts: usize) -> (Self, Arc<AtomicBool>) {
        let (fx, flaky) = Self::wrapped(0, attempts);
        (fx, flaky.busy)
    }

    fn wrapped(failures: usize, attempts: usize) -> (Self, FlakyStore) {
        let docs = InMemoryDocumentStore::new();
        let flaky = FlakyStore {
            inner: docs.clone(),
            failures: Arc::new(AtomicUsize::new(failures)),
            commits: Arc::new(AtomicUsize::new(0)),
            busy: Arc::new(AtomicBool::new(false)),
        };
        let mut opts = options();
        opts.retry.attempts = attempts;
        (Self::build(Arc::new(flaky.clone()), docs, opts), flaky)
    }

    fn build(store: Arc<dyn DocumentStore>, docs: InMemoryDocumentStore, options: AstoreOptions) -> Self {
        let signer = UrlSigner::new(
            [3u8; 32],
            Url::parse("http://localhost:6433/blob/").unwrap(),
            "test-bucket",
        )
        .unwrap();
        let blobs = InMemoryBlobStore::new(signer);
        let astore = Astore::new(store, Arc::new(blobs.clone()), options)
            .with_id_generator(IdGenerator::seeded(7));
        Self { astore, docs, blobs }
    }

    pub fn ctx(&self) -> CallContext {
        CallContext::new(CREATOR)
    }

    /// Allocate a slot and upload `data` into it.
    pub async fn upload(&self, data: &[u8]) -> Sid {
        let resp = self.astore.store(&self.ctx()).await.unwrap();
        self.blobs
            .put(&resp.sid.object_path(), Bytes::copy_from_slice(data))
            .unwrap();
        resp.sid
    }

    pub async fn commit(&self, path: &str, arch: &str, tags: &[&str]) -> Artifact {
        let sid = self.upload(path.as_bytes()).await;
        self.astore
            .commit(
                &self.ctx(),
                CommitRequest {
                    sid: sid.to_string(),
                    path: path.into(),
                    architecture: arch.into(),
                    note: String::new(),
                    tag: tags.iter().map(|t| t.to_string()).collect(),
                },
            )
            .await
            .unwrap()
            .artifact
    }

    /// Current stored tags of `artifact`.
    pub async fn tags_of(&self, artifact: &Artifact) -> Vec<String> {
        let found = self
            .docs
            .query(&Query::new(Kind::Artifact).filter(Property::Uid, artifact.uid.as_str()))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        found[0].1.as_artifact().unwrap().tags.clone()
    }

    /// Every artifact filed directly under `path` (any architecture).
    pub async fn artifacts_at(&self, path: &str) -> Vec<(Key, ArtifactRecord)> {
        let (dir, key) = crate::keys::key_from_path(path, "");
        self.docs
            .query(
                &Query::new(Kind::Artifact)
                    .ancestor(&key)
                    .filter(Property::Parent, dir),
            )
            .await
            .unwrap()
            .into_iter()
            .filter_map(|(k, e)| Some((k, e.into_artifact()?)))
            .collect()
    }
}

/// Document store whose transactions fail to commit a set number of times,
/// or race a concurrent writer while `busy` is set.
#[derive(Clone)]
struct FlakyStore {
    inner: InMemoryDocumentStore,
    failures: Arc<AtomicUsize>,
    commits: Arc<AtomicUsize>,
    busy: Arc<AtomicBool>,
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn get(&self, key: &Key) -> StoreResult<Option<Entity>> {
        self.inner.get(key).await
    }

    async fn query(&self, query: &Query) -> StoreResult<Vec<(Key, Entity)>> {
        self.inner.query(query).await
    }

    async fn mutate(&self, mutations: Vec<Mutation>) -> StoreResult<Vec<Key>> {
        self.inner.mutate(mutations).await
    }

    async fn begin(&self) -> StoreResult<Box<dyn Transaction>> {
        Ok(Box::new(FlakyTransaction {
            inner: self.inner.begin().await?,
            store: self.clone(),
        }))
    }
}

struct FlakyTransaction {
    inner: Box<dyn Transaction>,
    store: FlakyStore,
}

#[async_trait]
impl Transaction for FlakyTransaction {
    async fn get(&mut self, key: &Key) -> StoreResult<Option<Entity>> {
        self.inner.get(key).await
    }

    async fn query(&mut self, query: &Query) -> StoreResult<Vec<(Key, Entity)>> {
        self.inner.query(query).await
    }

    fn mutate(&mut self, mutations: Vec<Mutation>) {
        self.inner.mutate(mutations)
    }

    async fn commit(self: Box<Self>) -> StoreResult<Vec<Key>> {
        let store = &self.store;
        store.commits.fetch_add(1, Ordering::SeqCst);
        if store.busy.load(Ordering::SeqCst) {
            let (dir, scope) = crate::keys::key_from_path("tools/other", "");
            let mut record = artifact_record(&[]);
            record.parent = dir;
            store
                .inner
                .mutate(vec![Mutation::Insert(
                    Key::incomplete(Kind::Artifact, Some(&scope)),
                    record.into(),
                )])
                .await?;
        }
        let failed = store
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(StoreError::Conflict(Key::named(Kind::PathElement, "root", None)));
        }
        self.inner.commit().await
    }
}
