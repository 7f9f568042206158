//! Tag consistency: within one path and architecture scope a tag value
//! names at most one artifact.
//!
//! Claiming tags for an artifact strips them from every other artifact in
//! the scope. The strip is computed from reads inside the caller's
//! transaction, so a concurrent writer touching the same scope makes the
//! commit conflict and the whole unit is retried.

use std::collections::HashMap;

use astore_store::{Key, Kind, Mutation, Property, Query, Transaction};
use astore_types::{clean_unique_delete, ArtifactRecord};

use crate::error::AstoreResult;

/// Scope a tag claim applies to: the parent of an artifact key, or the key itself.
pub fn tag_scope(owner: &Key) -> &Key {
    match (owner.kind(), owner.parent()) {
        (Kind::Artifact, Some(parent)) => parent,
        _ => owner,
    }
}

/// Compute the updates that remove `tags` from every artifact in the scope
/// of `owner` other than `owner` itself.
///
/// Each affected artifact is collected once, however many of the tags it
/// holds, and receives a single update with all of them removed.
pub async fn strip_tags(
    txn: &mut dyn Transaction,
    owner: &Key,
    tags: &[String],
) -> AstoreResult<Vec<Mutation>> {
    let scope = tag_scope(owner).clone();

    let mut holders: HashMap<Key, ArtifactRecord> = HashMap::new();
    for tag in tags {
        let query = Query::new(Kind::Artifact)
            .ancestor(&scope)
            .filter(Property::Tag, tag.as_str());
        for (key, entity) in txn.query(&query).await? {
            if key == *owner {
                continue;
            }
            if let Some(record) = entity.into_artifact() {
                holders.entry(key).or_insert(record);
            }
        }
    }

    Ok(holders
        .into_iter()
        .map(|(key, mut record)| {
            record.tags = clean_unique_delete(&record.tags, tags);
            Mutation::Update(key, record.into())
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::testing::{artifact_record, Fixture};
    use astore_store::{DocumentStore, InMemoryDocumentStore};
    use proptest::prelude::*;

    fn scope() -> Key {
        Key::named(Kind::PathElement, "root", None)
    }

    async fn seed(docs: &InMemoryDocumentStore, tags: &[&str]) -> Key {
        let keys = docs
            .mutate(vec![Mutation::Insert(
                Key::incomplete(Kind::Artifact, Some(&scope())),
                artifact_record(tags).into(),
            )])
            .await
            .unwrap();
        keys[0].clone()
    }

    #[test]
    fn scope_of_artifact_is_its_parent() {
        let artifact = Key::with_id(Kind::Artifact, 1, Some(&scope()));
        assert_eq!(tag_scope(&artifact), &scope());
        assert_eq!(tag_scope(&scope()), &scope());
    }

    #[tokio::test]
    async fn one_update_per_holder() {
        let docs = InMemoryDocumentStore::new();
        let both = seed(&docs, &["a", "b", "keep"]).await;
        let only_b = seed(&docs, &["b"]).await;
        seed(&docs, &["unrelated"]).await;

        let mut txn = docs.begin().await.unwrap();
        let claimed = vec!["a".to_string(), "b".to_string()];
        let muts = strip_tags(txn.as_mut(), &scope(), &claimed).await.unwrap();
        assert_eq!(muts.len(), 2);

        for m in &muts {
            let Mutation::Update(key, entity) = m else {
                panic!("expected update, got {m:?}");
            };
            let tags = &entity.as_artifact().unwrap().tags;
            if *key == both {
                assert_eq!(tags, &vec!["keep".to_string()]);
            } else {
                assert_eq!(*key, only_b);
                assert!(tags.is_empty());
            }
        }
    }

    #[tokio::test]
    async fn owner_is_excluded() {
        let docs = InMemoryDocumentStore::new();
        let owner = seed(&docs, &["stable"]).await;
        let other = seed(&docs, &["stable"]).await;

        let mut txn = docs.begin().await.unwrap();
        let muts = strip_tags(txn.as_mut(), &owner, &["stable".to_string()])
            .await
            .unwrap();
        assert_eq!(muts.len(), 1);
        assert_eq!(muts[0].key(), &other);
    }

    #[tokio::test]
    async fn other_scopes_are_untouched() {
        let docs = InMemoryDocumentStore::new();
        let elsewhere = Key::named(Kind::PathElement, "other", None);
        docs.mutate(vec![Mutation::Insert(
            Key::incomplete(Kind::Artifact, Some(&elsewhere)),
            artifact_record(&["stable"]).into(),
        )])
        .await
        .unwrap();

        let mut txn = docs.begin().await.unwrap();
        let muts = strip_tags(txn.as_mut(), &scope(), &["stable".to_string()])
            .await
            .unwrap();
        assert!(muts.is_empty());
    }

    async fn assert_unique_tags(fx: &Fixture, path: &str) {
        let mut holders: HashMap<(Key, String), usize> = HashMap::new();
        for (key, record) in fx.artifacts_at(path).await {
            let scope = tag_scope(&key).clone();
            for tag in record.tags {
                *holders.entry((scope.clone(), tag)).or_default() += 1;
            }
        }
        for ((scope, tag), count) in holders {
            assert_eq!(count, 1, "tag {tag:?} held {count} times in {scope}");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_commits_keep_tags_unique() {
        let fx = Arc::new(Fixture::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let fx = fx.clone();
            handles.push(tokio::spawn(async move {
                let arch = if i % 2 == 0 { "amd64" } else { "arm64" };
                fx.commit("tools/play", arch, &["stable", "qa"]).await
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(fx.artifacts_at("tools/play").await.len(), 16);
        assert_unique_tags(&fx, "tools/play").await;
        for arch in ["amd64", "arm64"] {
            let got = fx
                .astore
                .retrieve(
                    &fx.ctx(),
                    astore_types::RetrieveRequest {
                        path: "tools/play".into(),
                        architecture: arch.into(),
                        tag: Some(vec!["stable".into()]),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            assert_eq!(got.artifact.tags, vec!["stable", "qa", "latest"]);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_tagging_keeps_tags_unique() {
        let fx = Arc::new(Fixture::new());
        let mut arts = Vec::new();
        for _ in 0..6 {
            arts.push(fx.commit("tools/play", "", &[]).await);
        }

        let mut handles = Vec::new();
        for (i, art) in arts.into_iter().enumerate() {
            let fx = fx.clone();
            handles.push(tokio::spawn(async move {
                let add = if i % 2 == 0 {
                    vec!["even".to_string(), "any".to_string()]
                } else {
                    vec!["any".to_string()]
                };
                fx.astore
                    .tag(
                        &fx.ctx(),
                        astore_types::TagRequest {
                            uid: art.uid.to_string(),
                            add: Some(add),
                            ..Default::default()
                        },
                    )
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_unique_tags(&fx, "tools/play").await;
    }

    #[derive(Clone, Debug)]
    enum Op {
        Commit { arch: bool, tags: Vec<&'static str> },
        Add { target: usize, tags: Vec<&'static str> },
        Set { target: usize, tags: Vec<&'static str> },
    }

    fn tag_names() -> impl Strategy<Value = Vec<&'static str>> {
        proptest::collection::vec(proptest::sample::select(vec!["a", "b", "c", "latest"]), 0..3)
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (any::<bool>(), tag_names()).prop_map(|(arch, tags)| Op::Commit { arch, tags }),
            (0usize..8, tag_names()).prop_map(|(target, tags)| Op::Add { target, tags }),
            (0usize..8, tag_names()).prop_map(|(target, tags)| Op::Set { target, tags }),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn tag_uniqueness_holds_after_every_operation(ops in proptest::collection::vec(op(), 1..10)) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            rt.block_on(async {
                let fx = Fixture::new();
                let mut uids: Vec<String> = Vec::new();
                let owned = |tags: &[&str]| Some(tags.iter().map(|t| t.to_string()).collect::<Vec<_>>());
                for op in ops {
                    match op {
                        Op::Commit { arch, tags } => {
                            let art = fx.commit("p", if arch { "x86" } else { "" }, &tags).await;
                            uids.push(art.uid.to_string());
                        }
                        Op::Add { .. } | Op::Set { .. } if uids.is_empty() => {}
                        Op::Add { target, tags } => {
                            let uid = uids[target % uids.len()].clone();
                            let req = astore_types::TagRequest { uid, add: owned(&tags), ..Default::default() };
                            fx.astore.tag(&fx.ctx(), req).await.unwrap();
                        }
                        Op::Set { target, tags } => {
                            let uid = uids[target % uids.len()].clone();
                            let req = astore_types::TagRequest { uid, set: owned(&tags), ..Default::default() };
                            fx.astore.tag(&fx.ctx(), req).await.unwrap();
                        }
                    }
                    assert_unique_tags(&fx, "p").await;
                }
            });
        }
    }
}
