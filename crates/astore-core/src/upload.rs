//! Two-phase upload: `store` hands out a blob slot, `commit` files it.
//!
//! Bytes go straight from the client to the blob store through the signed
//! PUT URL. A slot that is never committed leaves an orphaned blob behind;
//! nothing in the metadata index refers to it.

use std::collections::BTreeMap;

use chrono::Utc;
use tracing::{info, instrument};

use astore_blob::Method;
use astore_store::{Key, Kind, Mutation};
use astore_types::{clean_unique, ArtifactRecord, CommitRequest, CommitResponse, Sid, StoreResponse, LATEST_TAG};

use crate::consistency::strip_tags;
use crate::context::CallContext;
use crate::error::{AstoreError, AstoreResult};
use crate::keys::{key_from_path, materialize, DEFAULT_ARCHITECTURE};
use crate::retry::with_retry;
use crate::service::Astore;

impl Astore {
    /// Allocate a storage id and a signed upload URL for it.
    ///
    /// No metadata is written.
    #[instrument(skip_all, fields(creator = %ctx.creator()))]
    pub async fn store(&self, ctx: &CallContext) -> AstoreResult<StoreResponse> {
        ctx.check()?;
        let sid = self.ids.sid()?;
        let url = self
            .blobs
            .sign_url(&sid.object_path(), Method::Put, self.url_expiry()?)?;
        Ok(StoreResponse {
            sid,
            url: url.to_string(),
        })
    }

    /// File an uploaded blob as a new artifact under `path`.
    ///
    /// The artifact gets a fresh uid and the requested tags plus `latest`.
    /// Those tags are taken away from every other artifact filed under the
    /// same path and architecture in the same transaction as the insert.
    #[instrument(skip_all, fields(creator = %ctx.creator(), sid = %req.sid, path = %req.path))]
    pub async fn commit(&self, ctx: &CallContext, req: CommitRequest) -> AstoreResult<CommitResponse> {
        if req.sid.trim().is_empty() {
            return Err(AstoreError::InvalidArgument("must supply an sid".into()));
        }
        if req.path.trim().is_empty() {
            return Err(AstoreError::InvalidArgument("must supply a path".into()));
        }
        let architecture = match req.architecture.trim() {
            "" => DEFAULT_ARCHITECTURE,
            arch => arch,
        };

        let sid = Sid::parse(req.sid.trim())
            .map_err(|e| AstoreError::InvalidArgument(format!("sid {} is invalid - {e}", req.sid)))?;
        let object = sid.object_path();
        let attrs = ctx
            .run(self.blobs.stat(&object))
            .await
            .map_err(|e| match e {
                AstoreError::Blob(err) => {
                    AstoreError::InvalidArgument(format!("sid {object} is invalid - {err}"))
                }
                other => other,
            })?;

        let uid = self.ids.uid()?;
        let creator = ctx.creator().to_string();

        let metadata = BTreeMap::from([
            ("path".to_string(), req.path.clone()),
            ("uid".to_string(), uid.to_string()),
            ("creator".to_string(), creator.clone()),
        ]);
        ctx.run(self.blobs.update_metadata(&object, metadata)).await?;

        let (dir, pkey) = key_from_path(&req.path, architecture);
        materialize(self.docs.as_ref(), ctx, &pkey).await?;

        let tags = clean_unique(req.tag.iter().map(String::as_str).chain([LATEST_TAG]));
        let record = ArtifactRecord {
            uid,
            sid,
            tags,
            md5: attrs.md5,
            size: attrs.size,
            parent: dir,
            creator,
            created: Utc::now(),
            note: req.note,
        };

        let docs = &self.docs;
        let (record_ref, pkey_ref) = (&record, &pkey);
        let keys = with_retry(ctx, &self.options.retry, "insert transaction", move || async move {
            let mut txn = docs.begin().await?;
            let mut muts = strip_tags(txn.as_mut(), pkey_ref, &record_ref.tags).await?;
            muts.push(Mutation::Insert(
                Key::incomplete(Kind::Artifact, Some(pkey_ref)),
                record_ref.clone().into(),
            ));
            txn.mutate(muts);
            Ok(txn.commit().await?)
        })
        .await?;

        info!(uid = %record.uid, key = ?keys.last(), tags = ?record.tags, "committed artifact");
        Ok(CommitResponse {
            artifact: record.to_artifact(architecture),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use astore_types::{SID_LEN, UID_LEN};

    #[tokio::test]
    async fn store_returns_signed_put_url() {
        let fx = Fixture::new();
        let resp = fx.astore.store(&fx.ctx()).await.unwrap();
        assert_eq!(resp.sid.as_str().len(), SID_LEN);
        assert!(resp.url.contains(&format!("/upload/{}", resp.sid)));
        assert!(resp.url.contains("method=PUT"));
        assert!(fx.docs.is_empty());
    }

    #[tokio::test]
    async fn commit_files_artifact() {
        let fx = Fixture::new();
        let sid = fx.upload(b"payload").await;
        let resp = fx
            .astore
            .commit(
                &fx.ctx(),
                CommitRequest {
                    sid: sid.to_string(),
                    path: "tools/play".into(),
                    note: "first".into(),
                    tag: vec![" stable ".into(), "stable".into()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let art = resp.artifact;
        assert_eq!(art.uid.as_str().len(), UID_LEN);
        assert_eq!(art.sid, sid);
        assert_eq!(art.architecture, DEFAULT_ARCHITECTURE);
        assert_eq!(art.tags, vec!["stable", "latest"]);
        assert_eq!(art.size, 7);
        assert_eq!(art.note, "first");
        assert_eq!(art.creator, "alice@example.com");
    }

    #[tokio::test]
    async fn commit_stamps_blob_metadata() {
        let fx = Fixture::new();
        let art = fx.commit("tools/play", "", &[]).await;
        let attrs = astore_blob::BlobStore::stat(&fx.blobs, &art.sid.object_path())
            .await
            .unwrap();
        assert_eq!(attrs.metadata["path"], "tools/play");
        assert_eq!(attrs.metadata["uid"], art.uid.as_str());
        assert_eq!(attrs.metadata["creator"], "alice@example.com");
    }

    #[tokio::test]
    async fn commit_requires_sid_and_path() {
        let fx = Fixture::new();
        let no_sid = fx
            .astore
            .commit(&fx.ctx(), CommitRequest { path: "a".into(), ..Default::default() })
            .await;
        assert!(matches!(no_sid, Err(AstoreError::InvalidArgument(_))));

        let sid = fx.upload(b"x").await;
        let no_path = fx
            .astore
            .commit(&fx.ctx(), CommitRequest { sid: sid.to_string(), ..Default::default() })
            .await;
        assert!(matches!(no_path, Err(AstoreError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn commit_of_missing_blob_is_invalid() {
        let fx = Fixture::new();
        let resp = fx.astore.store(&fx.ctx()).await.unwrap();
        let res = fx
            .astore
            .commit(
                &fx.ctx(),
                CommitRequest {
                    sid: resp.sid.to_string(),
                    path: "tools/play".into(),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(res, Err(AstoreError::InvalidArgument(_))));

        let garbage = fx
            .astore
            .commit(
                &fx.ctx(),
                CommitRequest {
                    sid: "not-a-sid".into(),
                    path: "tools/play".into(),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(garbage, Err(AstoreError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn second_commit_under_same_path_succeeds() {
        let fx = Fixture::new();
        let first = fx.commit("new/path", "x86", &[]).await;
        let second = fx.commit("new/path", "x86", &[]).await;
        assert_ne!(first.uid, second.uid);
        // root, new, path, x86 and the two artifacts
        assert_eq!(fx.docs.len(), 6);
    }

    #[tokio::test]
    async fn commit_moves_latest_within_scope_only() {
        let fx = Fixture::new();
        let amd = fx.commit("tools/play", "amd64", &[]).await;
        let arm = fx.commit("tools/play", "arm64", &[]).await;
        let amd2 = fx.commit("tools/play", "amd64", &[]).await;

        assert!(fx.tags_of(&amd).await.is_empty());
        assert_eq!(fx.tags_of(&arm).await, vec!["latest"]);
        assert_eq!(fx.tags_of(&amd2).await, vec!["latest"]);
    }

    #[tokio::test]
    async fn recommitting_a_tag_moves_it_to_the_new_artifact() {
        let fx = Fixture::new();
        let first = fx.commit("tools/play", "", &["stable", "qa"]).await;
        let second = fx.commit("tools/play", "", &["stable"]).await;

        let resp = fx
            .astore
            .retrieve(
                &fx.ctx(),
                astore_types::RetrieveRequest {
                    path: "tools/play".into(),
                    tag: Some(vec!["stable".into()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(resp.artifact.uid, second.uid);

        assert_eq!(fx.tags_of(&first).await, vec!["qa"]);
        assert_eq!(fx.tags_of(&second).await, vec!["stable", "latest"]);
    }

    #[tokio::test]
    async fn cancelled_commit_writes_nothing() {
        let fx = Fixture::new();
        let sid = fx.upload(b"x").await;
        let ctx = fx.ctx();
        ctx.cancellation().cancel();
        let res = fx
            .astore
            .commit(
                &ctx,
                CommitRequest {
                    sid: sid.to_string(),
                    path: "tools/play".into(),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(res, Err(AstoreError::Cancelled)));
        assert!(fx.docs.is_empty());
    }

    #[tokio::test]
    async fn commit_retries_contended_transactions() {
        let (fx, commits) = Fixture::flaky(2, 5);
        let art = fx.commit("tools/play", "", &[]).await;
        assert_eq!(commits.load(std::sync::atomic::Ordering::SeqCst), 3);
        assert_eq!(fx.tags_of(&art).await, vec!["latest"]);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_the_conflict() {
        let (fx, commits) = Fixture::flaky(10, 3);
        let sid = fx.upload(b"x").await;
        let err = fx
            .astore
            .commit(
                &fx.ctx(),
                CommitRequest {
                    sid: sid.to_string(),
                    path: "tools/play".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.code(), crate::ErrorCode::Internal);
        assert_eq!(commits.load(std::sync::atomic::Ordering::SeqCst), 3);
        assert!(fx.artifacts_at("tools/play").await.is_empty());
    }
}
