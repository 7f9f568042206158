//! Post-commit edits of an artifact's mutable fields: tags and note.

use tracing::{info, instrument};

use astore_store::{Key, Kind, Mutation, Property, Query};
use astore_types::{clean_unique_delete, Artifact, ArtifactRecord, NoteRequest, NoteResponse, TagRequest, TagResponse};

use crate::consistency::{strip_tags, tag_scope};
use crate::context::CallContext;
use crate::error::{AstoreError, AstoreResult};
use crate::keys::key_to_architecture;
use crate::retry::with_retry;
use crate::service::Astore;

impl Astore {
    /// Replace, extend or trim the tags of the artifact with `uid`.
    ///
    /// `set` is applied first, then `add`, then `del`. The resulting tags
    /// are removed from every other artifact in the same scope.
    #[instrument(skip_all, fields(uid = %req.uid))]
    pub async fn tag(&self, ctx: &CallContext, req: TagRequest) -> AstoreResult<TagResponse> {
        let edit = |record: &mut ArtifactRecord| {
            if let Some(set) = &req.set {
                record.tags = set.clone();
            }
            if let Some(add) = &req.add {
                record.tags.extend(add.iter().cloned());
            }
        };
        let artifacts = self
            .annotate(ctx, &req.uid, "tag transaction", req.del.as_deref().unwrap_or_default(), edit)
            .await?;
        Ok(TagResponse { artifacts })
    }

    /// Replace the note of the artifact with `uid`.
    #[instrument(skip_all, fields(uid = %req.uid))]
    pub async fn note(&self, ctx: &CallContext, req: NoteRequest) -> AstoreResult<NoteResponse> {
        let edit = |record: &mut ArtifactRecord| record.note = req.note.clone();
        let artifacts = self
            .annotate(ctx, &req.uid, "note transaction", &[], edit)
            .await?;
        Ok(NoteResponse { artifacts })
    }

    /// Locate every artifact with `uid`, apply `edit`, normalize its tags
    /// minus `del`, and write it back together with the tag strip, all in
    /// one retried transaction.
    ///
    /// The uid lookup runs outside the transaction. Inside it the artifact
    /// is read again through its tag scope, so only writes to that scope
    /// contend with the edit.
    async fn annotate<F>(
        &self,
        ctx: &CallContext,
        uid: &str,
        description: &'static str,
        del: &[String],
        edit: F,
    ) -> AstoreResult<Vec<Artifact>>
    where
        F: Fn(&mut ArtifactRecord) + Send + Sync,
    {
        let uid = uid.trim();
        if uid.is_empty() {
            return Err(AstoreError::InvalidArgument("invalid request - no uid".into()));
        }

        let docs = &self.docs;
        let edit = &edit;
        let artifacts = with_retry(ctx, &self.options.retry, description, move || async move {
            let by_uid = Query::new(Kind::Artifact).filter(Property::Uid, uid);
            let mut scopes: Vec<Key> = Vec::new();
            for (key, _) in docs.query(&by_uid).await? {
                let scope = tag_scope(&key).clone();
                if !scopes.contains(&scope) {
                    scopes.push(scope);
                }
            }

            let mut txn = docs.begin().await?;
            let mut found = Vec::new();
            for scope in &scopes {
                found.extend(txn.query(&by_uid.clone().ancestor(scope)).await?);
            }
            if found.is_empty() {
                return Err(AstoreError::NotFound(format!("no match for uid - {uid}")));
            }

            // Uids are unique; more than one match is tolerated all the same.
            let mut muts = Vec::new();
            let mut artifacts = Vec::with_capacity(found.len());
            for (key, entity) in found {
                let Some(mut record) = entity.into_artifact() else {
                    continue;
                };
                edit(&mut record);
                record.tags = clean_unique_delete(&record.tags, del);

                muts.extend(strip_tags(txn.as_mut(), &key, &record.tags).await?);
                artifacts.push(record.to_artifact(&key_to_architecture(&key)));
                muts.push(Mutation::Update(key, record.into()));
            }
            txn.mutate(muts);
            txn.commit().await?;
            Ok(artifacts)
        })
        .await?;

        info!(uid, updated = artifacts.len(), description, "annotated artifact");
        Ok(artifacts)
    }
}
