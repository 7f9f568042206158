//! Query planning for `retrieve` and `list`.

use tracing::{debug, instrument};

use astore_blob::Method;
use astore_store::{Kind, Order, Property, Query};
use astore_types::{Element, ListRequest, ListResponse, RetrieveRequest, RetrieveResponse, TagFilter};

use crate::context::CallContext;
use crate::error::{AstoreError, AstoreResult};
use crate::keys::{key_from_path, key_to_architecture, key_to_path};
use crate::service::Astore;

fn with_tags(mut query: Query, tags: Option<&[String]>) -> Query {
    for tag in TagFilter::from_request(tags).required() {
        query = query.filter(Property::Tag, tag);
    }
    query
}

/// Artifacts filed directly at `path`, newest first.
///
/// Without an architecture the scope is the path element, so every
/// architecture variant filed under the path matches.
fn artifacts_at(path: &str, architecture: &str) -> Query {
    let (dir, key) = key_from_path(path, architecture);
    Query::new(Kind::Artifact)
        .ancestor(&key)
        .filter(Property::Parent, dir)
        .order(Order::CreatedDescending)
}

impl Astore {
    /// Resolve a single artifact and sign a download URL for it.
    ///
    /// With a path the newest matching artifact filed there wins. With only
    /// a uid the lookup is global and must match exactly one artifact.
    #[instrument(skip_all, fields(uid = %req.uid, path = %req.path, arch = %req.architecture))]
    pub async fn retrieve(
        &self,
        ctx: &CallContext,
        req: RetrieveRequest,
    ) -> AstoreResult<RetrieveResponse> {
        let uid = req.uid.trim();
        let path = req.path.trim();
        if uid.is_empty() && path.is_empty() {
            return Err(AstoreError::InvalidArgument(
                "invalid request - no uid and no path".into(),
            ));
        }

        let mut query = if path.is_empty() {
            // Two is enough to tell a unique match from an ambiguous one.
            Query::new(Kind::Artifact).limit(2)
        } else {
            artifacts_at(path, &req.architecture).limit(1)
        };
        if !uid.is_empty() {
            query = query.filter(Property::Uid, uid);
        }
        let query = with_tags(query, req.tag.as_deref());

        let mut found = ctx.run(self.docs.query(&query)).await?;
        if found.len() != 1 {
            return Err(AstoreError::NotFound(format!(
                "artifact not found ({} found)",
                found.len()
            )));
        }
        let Some((key, entity)) = found.pop() else {
            return Err(AstoreError::NotFound("artifact not found (0 found)".into()));
        };
        let record = entity
            .into_artifact()
            .ok_or_else(|| AstoreError::Internal(format!("{key} is not an artifact")))?;

        let url = self
            .blobs
            .sign_url(&record.sid.object_path(), Method::Get, self.url_expiry()?)
            .map_err(|e| AstoreError::Internal(format!("could not generate download URL - {e}")))?;

        debug!(%key, "retrieved artifact");
        Ok(RetrieveResponse {
            path: key_to_path(&key),
            artifact: record.to_artifact(&key_to_architecture(&key)),
            url: url.to_string(),
        })
    }

    /// List the sub-paths of `path` and the artifacts filed directly at it.
    #[instrument(skip_all, fields(path = %req.path, arch = %req.architecture))]
    pub async fn list(&self, ctx: &CallContext, req: ListRequest) -> AstoreResult<ListResponse> {
        let (dir, key) = key_from_path(&req.path, "");
        let children = Query::new(Kind::PathElement)
            .ancestor(&key)
            .filter(Property::Parent, dir)
            .order(Order::CreatedDescending);

        let mut artifacts = artifacts_at(&req.path, &req.architecture);
        let uid = req.uid.trim();
        if !uid.is_empty() {
            artifacts = artifacts.filter(Property::Uid, uid);
        }
        let artifacts = with_tags(artifacts, req.tag.as_deref());

        let docs = &self.docs;
        let (children, artifacts) = ctx
            .run(async { tokio::try_join!(docs.query(&children), docs.query(&artifacts)) })
            .await?;

        let elements = children
            .into_iter()
            .filter_map(|(key, entity)| {
                let name = key.name()?.to_string();
                let element = entity.into_path_element()?;
                Some(Element {
                    name,
                    creator: element.creator,
                    created: element.created,
                })
            })
            .collect();
        let artifacts = artifacts
            .into_iter()
            .filter_map(|(key, entity)| {
                let record = entity.into_artifact()?;
                Some(record.to_artifact(&key_to_architecture(&key)))
            })
            .collect();

        Ok(ListResponse {
            elements,
            artifacts,
        })
    }
}
