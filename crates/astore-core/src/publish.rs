//! Published aliases: stable public paths bound to a stored selection.
//!
//! An alias stores the selection, never a resolved artifact. Every read
//! replays the selection through `retrieve` or `list`, so an alias for
//! `latest` keeps tracking the newest commit.

use tracing::{info, instrument};

use astore_store::Mutation;
use astore_types::{
    ListResponse, PublishRequest, PublishResponse, PublishedRecord, RetrieveResponse,
    UnpublishRequest, UnpublishResponse,
};

use crate::context::CallContext;
use crate::error::{AstoreError, AstoreResult};
use crate::keys::{materialize, publish_key_from_path, published_key};
use crate::service::Astore;

impl Astore {
    /// Bind `req.path` in the public namespace to `req.select`.
    ///
    /// Fails with `AlreadyExists` if the public path is taken; unpublish it first.
    #[instrument(skip_all, fields(path = %req.path))]
    pub async fn publish(&self, ctx: &CallContext, req: PublishRequest) -> AstoreResult<PublishResponse> {
        if self.options.publish_base_url.is_empty() {
            return Err(AstoreError::Unavailable(
                "publish service has not been configured on the server".into(),
            ));
        }
        let published = publish_key_from_path(&req.path)?;
        materialize(self.docs.as_ref(), ctx, &published.key).await?;

        let record = PublishedRecord::new(published.dir.as_str(), ctx.creator(), &req.select);
        ctx.run(self.docs.mutate(vec![Mutation::Insert(
            published_key(&published.key),
            record.into(),
        )]))
        .await?;

        info!(public = %published.cleaned, "published selection");
        Ok(PublishResponse {
            url: format!("{}{}", self.options.publish_base_url, published.cleaned),
        })
    }

    /// Remove the alias at `req.path`. Removing an absent alias succeeds.
    #[instrument(skip_all, fields(path = %req.path))]
    pub async fn unpublish(
        &self,
        ctx: &CallContext,
        req: UnpublishRequest,
    ) -> AstoreResult<UnpublishResponse> {
        let published = publish_key_from_path(&req.path)?;
        ctx.run(self.docs.mutate(vec![Mutation::Delete(published_key(&published.key))]))
            .await?;
        Ok(UnpublishResponse {})
    }

    /// Look up the alias stored at a public path.
    ///
    /// Returns the cleaned public path together with the stored record.
    pub async fn resolve_published(
        &self,
        ctx: &CallContext,
        public_path: &str,
    ) -> AstoreResult<(String, PublishedRecord)> {
        let published = publish_key_from_path(public_path)?;
        let entity = ctx
            .run(self.docs.get(&published_key(&published.key)))
            .await?
            .ok_or_else(|| AstoreError::NotFound(format!("nothing published at {}", published.cleaned)))?;
        let record = entity
            .into_published()
            .ok_or_else(|| AstoreError::Internal(format!("{} is not a published alias", published.cleaned)))?;
        Ok((published.cleaned, record))
    }

    /// Resolve an alias and retrieve what it currently selects.
    ///
    /// `architecture` and `uid` only fill in fields the stored selection leaves empty.
    #[instrument(skip(self, ctx))]
    pub async fn download_published(
        &self,
        ctx: &CallContext,
        public_path: &str,
        architecture: &str,
        uid: &str,
    ) -> AstoreResult<RetrieveResponse> {
        let (_, record) = self.resolve_published(ctx, public_path).await?;
        let mut req = record.to_retrieve_request();
        if req.architecture.is_empty() {
            req.architecture = architecture.to_string();
        }
        if req.uid.is_empty() {
            req.uid = uid.to_string();
        }
        self.retrieve(ctx, req).await
    }

    /// Resolve an alias and list what it currently selects.
    #[instrument(skip(self, ctx))]
    pub async fn list_published(&self, ctx: &CallContext, public_path: &str) -> AstoreResult<ListResponse> {
        let (_, record) = self.resolve_published(ctx, public_path).await?;
        self.list(ctx, record.to_list_request()).await
    }
}
