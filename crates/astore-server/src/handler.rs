//! Request handlers.
//!
//! JSON endpoints under `/v1/` map one-to-one onto engine operations. The
//! `/g/`, `/d/` and `/l/` families serve browsers and plain HTTP clients,
//! and `/blob/` is the gateway honouring the capability URLs the engine
//! hands out.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, RawQuery, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Redirect, Response};
use bytes::Bytes;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use url::{form_urlencoded, Url};

use astore_blob::{BlobError, InMemoryBlobStore, Method};
use astore_core::{Astore, CallContext};
use astore_store::InMemoryDocumentStore;
use astore_types::{
    CommitRequest, CommitResponse, ListRequest, ListResponse, NoteRequest, NoteResponse, PublishRequest,
    PublishResponse, RetrieveRequest, RetrieveResponse, StoreResponse, TagRequest, TagResponse,
    UnpublishRequest, UnpublishResponse,
};

use crate::auth::{IdentityProvider, TrustedHeaderIdentity};
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub astore: Astore,
    pub blobs: InMemoryBlobStore,
    pub identity: Arc<dyn IdentityProvider>,
    /// Cancelled when the server shuts down; every call runs under a child of it.
    pub shutdown: CancellationToken,
    pub timeout: Option<Duration>,
}

impl AppState {
    /// Wire an engine over in-memory backends as described by `config`.
    pub fn from_config(config: &ServerConfig, shutdown: CancellationToken) -> ServerResult<Self> {
        let blobs = InMemoryBlobStore::new(config.signer()?);
        let docs = InMemoryDocumentStore::new();
        let astore = Astore::new(Arc::new(docs), Arc::new(blobs.clone()), config.astore_options());
        Ok(Self {
            astore,
            blobs,
            identity: Arc::new(TrustedHeaderIdentity::new(&config.creator_header)?),
            shutdown,
            timeout: config.request_timeout(),
        })
    }

    async fn context(&self, headers: &HeaderMap) -> ServerResult<CallContext> {
        let identity = self.identity.identify(headers).await?;
        let ctx = CallContext::new(identity.name).with_cancellation(self.shutdown.child_token());
        Ok(match self.timeout {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx,
        })
    }
}

pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn info_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let options = state.astore.options();
    Json(json!({
        "name": "astore-server",
        "version": env!("CARGO_PKG_VERSION"),
        "bucket": options.bucket,
        "publish": !options.publish_base_url.is_empty(),
    }))
}

pub async fn store_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ServerResult<Json<StoreResponse>> {
    let ctx = state.context(&headers).await?;
    Ok(Json(state.astore.store(&ctx).await?))
}

pub async fn commit_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CommitRequest>,
) -> ServerResult<Json<CommitResponse>> {
    let ctx = state.context(&headers).await?;
    Ok(Json(state.astore.commit(&ctx, req).await?))
}

pub async fn retrieve_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RetrieveRequest>,
) -> ServerResult<Json<RetrieveResponse>> {
    let ctx = state.context(&headers).await?;
    Ok(Json(state.astore.retrieve(&ctx, req).await?))
}

pub async fn list_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ListRequest>,
) -> ServerResult<Json<ListResponse>> {
    let ctx = state.context(&headers).await?;
    Ok(Json(state.astore.list(&ctx, req).await?))
}

pub async fn tag_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<TagRequest>,
) -> ServerResult<Json<TagResponse>> {
    let ctx = state.context(&headers).await?;
    Ok(Json(state.astore.tag(&ctx, req).await?))
}

pub async fn note_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<NoteRequest>,
) -> ServerResult<Json<NoteResponse>> {
    let ctx = state.context(&headers).await?;
    Ok(Json(state.astore.note(&ctx, req).await?))
}

pub async fn publish_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<PublishRequest>,
) -> ServerResult<Json<PublishResponse>> {
    let ctx = state.context(&headers).await?;
    Ok(Json(state.astore.publish(&ctx, req).await?))
}

pub async fn unpublish_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UnpublishRequest>,
) -> ServerResult<Json<UnpublishResponse>> {
    let ctx = state.context(&headers).await?;
    Ok(Json(state.astore.unpublish(&ctx, req).await?))
}

/// Query parameters accepted by the download endpoints.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DownloadParams {
    pub architecture: String,
    pub uid: String,
    /// `None` when no tag parameter was present at all.
    pub tags: Option<Vec<String>>,
}

impl DownloadParams {
    /// Parse `a`/`arch`, `u`/`uid` and repeated `t`/`tag` parameters.
    ///
    /// The short form of a single valued parameter wins over the long one.
    pub fn parse(query: Option<&str>) -> Self {
        let mut params = Self::default();
        let (mut arch, mut uid) = (String::new(), String::new());
        let (mut short_tags, mut long_tags): (Option<Vec<String>>, Option<Vec<String>>) = (None, None);

        for (key, value) in form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
            match key.as_ref() {
                "a" if !value.is_empty() => params.architecture = value.into_owned(),
                "arch" if !value.is_empty() => arch = value.into_owned(),
                "u" if !value.is_empty() => params.uid = value.into_owned(),
                "uid" if !value.is_empty() => uid = value.into_owned(),
                "t" => short_tags.get_or_insert_with(Vec::new).push(value.into_owned()),
                "tag" => long_tags.get_or_insert_with(Vec::new).push(value.into_owned()),
                _ => {}
            }
        }
        if params.architecture.is_empty() {
            params.architecture = arch;
        }
        if params.uid.is_empty() {
            params.uid = uid;
        }
        params.tags = short_tags.or(long_tags).map(|tags| {
            tags.into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect()
        });
        params
    }

    /// Tag filter for a direct download.
    ///
    /// Asking for a uid without tags must not fall back to `latest`.
    pub fn tag_filter(&self) -> Option<Vec<String>> {
        match &self.tags {
            Some(tags) => Some(tags.clone()),
            None if !self.uid.is_empty() => Some(Vec::new()),
            None => None,
        }
    }
}

/// Redirect to the signed download URL, naming the file after the last
/// segment of the requested path.
fn download_redirect(requested: &str, resp: &RetrieveResponse) -> ServerResult<Redirect> {
    let name = requested
        .rsplit('/')
        .find(|s| !s.is_empty())
        .or_else(|| resp.path.rsplit('/').find(|s| !s.is_empty()))
        .unwrap_or(resp.artifact.uid.as_str());
    let mut url = Url::parse(&resp.url)
        .map_err(|e| ServerError::Internal(format!("engine returned bad url {} - {e}", resp.url)))?;
    url.query_pairs_mut()
        .append_pair("response-content-disposition", &format!("inline; filename=\"{name}\""));
    Ok(Redirect::temporary(url.as_str()))
}

/// `GET /g/<path>`: download an artifact by path, architecture, tags or uid.
pub async fn download_handler(
    State(state): State<AppState>,
    path: Option<Path<String>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> ServerResult<Redirect> {
    let path = path.map(|Path(p)| p).unwrap_or_default();
    let params = DownloadParams::parse(query.as_deref());
    let req = RetrieveRequest {
        tag: params.tag_filter(),
        path: path.clone(),
        uid: params.uid,
        architecture: params.architecture,
    };

    let ctx = state.context(&headers).await?;
    let resp = state.astore.retrieve(&ctx, req.clone()).await.map_err(|e| {
        tracing::warn!(path = %req.path, uid = %req.uid, arch = %req.architecture, tags = ?req.tag, error = %e, "download failed");
        e
    })?;
    download_redirect(&path, &resp)
}

/// `GET /d/<public>`: download what a published path currently selects.
pub async fn download_published_handler(
    State(state): State<AppState>,
    Path(public): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> ServerResult<Redirect> {
    let params = DownloadParams::parse(query.as_deref());
    let ctx = state.context(&headers).await?;
    let resp = state
        .astore
        .download_published(&ctx, &public, &params.architecture, &params.uid)
        .await?;
    download_redirect(&public, &resp)
}

/// `GET /l/<public>`: list what a published path currently selects.
pub async fn list_published_handler(
    State(state): State<AppState>,
    Path(public): Path<String>,
    headers: HeaderMap,
) -> ServerResult<Json<ListResponse>> {
    let ctx = state.context(&headers).await?;
    Ok(Json(state.astore.list_published(&ctx, &public).await?))
}

/// Capability presented on a blob gateway request.
struct Capability {
    expires: i64,
    signature: String,
    disposition: Option<String>,
}

impl Capability {
    fn parse(object: &str, query: Option<&str>) -> ServerResult<Self> {
        let (mut expires, mut signature, mut disposition) = (None, None, None);
        for (key, value) in form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
            match key.as_ref() {
                "expires" => expires = value.parse::<i64>().ok(),
                "signature" => signature = Some(value.into_owned()),
                "response-content-disposition" => disposition = Some(value.into_owned()),
                _ => {}
            }
        }
        match (expires, signature) {
            (Some(expires), Some(signature)) => Ok(Self {
                expires,
                signature,
                disposition,
            }),
            _ => Err(BlobError::InvalidSignature(format!("{object}: missing capability")).into()),
        }
    }
}

fn check_bucket(state: &AppState, bucket: &str, object: &str) -> ServerResult<()> {
    if bucket != state.blobs.signer().bucket() {
        return Err(BlobError::NotFound(format!("{bucket}/{object}")).into());
    }
    Ok(())
}

/// `PUT /blob/<bucket>/<object>`: upload through a signed PUT URL.
pub async fn blob_put_handler(
    State(state): State<AppState>,
    Path((bucket, object)): Path<(String, String)>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> ServerResult<StatusCode> {
    check_bucket(&state, &bucket, &object)?;
    let cap = Capability::parse(&object, query.as_deref())?;
    state
        .blobs
        .authorize(&object, Method::Put, cap.expires, &cap.signature)?;
    let attrs = state.blobs.put(&object, body)?;
    tracing::info!(object = %attrs.name, size = attrs.size, "blob uploaded");
    Ok(StatusCode::OK)
}

/// `GET /blob/<bucket>/<object>`: download through a signed GET URL.
pub async fn blob_get_handler(
    State(state): State<AppState>,
    Path((bucket, object)): Path<(String, String)>,
    RawQuery(query): RawQuery,
) -> ServerResult<Response> {
    check_bucket(&state, &bucket, &object)?;
    let cap = Capability::parse(&object, query.as_deref())?;
    state
        .blobs
        .authorize(&object, Method::Get, cap.expires, &cap.signature)?;
    let data = state.blobs.get(&object)?;

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
    if let Some(disposition) = cap.disposition {
        let value = HeaderValue::from_str(&disposition)
            .map_err(|_| ServerError::InvalidRequest(format!("bad content disposition {disposition:?}")))?;
        headers.insert(CONTENT_DISPOSITION, value);
    }
    Ok((headers, data).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_params_win() {
        let p = DownloadParams::parse(Some("arch=arm64&a=amd64&uid=long&u=short"));
        assert_eq!(p.architecture, "amd64");
        assert_eq!(p.uid, "short");
        assert_eq!(p.tags, None);
        assert_eq!(p.tag_filter(), Some(vec![]));
    }

    #[test]
    fn blank_tags_are_dropped() {
        let p = DownloadParams::parse(Some("t=stable&t=+&t=qa"));
        assert_eq!(p.tags, Some(vec!["stable".to_string(), "qa".to_string()]));

        let blank = DownloadParams::parse(Some("tag="));
        assert_eq!(blank.tag_filter(), Some(vec![]));
    }

    #[test]
    fn no_params_selects_latest() {
        let p = DownloadParams::parse(None);
        assert_eq!(p, DownloadParams::default());
        assert_eq!(p.tag_filter(), None);
    }

    #[test]
    fn missing_capability_is_rejected() {
        assert!(Capability::parse("upload/x", Some("expires=10")).is_err());
        assert!(Capability::parse("upload/x", Some("expires=soon&signature=ab")).is_err());
        let cap = Capability::parse("upload/x", Some("expires=10&signature=ab")).unwrap();
        assert_eq!(cap.expires, 10);
        assert!(cap.disposition.is_none());
    }
}
