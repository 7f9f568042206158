//! Request and response messages of the artifact store RPC surface.
//!
//! Optional string fields follow the wire convention of "empty means
//! unset". The tag fields of [`RetrieveRequest`], [`ListRequest`] and
//! [`Selection`] are the exception: `None` and `Some(vec![])` are distinct
//! (see [`crate::TagFilter`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{Sid, Uid};

/// A committed artifact as returned to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub uid: Uid,
    pub sid: Sid,
    pub architecture: String,
    /// Hex-encoded MD5 digest of the blob.
    pub md5: String,
    pub size: u64,
    pub tags: Vec<String>,
    pub creator: String,
    pub created: DateTime<Utc>,
    pub note: String,
}

/// A child path element returned by a list call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub name: String,
    pub creator: String,
    pub created: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreResponse {
    pub sid: Sid,
    /// Signed PUT capability URL for the upload.
    pub url: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitRequest {
    pub sid: String,
    pub path: String,
    pub architecture: String,
    pub note: String,
    pub tag: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitResponse {
    pub artifact: Artifact,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieveRequest {
    pub uid: String,
    pub path: String,
    pub architecture: String,
    pub tag: Option<Vec<String>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrieveResponse {
    /// Logical path the artifact is filed under.
    pub path: String,
    pub artifact: Artifact,
    /// Signed GET capability URL for the download.
    pub url: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListRequest {
    pub path: String,
    pub uid: String,
    pub architecture: String,
    pub tag: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResponse {
    pub elements: Vec<Element>,
    pub artifacts: Vec<Artifact>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagRequest {
    pub uid: String,
    /// Replace the tag set.
    pub set: Option<Vec<String>>,
    /// Add to the tag set.
    pub add: Option<Vec<String>>,
    /// Remove from the tag set.
    pub del: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagResponse {
    pub artifacts: Vec<Artifact>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteRequest {
    pub uid: String,
    pub note: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteResponse {
    pub artifacts: Vec<Artifact>,
}

/// The frozen query a published path resolves to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selection {
    pub uid: String,
    pub path: String,
    pub architecture: String,
    pub tag: Option<Vec<String>>,
}

impl From<Selection> for RetrieveRequest {
    fn from(sel: Selection) -> Self {
        Self {
            uid: sel.uid,
            path: sel.path,
            architecture: sel.architecture,
            tag: sel.tag,
        }
    }
}

impl From<Selection> for ListRequest {
    fn from(sel: Selection) -> Self {
        Self {
            uid: sel.uid,
            path: sel.path,
            architecture: sel.architecture,
            tag: sel.tag,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishRequest {
    /// Public path to publish under.
    pub path: String,
    pub select: Selection,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResponse {
    pub url: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnpublishRequest {
    pub path: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnpublishResponse {}
