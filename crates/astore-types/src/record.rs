//! Records persisted in the document store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{Artifact, ListRequest, RetrieveRequest, Selection};
use crate::id::{Sid, Uid};

/// One committed version of a file, as stored.
///
/// The architecture is not a field: it is recovered from the key chain the
/// record is filed under.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub uid: Uid,
    pub sid: Sid,
    pub tags: Vec<String>,
    pub md5: [u8; 16],
    pub size: u64,
    /// Normalized directory path the artifact is filed under (`root/...`).
    pub parent: String,
    pub creator: String,
    pub created: DateTime<Utc>,
    pub note: String,
}

impl ArtifactRecord {
    pub fn to_artifact(&self, architecture: &str) -> Artifact {
        Artifact {
            uid: self.uid.clone(),
            sid: self.sid.clone(),
            architecture: architecture.to_string(),
            md5: hex::encode(self.md5),
            size: self.size,
            tags: self.tags.clone(),
            creator: self.creator.clone(),
            created: self.created,
            note: self.note.clone(),
        }
    }
}

/// One segment of the virtual directory tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathElementRecord {
    pub parent: String,
    pub creator: String,
    pub created: DateTime<Utc>,
}

/// "This path, for architecture X."
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitectureRecord {
    pub parent: String,
    pub creator: String,
    pub created: DateTime<Utc>,
}

/// A stored selection reachable through a public path.
///
/// `has_tags` keeps the difference between "no tag field" and "empty tag
/// list" once the selection is flattened for storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedRecord {
    pub parent: String,
    pub creator: String,
    pub created: DateTime<Utc>,

    pub uid: String,
    pub path: String,
    pub architecture: String,
    pub has_tags: bool,
    pub tags: Vec<String>,
}

impl PublishedRecord {
    pub fn new(parent: impl Into<String>, creator: impl Into<String>, selection: &Selection) -> Self {
        Self {
            parent: parent.into(),
            creator: creator.into(),
            created: Utc::now(),
            uid: selection.uid.clone(),
            path: selection.path.clone(),
            architecture: selection.architecture.clone(),
            has_tags: selection.tag.is_some(),
            tags: selection.tag.clone().unwrap_or_default(),
        }
    }

    /// The stored selection, with the absent/empty tag distinction restored.
    pub fn selection(&self) -> Selection {
        Selection {
            uid: self.uid.clone(),
            path: self.path.clone(),
            architecture: self.architecture.clone(),
            tag: self.has_tags.then(|| self.tags.clone()),
        }
    }

    pub fn to_retrieve_request(&self) -> RetrieveRequest {
        self.selection().into()
    }

    pub fn to_list_request(&self) -> ListRequest {
        self.selection().into()
    }
}
