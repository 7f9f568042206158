use chrono::{DateTime, Utc};

use astore_types::{ArchitectureRecord, ArtifactRecord, PathElementRecord, PublishedRecord};

use crate::key::Kind;

/// Indexed properties that queries can filter on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Property {
    Parent,
    Uid,
    /// Multi-valued: matches if any tag equals the filter value.
    Tag,
}

/// A document stored under a [`crate::Key`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Entity {
    PathElement(PathElementRecord),
    Architecture(ArchitectureRecord),
    Artifact(ArtifactRecord),
    Published(PublishedRecord),
}

impl Entity {
    pub fn kind(&self) -> Kind {
        match self {
            Self::PathElement(_) => Kind::PathElement,
            Self::Architecture(_) => Kind::Architecture,
            Self::Artifact(_) => Kind::Artifact,
            Self::Published(_) => Kind::Published,
        }
    }

    pub fn created(&self) -> DateTime<Utc> {
        match self {
            Self::PathElement(e) => e.created,
            Self::Architecture(e) => e.created,
            Self::Artifact(e) => e.created,
            Self::Published(e) => e.created,
        }
    }

    /// Values of an indexed property; empty if the entity has none.
    pub fn property(&self, property: Property) -> Vec<&str> {
        match (self, property) {
            (Self::PathElement(e), Property::Parent) => vec![e.parent.as_str()],
            (Self::Architecture(e), Property::Parent) => vec![e.parent.as_str()],
            (Self::Published(e), Property::Parent) => vec![e.parent.as_str()],
            (Self::Artifact(a), Property::Parent) => vec![a.parent.as_str()],
            (Self::Artifact(a), Property::Uid) => vec![a.uid.as_str()],
            (Self::Artifact(a), Property::Tag) => a.tags.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    pub fn as_artifact(&self) -> Option<&ArtifactRecord> {
        match self {
            Self::Artifact(a) => Some(a),
            _ => None,
        }
    }

    pub fn into_artifact(self) -> Option<ArtifactRecord> {
        match self {
            Self::Artifact(a) => Some(a),
            _ => None,
        }
    }

    pub fn into_path_element(self) -> Option<PathElementRecord> {
        match self {
            Self::PathElement(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_published(self) -> Option<PublishedRecord> {
        match self {
            Self::Published(p) => Some(p),
            _ => None,
        }
    }
}

impl From<PathElementRecord> for Entity {
    fn from(e: PathElementRecord) -> Self {
        Self::PathElement(e)
    }
}

impl From<ArchitectureRecord> for Entity {
    fn from(e: ArchitectureRecord) -> Self {
        Self::Architecture(e)
    }
}

impl From<ArtifactRecord> for Entity {
    fn from(a: ArtifactRecord) -> Self {
        Self::Artifact(a)
    }
}

impl From<PublishedRecord> for Entity {
    fn from(p: PublishedRecord) -> Self {
        Self::Published(p)
    }
}
