use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// The kind of entity a key addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
    PathElement,
    Architecture,
    Artifact,
    Published,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PathElement => write!(f, "Pel"),
            Self::Architecture => write!(f, "Arch"),
            Self::Artifact => write!(f, "Artifact"),
            Self::Published => write!(f, "Pub"),
        }
    }
}

/// The last component of a key: a name, a store-allocated id, or nothing
/// yet (incomplete, filled in on insert).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum KeyName {
    Name(String),
    Id(u64),
    Incomplete,
}

/// Hierarchical document key.
///
/// A key is a kind and name chained to an optional parent key. Chains are
/// how the store encodes the directory tree: entities are filed under the
/// key of their parent, and ancestor queries select whole sub-trees.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Key {
    kind: Kind,
    name: KeyName,
    parent: Option<Arc<Key>>,
}

impl Key {
    /// A key identified by name.
    pub fn named(kind: Kind, name: impl Into<String>, parent: Option<&Key>) -> Self {
        Self {
            kind,
            name: KeyName::Name(name.into()),
            parent: parent.map(|p| Arc::new(p.clone())),
        }
    }

    /// A key whose id is allocated by the store on insert.
    pub fn incomplete(kind: Kind, parent: Option<&Key>) -> Self {
        Self {
            kind,
            name: KeyName::Incomplete,
            parent: parent.map(|p| Arc::new(p.clone())),
        }
    }

    /// A key identified by a store-allocated id.
    pub fn with_id(kind: Kind, id: u64, parent: Option<&Key>) -> Self {
        Self {
            kind,
            name: KeyName::Id(id),
            parent: parent.map(|p| Arc::new(p.clone())),
        }
    }

    /// Complete an incomplete key with an allocated id.
    pub(crate) fn completed(&self, id: u64) -> Self {
        Self {
            kind: self.kind,
            name: KeyName::Id(id),
            parent: self.parent.clone(),
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        match &self.name {
            KeyName::Name(name) => Some(name),
            _ => None,
        }
    }

    pub fn id(&self) -> Option<u64> {
        match self.name {
            KeyName::Id(id) => Some(id),
            _ => None,
        }
    }

    pub fn parent(&self) -> Option<&Key> {
        self.parent.as_deref()
    }

    pub fn is_incomplete(&self) -> bool {
        self.name == KeyName::Incomplete
    }

    /// This key followed by each of its ancestors, nearest first.
    pub fn chain(&self) -> impl Iterator<Item = &Key> {
        std::iter::successors(Some(self), |k| k.parent())
    }

    /// Returns `true` if `ancestor` is this key or one of its parents.
    pub fn has_ancestor(&self, ancestor: &Key) -> bool {
        self.chain().any(|k| k == ancestor)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = self.parent() {
            write!(f, "{parent}/")?;
        }
        match &self.name {
            KeyName::Name(name) => write!(f, "{}({name:?})", self.kind),
            KeyName::Id(id) => write!(f, "{}({id})", self.kind),
            KeyName::Incomplete => write!(f, "{}(?)", self.kind),
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(names: &[&str]) -> Key {
        let mut key: Option<Key> = None;
        for name in names {
            key = Some(Key::named(Kind::PathElement, *name, key.as_ref()));
        }
        key.unwrap()
    }

    #[test]
    fn keys_compare_by_whole_chain() {
        assert_eq!(chain(&["root", "a"]), chain(&["root", "a"]));
        assert_ne!(chain(&["root", "a"]), chain(&["published", "a"]));
    }

    #[test]
    fn ancestor_includes_self() {
        let dir = chain(&["root", "tools"]);
        let leaf = Key::named(Kind::PathElement, "play", Some(&dir));
        assert!(leaf.has_ancestor(&leaf));
        assert!(leaf.has_ancestor(&dir));
        assert!(leaf.has_ancestor(&chain(&["root"])));
        assert!(!dir.has_ancestor(&leaf));
    }

    #[test]
    fn incomplete_keys_complete_in_place() {
        let dir = chain(&["root"]);
        let key = Key::incomplete(Kind::Artifact, Some(&dir));
        assert!(key.is_incomplete());
        let done = key.completed(42);
        assert_eq!(done.id(), Some(42));
        assert_eq!(done.parent(), Some(&dir));
        assert_eq!(done, Key::with_id(Kind::Artifact, 42, Some(&dir)));
    }

    #[test]
    fn display_shows_chain() {
        let key = Key::named(Kind::Architecture, "amd64", Some(&chain(&["root", "a"])));
        assert_eq!(key.to_string(), r#"Pel("root")/Pel("a")/Arch("amd64")"#);
    }
}
