//! Path to key derivation.
//!
//! A virtual path such as `tools/play` becomes the key chain
//! `Pel("root")/Pel("tools")/Pel("play")`, optionally followed by an
//! `Arch("<name>")` level. Every operation that addresses artifacts derives
//! its keys here so that commits, queries and tag scoping always agree.
//! Published aliases use the same scheme under a separate `published`
//! anchor, so the two namespaces never overlap.

use chrono::Utc;
use tracing::debug;

use astore_store::{DocumentStore, Entity, Key, Kind, Mutation, StoreError};
use astore_types::{ArchitectureRecord, PathElementRecord};

use crate::context::CallContext;
use crate::error::{AstoreError, AstoreResult};

pub const ROOT_SEGMENT: &str = "root";
pub const PUBLISHED_SEGMENT: &str = "published";
/// Architecture recorded by commits that do not name one.
pub const DEFAULT_ARCHITECTURE: &str = "all";

/// Normalize a slash separated path.
///
/// Surrounding whitespace is trimmed, backslashes count as separators,
/// empty and `.` segments are dropped and `..` removes the previous
/// segment. `..` never climbs above the anchor.
pub fn clean_path(raw: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.trim().split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

fn fold_chain(anchor: &str, cleaned: &str) -> Key {
    cleaned
        .split('/')
        .filter(|s| !s.is_empty())
        .fold(Key::named(Kind::PathElement, anchor, None), |parent, segment| {
            Key::named(Kind::PathElement, segment, Some(&parent))
        })
}

/// Derive the anchored directory string and key for `raw`.
///
/// The directory always starts with `root`; it is the value artifacts and
/// child path elements carry in their `Parent` property.
pub fn key_from_path(raw: &str, architecture: &str) -> (String, Key) {
    let cleaned = clean_path(raw);
    let dir = if cleaned.is_empty() {
        ROOT_SEGMENT.to_string()
    } else {
        format!("{ROOT_SEGMENT}/{cleaned}")
    };
    let key = fold_chain(ROOT_SEGMENT, &cleaned);
    let key = match architecture.trim() {
        "" => key,
        arch => Key::named(Kind::Architecture, arch, Some(&key)),
    };
    (dir, key)
}

/// A public path derived under the `published` anchor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishedPath {
    /// Anchored directory, e.g. `published/p/play`.
    pub dir: String,
    /// Cleaned public path without the anchor, e.g. `p/play`.
    pub cleaned: String,
    /// Key of the last path element.
    pub key: Key,
}

pub fn publish_key_from_path(raw: &str) -> AstoreResult<PublishedPath> {
    let cleaned = clean_path(raw);
    if cleaned.is_empty() {
        return Err(AstoreError::InvalidArgument(format!(
            "path {raw:?} is invalid - results in empty path after cleanups"
        )));
    }
    Ok(PublishedPath {
        dir: format!("{PUBLISHED_SEGMENT}/{cleaned}"),
        key: fold_chain(PUBLISHED_SEGMENT, &cleaned),
        cleaned,
    })
}

/// Key of the single alias stored at a public path.
pub fn published_key(path_key: &Key) -> Key {
    Key::named(Kind::Published, PUBLISHED_SEGMENT, Some(path_key))
}

/// Logical path of a key: its path elements without the anchor.
pub fn key_to_path(key: &Key) -> String {
    let mut names: Vec<&str> = key
        .chain()
        .filter(|k| k.kind() == Kind::PathElement)
        .filter_map(Key::name)
        .collect();
    if names.last() == Some(&ROOT_SEGMENT) {
        names.pop();
    }
    names.reverse();
    names.join("/")
}

/// Architecture a key is filed under, or empty when it sits directly on a path element.
pub fn key_to_architecture(key: &Key) -> String {
    key.chain()
        .find(|k| matches!(k.kind(), Kind::PathElement | Kind::Architecture))
        .filter(|k| k.kind() == Kind::Architecture)
        .and_then(Key::name)
        .unwrap_or_default()
        .to_string()
}

/// Records for every path element and architecture node along `key`, anchor first.
pub(crate) fn path_nodes(key: &Key, creator: &str) -> Vec<(Key, Entity)> {
    let mut chain: Vec<&Key> = key.chain().collect();
    chain.reverse();

    let created = Utc::now();
    let mut dir = String::new();
    let mut nodes = Vec::with_capacity(chain.len());
    for k in chain {
        let Some(name) = k.name() else { continue };
        match k.kind() {
            Kind::PathElement => {
                let record = PathElementRecord {
                    parent: dir.clone(),
                    creator: creator.to_string(),
                    created,
                };
                nodes.push((k.clone(), record.into()));
                if !dir.is_empty() {
                    dir.push('/');
                }
                dir.push_str(name);
            }
            Kind::Architecture => {
                let record = ArchitectureRecord {
                    parent: dir.clone(),
                    creator: creator.to_string(),
                    created,
                };
                nodes.push((k.clone(), record.into()));
            }
            Kind::Artifact | Kind::Published => {}
        }
    }
    nodes
}

/// Insert every missing node along `key`. Nodes that already exist are left alone.
///
/// Returns how many nodes were created.
pub(crate) async fn materialize(
    docs: &dyn DocumentStore,
    ctx: &CallContext,
    key: &Key,
) -> AstoreResult<usize> {
    let mut created = 0;
    for (node, entity) in path_nodes(key, ctx.creator()) {
        match ctx.run(docs.mutate(vec![Mutation::Insert(node, entity)])).await {
            Ok(_) => created += 1,
            Err(AstoreError::Store(StoreError::AlreadyExists(_))) => {}
            Err(e) => return Err(e),
        }
    }
    debug!(%key, created, "materialized path");
    Ok(created)
}
