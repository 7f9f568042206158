//! Tag-set normalization and the tri-state tag filter.

use std::collections::HashSet;

/// Tag implicitly assigned to every freshly committed artifact.
pub const LATEST_TAG: &str = "latest";

/// Trim, drop blanks and de-duplicate, keeping first-occurrence order.
pub fn clean_unique<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    clean_unique_delete(tags, std::iter::empty::<&str>())
}

/// Like [`clean_unique`], additionally removing every tag listed in `del`.
pub fn clean_unique_delete<I, S, D, T>(tags: I, del: D) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    D: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    let mut seen: HashSet<String> = del
        .into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .collect();
    let mut out = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if tag.is_empty() || seen.contains(tag) {
            continue;
        }
        seen.insert(tag.to_string());
        out.push(tag.to_string());
    }
    out
}

/// Tag constraint of a retrieve or list request.
///
/// An absent tag field and an explicitly empty one mean different things:
/// absent selects the `latest` artifact, empty disables tag filtering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TagFilter {
    /// No tag field supplied: behaves as `["latest"]`.
    Default,
    /// Explicitly empty tag list: no tag constraint at all.
    Any,
    /// Every listed tag must be held by the artifact.
    AllOf(Vec<String>),
}

impl TagFilter {
    pub fn from_request(tags: Option<&[String]>) -> Self {
        match tags {
            None => Self::Default,
            Some([]) => Self::Any,
            Some(tags) => Self::AllOf(tags.to_vec()),
        }
    }

    /// The tags a matching artifact must carry.
    pub fn required(&self) -> Vec<String> {
        match self {
            Self::Default => vec![LATEST_TAG.to_string()],
            Self::Any => Vec::new(),
            Self::AllOf(tags) => tags.clone(),
        }
    }
}
