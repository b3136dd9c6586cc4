//! Tag domain model.
//!
//! # Responsibility
//! - Define hierarchical classification labels and their tree projection.
//! - Provide the lowercase-hyphenated naming convention applied at the
//!   capture boundary.
//!
//! # Invariants
//! - `name` is the deduplication key: one row per distinct name.
//! - `parent_id`, when set, references an existing tag.
//! - The parent relation is expected to be a forest; readers must still
//!   terminate when stored data contains a cycle.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

static NON_SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid tag slug regex"));

/// Stable identifier of a tag.
pub type TagId = Uuid;

/// A classification label, optionally nested under one parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TagId>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

/// A tag linked to an entry together with the classifier confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagLink {
    pub tag: Tag,
    pub confidence: f64,
}

/// Tree projection of the tag catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagNode {
    pub id: TagId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TagNode>,
}

impl TagNode {
    /// Number of nodes in this subtree, including `self`.
    pub fn len(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            count += 1;
            pending.extend(node.children.iter());
        }
        count
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

// Deep parent chains would otherwise recurse once per level on drop.
impl Drop for TagNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// Canonicalizes a free-form label into the `lowercase-hyphenated` form.
///
/// Returns `None` when nothing alphanumeric remains.
///
/// ```
/// use kb_core::model::tag::canonical_tag_name;
/// assert_eq!(canonical_tag_name("  Machine Learning "), Some("machine-learning".to_string()));
/// assert_eq!(canonical_tag_name("--"), None);
/// ```
pub fn canonical_tag_name(raw: &str) -> Option<String> {
    let lowered = raw.trim().to_lowercase();
    let slug = NON_SLUG_RE.replace_all(&lowered, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        None
    } else {
        Some(slug.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::canonical_tag_name;

    #[test]
    fn canonical_name_collapses_separators() {
        assert_eq!(
            canonical_tag_name("Rust / Async_IO"),
            Some("rust-async-io".to_string())
        );
        assert_eq!(canonical_tag_name("golang"), Some("golang".to_string()));
    }

    #[test]
    fn canonical_name_rejects_symbol_only_input() {
        assert_eq!(canonical_tag_name("  "), None);
        assert_eq!(canonical_tag_name("!!!"), None);
    }
}
