//! Tag hierarchy use-case service.
//!
//! # Responsibility
//! - Expose get-or-create, lookup and re-parenting over the tag catalogue.
//! - Materialize the flat catalogue into a forest for display.
//!
//! # Invariants
//! - Tree building terminates on any input, including cyclic parent data.
//! - Every input tag appears exactly once in the built forest.
//! - Siblings are ordered by `name ASC, id ASC`.

use crate::model::tag::{Tag, TagId, TagNode};
use crate::repo::entry_repo::RepoResult;
use crate::repo::tag_repo::TagRepository;
use log::warn;
use std::collections::{HashMap, HashSet};

/// Tag service facade over repository implementations.
pub struct TagService<R: TagRepository> {
    repo: R,
}

impl<R: TagRepository> TagService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn get_or_create_tag(&self, name: &str, parent_id: Option<TagId>) -> RepoResult<Tag> {
        self.repo.get_or_create_tag(name, parent_id)
    }

    pub fn find_tag_by_name(&self, name: &str) -> RepoResult<Option<Tag>> {
        self.repo.find_tag_by_name(name)
    }

    pub fn list_tags(&self) -> RepoResult<Vec<Tag>> {
        self.repo.list_tags()
    }

    /// Loads the whole catalogue as a forest.
    pub fn tag_tree(&self) -> RepoResult<Vec<TagNode>> {
        let tags = self.repo.list_tags()?;
        Ok(build_tag_tree(&tags))
    }

    pub fn set_tag_parent(&self, id: TagId, parent_id: Option<TagId>) -> RepoResult<()> {
        self.repo.set_tag_parent(id, parent_id)
    }
}

/// Builds a forest from a flat tag list.
///
/// Roots are tags without a parent or whose parent is not part of `tags`.
/// Tags reachable only through a parent cycle are surfaced as additional
/// roots instead of being dropped.
pub fn build_tag_tree(tags: &[Tag]) -> Vec<TagNode> {
    let mut ordered: Vec<&Tag> = tags.iter().collect();
    ordered.sort_by(|left, right| left.name.cmp(&right.name).then(left.id.cmp(&right.id)));

    let known: HashSet<TagId> = ordered.iter().map(|tag| tag.id).collect();
    let mut children_of: HashMap<TagId, Vec<&Tag>> = HashMap::new();
    let mut roots = Vec::new();
    for tag in &ordered {
        match tag.parent_id {
            Some(parent_id) if known.contains(&parent_id) => {
                children_of.entry(parent_id).or_default().push(*tag);
            }
            _ => roots.push(*tag),
        }
    }

    let mut visited = HashSet::with_capacity(ordered.len());
    let mut forest = Vec::with_capacity(roots.len());
    for root in roots {
        if visited.insert(root.id) {
            forest.push(build_subtree(root, &children_of, &mut visited));
        }
    }

    let mut detached = 0usize;
    for tag in &ordered {
        if visited.insert(tag.id) {
            detached += 1;
            forest.push(build_subtree(tag, &children_of, &mut visited));
        }
    }
    if detached > 0 {
        warn!("event=tag_tree_build module=service status=cycle detached_roots={detached}");
    }

    forest
}

/// Assembles the subtree under an already visited `root` with an explicit stack.
fn build_subtree(
    root: &Tag,
    children_of: &HashMap<TagId, Vec<&Tag>>,
    visited: &mut HashSet<TagId>,
) -> TagNode {
    // Pre-order slots, each holding the slot index of its parent.
    let mut slots: Vec<(TagNode, Option<usize>)> = Vec::new();
    let mut pending: Vec<(&Tag, Option<usize>)> = vec![(root, None)];
    while let Some((tag, parent)) = pending.pop() {
        let slot = slots.len();
        slots.push((
            TagNode {
                id: tag.id,
                name: tag.name.clone(),
                children: Vec::new(),
            },
            parent,
        ));
        if let Some(candidates) = children_of.get(&tag.id) {
            for child in candidates.iter().rev() {
                if visited.insert(child.id) {
                    pending.push((child, Some(slot)));
                }
            }
        }
    }

    // Children always sit after their parent, so folding from the back
    // completes every subtree before it is attached.
    let mut assembled = None;
    while let Some((mut node, parent)) = slots.pop() {
        node.children.reverse();
        match parent {
            Some(parent) => slots[parent].0.children.push(node),
            None => assembled = Some(node),
        }
    }
    assembled.unwrap_or_else(|| TagNode {
        id: root.id,
        name: root.name.clone(),
        children: Vec::new(),
    })
}
