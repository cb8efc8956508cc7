//! Resolving and creating nested groups along a segment path.

use crate::error::{Result, VaultError};
use crate::models::{NodeId, Store};
use crate::path;

/// First child group of `parent` called `name`.
pub fn child_group(store: &Store, parent: NodeId, name: &str) -> Option<NodeId> {
    store
        .children(parent)
        .iter()
        .copied()
        .find(|id| store.node(*id).is_some_and(|n| n.is_group() && n.name == name))
}

/// All child groups of `parent` called `name`, in stored order.
pub fn child_groups(store: &Store, parent: NodeId, name: &str) -> Vec<NodeId> {
    store
        .children(parent)
        .iter()
        .copied()
        .filter(|id| store.node(*id).is_some_and(|n| n.is_group() && n.name == name))
        .collect()
}

/// Walk from the root, taking the first matching child group at each level.
pub fn resolve<S: AsRef<str>>(store: &Store, segments: &[S]) -> Option<NodeId> {
    let (found, depth) = longest_prefix(store, segments);
    (depth == segments.len()).then_some(found)
}

/// Deepest group reachable along `segments` and how many segments it covers.
fn longest_prefix<S: AsRef<str>>(store: &Store, segments: &[S]) -> (NodeId, usize) {
    let mut current = store.root();
    for (depth, segment) in segments.iter().enumerate() {
        match child_group(store, current, segment.as_ref()) {
            Some(next) => current = next,
            None => return (current, depth),
        }
    }
    (current, segments.len())
}

/// Result of [`ensure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ensured {
    pub group: NodeId,
    /// Number of groups that had to be created.
    pub created: usize,
}

/// Resolve `segments`, creating missing groups when `allow_create` is set.
///
/// Missing groups are created strictly left to right beneath the deepest
/// existing ancestor. The only failure, `PathNotFound` when creation is not
/// allowed, is decided before anything is created, so a failed call leaves
/// the tree untouched.
pub fn ensure<S: AsRef<str>>(
    store: &mut Store,
    segments: &[S],
    allow_create: bool,
) -> Result<Ensured> {
    let (anchor, depth) = longest_prefix(store, segments);
    if depth == segments.len() {
        return Ok(Ensured {
            group: anchor,
            created: 0,
        });
    }
    if !allow_create {
        return Err(VaultError::PathNotFound(path::join(segments)));
    }

    let missing = &segments[depth..];
    let mut current = anchor;
    for segment in missing {
        current = store.add_group(current, segment.as_ref())?;
        tracing::debug!(
            "Created group '{}' under '{}'",
            segment.as_ref(),
            path::join(&store.parent_path(current))
        );
    }

    Ok(Ensured {
        group: current,
        created: missing.len(),
    })
}
