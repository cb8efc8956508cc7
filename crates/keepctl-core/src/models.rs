//! In-memory tree of groups and entries.
//!
//! The tree lives in an arena owned by [`Store`]. Nodes refer to their parent
//! and children by [`NodeId`], so the parent link is a plain index rather than
//! an owning pointer. Removed nodes leave an empty slot behind; their ids are
//! never handed out again.

use chrono::NaiveDateTime;
use std::fmt;
use uuid::Uuid;
use zeroize::Zeroize;

use crate::error::{Result, VaultError};

/// Handle to a node inside a [`Store`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// A group (folder) or an entry.
#[derive(Debug, Clone)]
pub struct Node {
    pub uuid: Uuid,
    /// Group name, or entry title.
    pub name: String,
    pub icon_id: Option<usize>,
    pub notes: Option<String>,
    parent: Option<NodeId>,
    pub kind: NodeKind,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Group(GroupData),
    Entry(EntryData),
}

#[derive(Debug, Clone, Default)]
pub struct GroupData {
    children: Vec<NodeId>,
}

/// Credential fields of an entry.
#[derive(Clone, Default)]
pub struct EntryData {
    pub username: String,
    pub password: String,
    pub url: String,
    /// Treated as a set; order is kept as stored.
    pub tags: Vec<String>,
    /// Oldest snapshot first.
    pub history: Vec<EntrySnapshot>,
    pub last_modified: Option<NaiveDateTime>,
}

/// A frozen copy of an entry taken before it was modified.
#[derive(Clone, Default)]
pub struct EntrySnapshot {
    pub title: String,
    pub username: String,
    pub password: String,
    pub url: String,
    pub notes: Option<String>,
    pub icon_id: Option<usize>,
    pub tags: Vec<String>,
    pub last_modified: Option<NaiveDateTime>,
}

impl fmt::Debug for EntryData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryData")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("url", &self.url)
            .field("tags", &self.tags)
            .field("history", &self.history.len())
            .field("last_modified", &self.last_modified)
            .finish()
    }
}

impl fmt::Debug for EntrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntrySnapshot")
            .field("title", &self.title)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("last_modified", &self.last_modified)
            .finish_non_exhaustive()
    }
}

impl EntryData {
    /// Whether every tag in `wanted` is present on this entry.
    pub fn has_tags(&self, wanted: &[String]) -> bool {
        wanted.iter().all(|tag| self.tags.contains(tag))
    }

    /// Replace the tag set, dropping duplicates but keeping first-seen order.
    pub fn set_tags(&mut self, tags: impl IntoIterator<Item = String>) {
        self.tags.clear();
        for tag in tags {
            if !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
    }
}

impl Zeroize for EntrySnapshot {
    fn zeroize(&mut self) {
        self.username.zeroize();
        self.password.zeroize();
        self.url.zeroize();
        if let Some(notes) = self.notes.as_mut() {
            notes.zeroize();
        }
    }
}

impl Zeroize for EntryData {
    fn zeroize(&mut self) {
        self.username.zeroize();
        self.password.zeroize();
        self.url.zeroize();
        for snapshot in &mut self.history {
            snapshot.zeroize();
        }
    }
}

impl Node {
    /// A detached group, ready for [`Store::attach`].
    pub fn group(uuid: Uuid, name: &str) -> Self {
        Self {
            uuid,
            name: name.to_string(),
            icon_id: None,
            notes: None,
            parent: None,
            kind: NodeKind::Group(GroupData::default()),
        }
    }

    /// A detached entry, ready for [`Store::attach`].
    pub fn entry(uuid: Uuid, title: &str, data: EntryData) -> Self {
        Self {
            uuid,
            name: title.to_string(),
            icon_id: None,
            notes: None,
            parent: None,
            kind: NodeKind::Entry(data),
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, NodeKind::Group(_))
    }

    pub fn as_entry(&self) -> Option<&EntryData> {
        match &self.kind {
            NodeKind::Entry(e) => Some(e),
            NodeKind::Group(_) => None,
        }
    }

    pub fn as_entry_mut(&mut self) -> Option<&mut EntryData> {
        match &mut self.kind {
            NodeKind::Entry(e) => Some(e),
            NodeKind::Group(_) => None,
        }
    }

    /// Take a history snapshot of this entry's current state.
    pub fn snapshot(&self) -> Option<EntrySnapshot> {
        let entry = self.as_entry()?;
        Some(EntrySnapshot {
            title: self.name.clone(),
            username: entry.username.clone(),
            password: entry.password.clone(),
            url: entry.url.clone(),
            notes: self.notes.clone(),
            icon_id: self.icon_id,
            tags: entry.tags.clone(),
            last_modified: entry.last_modified,
        })
    }
}

/// The whole decrypted tree for one invocation.
///
/// Secret fields are wiped when the store is dropped.
#[derive(Debug, Clone)]
pub struct Store {
    nodes: Vec<Option<Node>>,
    root: NodeId,
}

impl Store {
    /// Create a store holding only a root group.
    pub fn new(root_name: &str) -> Self {
        Self::with_root(Uuid::new_v4(), root_name)
    }

    /// Create a store whose root carries a known UUID.
    pub fn with_root(uuid: Uuid, root_name: &str) -> Self {
        Self {
            nodes: vec![Some(Node::group(uuid, root_name))],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Children of a group in stored order. Entries and dead ids have none.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.node(id).map(|n| &n.kind) {
            Some(NodeKind::Group(g)) => &g.children,
            _ => &[],
        }
    }

    /// Ancestor names from (excluding) the root down to and including `id`.
    pub fn path(&self, id: NodeId) -> Vec<String> {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(cur) = current {
            let Some(node) = self.node(cur) else { break };
            if cur != self.root {
                segments.push(node.name.clone());
            }
            current = node.parent;
        }
        segments.reverse();
        segments
    }

    /// Path of the group holding `id`; empty for the root and its children.
    pub fn parent_path(&self, id: NodeId) -> Vec<String> {
        self.node(id)
            .and_then(Node::parent)
            .map(|p| self.path(p))
            .unwrap_or_default()
    }

    pub fn add_group(&mut self, parent: NodeId, name: &str) -> Result<NodeId> {
        self.attach(parent, Node::group(Uuid::new_v4(), name))
    }

    pub fn add_entry(&mut self, parent: NodeId, title: &str, entry: EntryData) -> Result<NodeId> {
        self.attach(parent, Node::entry(Uuid::new_v4(), title, entry))
    }

    /// Append a fully formed node as the last child of `parent`.
    pub fn attach(&mut self, parent: NodeId, mut node: Node) -> Result<NodeId> {
        if !self.node(parent).is_some_and(Node::is_group) {
            return Err(VaultError::StaleNode(parent));
        }

        let id = NodeId(self.nodes.len());
        node.parent = Some(parent);
        self.nodes.push(Some(node));

        if let Some(NodeKind::Group(g)) = self.node_mut(parent).map(|n| &mut n.kind) {
            g.children.push(id);
        }
        Ok(id)
    }

    /// Remove a node and, for groups, everything beneath it.
    pub fn remove(&mut self, id: NodeId) -> Result<()> {
        if id == self.root {
            return Err(VaultError::validation("The root group cannot be removed"));
        }
        let parent = self
            .node(id)
            .and_then(Node::parent)
            .ok_or(VaultError::StaleNode(id))?;

        if let Some(NodeKind::Group(g)) = self.node_mut(parent).map(|n| &mut n.kind) {
            g.children.retain(|child| *child != id);
        }

        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(mut node) = self.nodes.get_mut(next.0).and_then(Option::take) {
                if let NodeKind::Group(g) = &node.kind {
                    pending.extend(g.children.iter().copied());
                }
                wipe_node(&mut node);
            }
        }
        Ok(())
    }

    /// Every live entry in depth-first order, children visited as stored.
    pub fn descendant_entries(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_entries(id, &mut out);
        out
    }

    fn collect_entries(&self, group: NodeId, out: &mut Vec<NodeId>) {
        for &child in self.children(group) {
            match self.node(child).map(|n| &n.kind) {
                Some(NodeKind::Entry(_)) => out.push(child),
                Some(NodeKind::Group(_)) => self.collect_entries(child, out),
                None => {}
            }
        }
    }

    /// Entries that sit directly under `id`.
    pub fn direct_entries(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|child| self.node(*child).is_some_and(|n| !n.is_group()))
            .collect()
    }

    /// Number of live entries in the whole tree.
    pub fn entry_count(&self) -> usize {
        self.nodes
            .iter()
            .flatten()
            .filter(|n| !n.is_group())
            .count()
    }

    /// Overwrite every secret-bearing field in place.
    pub fn wipe(&mut self) {
        for node in self.nodes.iter_mut().flatten() {
            wipe_node(node);
        }
    }
}

fn wipe_node(node: &mut Node) {
    if let Some(notes) = node.notes.as_mut() {
        notes.zeroize();
    }
    if let NodeKind::Entry(entry) = &mut node.kind {
        entry.zeroize();
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        self.wipe();
    }
}
