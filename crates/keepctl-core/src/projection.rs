//! Flat output records for groups and entries.

use serde::Serialize;
use std::fmt;
use zeroize::Zeroize;

use crate::models::{NodeId, NodeKind, Store};
use crate::path;

/// An entry as reported to the caller.
#[derive(Clone, Serialize)]
pub struct EntryRecord {
    pub title: String,
    pub username: String,
    pub password: String,
    pub url: String,
    pub notes: Option<String>,
    pub icon_id: Option<usize>,
    pub tags: Vec<String>,
    /// Path of the group holding the entry, e.g. `"Infra/DB"`; `""` for the root.
    pub group_path: String,
    pub changed: bool,
}

impl fmt::Debug for EntryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryRecord")
            .field("title", &self.title)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("group_path", &self.group_path)
            .field("changed", &self.changed)
            .finish_non_exhaustive()
    }
}

impl Drop for EntryRecord {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}

/// A group as reported to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct GroupRecord {
    pub name: String,
    pub notes: Option<String>,
    pub icon_id: Option<usize>,
    /// Path of the parent group.
    pub group_path: String,
    /// Path of the group itself.
    pub full_path: String,
    pub changed: bool,
}

/// What an invocation hands back on success.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Entry(EntryRecord),
    Group(GroupRecord),
    Entries { entries: Vec<EntryRecord> },
    Deleted { changed: bool },
}

impl Outcome {
    pub fn changed(&self) -> bool {
        match self {
            Outcome::Entry(record) => record.changed,
            Outcome::Group(record) => record.changed,
            Outcome::Entries { .. } => false,
            Outcome::Deleted { changed } => *changed,
        }
    }
}

/// Project an entry node. Returns `None` for groups and dead ids.
pub fn entry_record(store: &Store, id: NodeId, changed: bool) -> Option<EntryRecord> {
    let node = store.node(id)?;
    let NodeKind::Entry(entry) = &node.kind else {
        return None;
    };

    Some(EntryRecord {
        title: node.name.clone(),
        username: entry.username.clone(),
        password: entry.password.clone(),
        url: entry.url.clone(),
        notes: node.notes.clone(),
        icon_id: node.icon_id,
        tags: entry.tags.clone(),
        group_path: path::join(&store.parent_path(id)),
        changed,
    })
}

/// Project a group node. Returns `None` for entries and dead ids.
pub fn group_record(store: &Store, id: NodeId, changed: bool) -> Option<GroupRecord> {
    let node = store.node(id)?;
    if !node.is_group() {
        return None;
    }

    Some(GroupRecord {
        name: node.name.clone(),
        notes: node.notes.clone(),
        icon_id: node.icon_id,
        group_path: path::join(&store.parent_path(id)),
        full_path: path::join(&store.path(id)),
        changed,
    })
}
