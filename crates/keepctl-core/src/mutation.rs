//! Create, modify and delete operations on groups and entries.
//!
//! Everything here works on the in-memory [`Store`] only. Persisting is the
//! caller's job, once per invocation.

use chrono::Utc;

use crate::error::{Result, VaultError};
use crate::models::{EntryData, Node, NodeId, NodeKind, Store};
use crate::navigator;
use crate::password;
use crate::path;
use crate::search;

/// Icon given to new entries that do not ask for one (a key).
pub const DEFAULT_ENTRY_ICON: usize = 58;
/// Icon given to new groups that do not ask for one (a folder).
pub const DEFAULT_GROUP_ICON: usize = 48;
/// Highest standard KeePass icon id.
pub const MAX_ICON_ID: usize = 68;

/// Values applied to newly created nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defaults {
    pub password_length: usize,
    pub entry_icon: usize,
    pub group_icon: usize,
    pub notes: Option<String>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            password_length: password::DEFAULT_LENGTH,
            entry_icon: DEFAULT_ENTRY_ICON,
            group_icon: DEFAULT_GROUP_ICON,
            notes: None,
        }
    }
}

/// Where an entry's password comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum PasswordSpec {
    Explicit(String),
    Generate(usize),
}

impl std::fmt::Debug for PasswordSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PasswordSpec::Explicit(_) => f.write_str("Explicit(<redacted>)"),
            PasswordSpec::Generate(len) => f.debug_tuple("Generate").field(len).finish(),
        }
    }
}

impl PasswordSpec {
    /// Combine the two caller options. Giving both is ambiguous.
    pub fn from_options(password: Option<String>, length: Option<usize>) -> Result<Option<Self>> {
        match (password, length) {
            (Some(_), Some(_)) => Err(VaultError::validation(
                "'password' and 'password_length' are defined. Only one is allowed",
            )),
            (Some(password), None) => Ok(Some(PasswordSpec::Explicit(password))),
            (None, Some(length)) => Ok(Some(PasswordSpec::Generate(length))),
            (None, None) => Ok(None),
        }
    }

    fn resolve(self) -> String {
        match self {
            PasswordSpec::Explicit(password) => password,
            PasswordSpec::Generate(length) => password::generate(length),
        }
    }
}

/// Attributes for a new entry.
#[derive(Debug, Clone, Default)]
pub struct NewEntry {
    pub title: String,
    pub username: Option<String>,
    pub password: Option<PasswordSpec>,
    pub url: Option<String>,
    pub notes: Option<String>,
    pub icon_id: Option<usize>,
    pub tags: Option<Vec<String>>,
}

/// Fields to overwrite on an existing entry. Unset fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct EntryChanges {
    pub username: Option<String>,
    pub password: Option<PasswordSpec>,
    pub url: Option<String>,
    pub notes: Option<String>,
    pub icon_id: Option<usize>,
    pub tags: Option<Vec<String>>,
}

/// Attributes for a new group.
#[derive(Debug, Clone, Default)]
pub struct NewGroup {
    pub name: String,
    pub notes: Option<String>,
    pub icon_id: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct GroupChanges {
    pub new_name: Option<String>,
    pub notes: Option<String>,
    pub icon_id: Option<usize>,
}

/// The node a mutation ended on and whether the tree changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    pub node: NodeId,
    pub changed: bool,
}

/// Create an entry under `scope` unless one with the same title is already there.
pub fn create_entry(
    store: &mut Store,
    scope: NodeId,
    new: NewEntry,
    defaults: &Defaults,
) -> Result<Applied> {
    if let Some(&existing) = search::entries_titled(store, scope, &new.title)?.first() {
        tracing::info!(
            "Entry '{}' already exists in '{}'",
            new.title,
            path::join(&store.path(scope))
        );
        return Ok(Applied {
            node: existing,
            changed: false,
        });
    }

    let password = new
        .password
        .unwrap_or(PasswordSpec::Generate(defaults.password_length))
        .resolve();

    let mut data = EntryData {
        username: new.username.unwrap_or_default(),
        password,
        url: new.url.unwrap_or_default(),
        last_modified: Some(Utc::now().naive_utc()),
        ..EntryData::default()
    };
    data.set_tags(new.tags.unwrap_or_default());

    let id = store.add_entry(scope, &new.title, data)?;
    if let Some(node) = store.node_mut(id) {
        node.icon_id = Some(new.icon_id.unwrap_or(defaults.entry_icon));
        node.notes = new.notes.or_else(|| defaults.notes.clone());
    }

    tracing::info!(
        "Created entry '{}' in '{}'",
        new.title,
        path::join(&store.path(scope))
    );
    Ok(Applied {
        node: id,
        changed: true,
    })
}

/// The single entry titled `title` directly under `scope`.
pub fn find_single_entry(store: &Store, scope: NodeId, title: &str) -> Result<NodeId> {
    let matches = search::entries_titled(store, scope, title)?;
    match matches.as_slice() {
        [only] => Ok(*only),
        [] => Err(VaultError::EntryNotFound {
            title: title.to_string(),
            group_path: path::join(&store.path(scope)),
        }),
        many => Err(VaultError::Ambiguous {
            what: "entry",
            name: title.to_string(),
            group_path: path::join(&store.path(scope)),
            count: many.len(),
        }),
    }
}

/// Snapshot the entry into its history, touch it, then apply `changes`.
pub fn modify_entry(
    store: &mut Store,
    scope: NodeId,
    title: &str,
    changes: EntryChanges,
) -> Result<Applied> {
    let id = find_single_entry(store, scope, title)?;
    let node = store.node_mut(id).ok_or(VaultError::StaleNode(id))?;
    let snapshot = node.snapshot().ok_or(VaultError::StaleNode(id))?;

    if let Some(icon_id) = changes.icon_id {
        node.icon_id = Some(icon_id);
    }
    if let Some(notes) = changes.notes {
        node.notes = Some(notes);
    }

    let NodeKind::Entry(entry) = &mut node.kind else {
        return Err(VaultError::StaleNode(id));
    };
    entry.history.push(snapshot);
    entry.last_modified = Some(Utc::now().naive_utc());

    if let Some(spec) = changes.password {
        entry.password = spec.resolve();
    }
    if let Some(username) = changes.username {
        entry.username = username;
    }
    if let Some(url) = changes.url {
        entry.url = url;
    }
    if let Some(tags) = changes.tags {
        entry.set_tags(tags);
    }
    let snapshots = entry.history.len();

    tracing::info!(
        "Modified entry '{}' in '{}' ({} history snapshots)",
        title,
        path::join(&store.path(scope)),
        snapshots
    );
    Ok(Applied {
        node: id,
        changed: true,
    })
}

pub fn delete_entry(store: &mut Store, scope: NodeId, title: &str) -> Result<()> {
    let id = find_single_entry(store, scope, title)?;
    store.remove(id)?;
    tracing::info!(
        "Deleted entry '{}' from '{}'",
        title,
        path::join(&store.path(scope))
    );
    Ok(())
}

/// Group names become path segments, so they must be non-empty and free of `/`.
pub fn check_group_name(field: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(VaultError::validation(format!("'{field}' must not be empty")));
    }
    if name.contains('/') {
        return Err(VaultError::validation(format!(
            "'{field}' must not contain '/', got '{name}'"
        )));
    }
    Ok(())
}

/// Create group `name` under `parent`, optionally creating the parent path.
pub fn create_group<S: AsRef<str>>(
    store: &mut Store,
    parent: &[S],
    new: NewGroup,
    create_path: bool,
    defaults: &Defaults,
) -> Result<Applied> {
    check_group_name("name", &new.name)?;

    if let Some(parent_id) = navigator::resolve(store, parent) {
        if let Some(existing) = navigator::child_group(store, parent_id, &new.name) {
            return Ok(Applied {
                node: existing,
                changed: false,
            });
        }
    }

    let ensured = navigator::ensure(store, parent, create_path)?;
    let id = store.add_group(ensured.group, &new.name)?;
    if let Some(node) = store.node_mut(id) {
        node.icon_id = Some(new.icon_id.unwrap_or(defaults.group_icon));
        node.notes = new.notes.or_else(|| defaults.notes.clone());
    }

    tracing::info!(
        "Created group '{}' in '{}' ({} intermediate groups created)",
        new.name,
        path::join(parent),
        ensured.created
    );
    Ok(Applied {
        node: id,
        changed: true,
    })
}

/// The single group called `name` directly under the group at `parent`.
pub fn find_single_group<S: AsRef<str>>(store: &Store, parent: &[S], name: &str) -> Result<NodeId> {
    let mut full: Vec<&str> = parent.iter().map(AsRef::as_ref).collect();
    full.push(name);

    let parent_id = navigator::resolve(store, parent)
        .ok_or_else(|| VaultError::GroupNotFound(path::join(&full)))?;

    match navigator::child_groups(store, parent_id, name).as_slice() {
        [only] => Ok(*only),
        [] => Err(VaultError::GroupNotFound(path::join(&full))),
        many => Err(VaultError::Ambiguous {
            what: "group",
            name: name.to_string(),
            group_path: path::join(parent),
            count: many.len(),
        }),
    }
}

pub fn modify_group<S: AsRef<str>>(
    store: &mut Store,
    parent: &[S],
    name: &str,
    changes: GroupChanges,
) -> Result<Applied> {
    let id = find_single_group(store, parent, name)?;
    if let Some(new_name) = &changes.new_name {
        check_group_name("new_name", new_name)?;
        let parent_id = store
            .node(id)
            .and_then(Node::parent)
            .ok_or(VaultError::StaleNode(id))?;
        if navigator::child_groups(store, parent_id, new_name)
            .iter()
            .any(|other| *other != id)
        {
            return Err(VaultError::validation(format!(
                "A group named '{new_name}' already exists in '{}'",
                path::join(parent)
            )));
        }
    }

    let node: &mut Node = store.node_mut(id).ok_or(VaultError::StaleNode(id))?;

    if let Some(notes) = changes.notes {
        node.notes = Some(notes);
    }
    if let Some(icon_id) = changes.icon_id {
        node.icon_id = Some(icon_id);
    }
    if let Some(new_name) = changes.new_name {
        tracing::info!("Renaming group '{}' to '{}'", node.name, new_name);
        node.name = new_name;
    }

    Ok(Applied {
        node: id,
        changed: true,
    })
}

/// Delete a group together with everything beneath it.
pub fn delete_group<S: AsRef<str>>(store: &mut Store, parent: &[S], name: &str) -> Result<()> {
    let id = find_single_group(store, parent, name)?;
    let entries = store.descendant_entries(id).len();
    store.remove(id)?;
    tracing::info!(
        "Deleted group '{}' from '{}' with {} entries",
        name,
        path::join(parent),
        entries
    );
    Ok(())
}
