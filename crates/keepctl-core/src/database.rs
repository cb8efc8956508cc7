//! KeePass (KDBX) database backend.

use keepass::config::DatabaseConfig;
use keepass::db::{Entry as KpEntry, Group as KpGroup, History, Node as KpNode, Value};
use keepass::error::DatabaseOpenError;
use keepass::{Database, DatabaseKey};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::backend::{Credentials, VaultBackend};
use crate::error::{Result, VaultError};
use crate::models::{EntryData, EntrySnapshot, Node, NodeId, NodeKind, Store};

/// A KDBX file on disk together with the key that unlocks it.
///
/// The decrypted `keepass` database is kept after opening so that data the
/// [`Store`] does not model (custom fields, attachments, times, metadata)
/// survives a save.
pub struct KeepassDatabase {
    path: PathBuf,
    credentials: Credentials,
    container: Option<Database>,
}

impl KeepassDatabase {
    pub fn new(path: impl Into<PathBuf>, credentials: Credentials) -> Self {
        Self {
            path: path.into(),
            credentials,
            container: None,
        }
    }

    /// Write a fresh, empty database to `path`.
    pub fn create(path: impl Into<PathBuf>, credentials: Credentials) -> Result<Self> {
        let db = Database::new(DatabaseConfig::default());
        let store = Store::with_root(db.root.uuid, &db.root.name);
        let mut this = Self {
            path: path.into(),
            credentials,
            container: Some(db),
        };
        this.save(&store)?;
        tracing::info!("Created database {}", this.path.display());
        Ok(this)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn key(&self) -> Result<DatabaseKey> {
        let mut key = DatabaseKey::new();
        if let Some(password) = &self.credentials.password {
            key = key.with_password(password);
        }
        if let Some(keyfile) = &self.credentials.keyfile {
            let io_err = |source| VaultError::Io {
                path: keyfile.display().to_string(),
                source,
            };
            let mut file = std::fs::File::open(keyfile).map_err(io_err)?;
            key = key.with_keyfile(&mut file).map_err(io_err)?;
        }
        Ok(key)
    }

    fn open_error(&self, err: DatabaseOpenError) -> VaultError {
        match err {
            DatabaseOpenError::Io(source) => VaultError::Io {
                path: self.path.display().to_string(),
                source,
            },
            DatabaseOpenError::Key(e) => VaultError::Credentials(e.to_string().into()),
            DatabaseOpenError::DatabaseIntegrity(e) => VaultError::Checksum(e.to_string().into()),
            other => VaultError::Corrupt(other.to_string()),
        }
    }

    fn save_error(&self, source: Box<dyn std::error::Error + Send + Sync>) -> VaultError {
        VaultError::Save {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl VaultBackend for KeepassDatabase {
    fn open(&mut self) -> Result<Store> {
        let key = self.key()?;
        let mut file = std::fs::File::open(&self.path).map_err(|source| VaultError::Io {
            path: self.path.display().to_string(),
            source,
        })?;

        let db = Database::open(&mut file, key).map_err(|e| self.open_error(e))?;
        let store = import_database(&db);
        tracing::info!(
            "Opened database {} ({} entries)",
            self.path.display(),
            store.entry_count()
        );

        self.container = Some(db);
        Ok(store)
    }

    /// Rebuild the KeePass tree from `store` and replace the file atomically.
    fn save(&mut self, store: &Store) -> Result<()> {
        let key = self.key()?;
        let mut db = self
            .container
            .take()
            .unwrap_or_else(|| Database::new(DatabaseConfig::default()));

        let mut originals = Originals::default();
        let mut base_root = std::mem::replace(&mut db.root, KpGroup::new(""));
        originals.drain(&mut base_root);
        db.root = export_group(store, store.root(), base_root, &mut originals);

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let result = tempfile::NamedTempFile::new_in(&dir)
            .map_err(|e| self.save_error(Box::new(e)))
            .and_then(|mut tmp| {
                db.save(tmp.as_file_mut(), key)
                    .map_err(|e| self.save_error(e.to_string().into()))?;
                tmp.persist(&self.path)
                    .map_err(|e| self.save_error(Box::new(e.error)))?;
                Ok(())
            });

        self.container = Some(db);
        result?;
        tracing::info!("Saved database {}", self.path.display());
        Ok(())
    }
}

fn import_database(db: &Database) -> Store {
    let mut store = Store::with_root(db.root.uuid, &db.root.name);
    let root = store.root();
    if let Some(node) = store.node_mut(root) {
        node.icon_id = db.root.icon_id;
        node.notes = db.root.notes.clone();
    }
    import_children(&mut store, root, &db.root);
    store
}

fn import_children(store: &mut Store, parent: NodeId, group: &KpGroup) {
    for child in &group.children {
        let node = match child {
            KpNode::Group(g) => {
                let mut node = Node::group(g.uuid, &g.name);
                node.icon_id = g.icon_id;
                node.notes = g.notes.clone();
                node
            }
            KpNode::Entry(e) => import_entry(e),
        };

        match store.attach(parent, node) {
            Ok(id) => {
                if let KpNode::Group(g) = child {
                    import_children(store, id, g);
                }
            }
            Err(e) => tracing::warn!("Skipping node under unreadable parent: {}", e),
        }
    }
}

fn import_entry(e: &KpEntry) -> Node {
    let history: Vec<EntrySnapshot> = e
        .history
        .as_ref()
        .map(|h| {
            // keepass keeps the newest snapshot first
            h.get_entries().iter().rev().map(import_snapshot).collect()
        })
        .unwrap_or_default();

    let data = EntryData {
        username: e.get_username().unwrap_or_default().to_string(),
        password: e.get_password().unwrap_or_default().to_string(),
        url: e.get_url().unwrap_or_default().to_string(),
        tags: e.tags.clone(),
        history,
        last_modified: e.times.get_last_modification().copied(),
    };

    let mut node = Node::entry(e.uuid, e.get_title().unwrap_or_default(), data);
    node.icon_id = e.icon_id;
    node.notes = e.get("Notes").map(str::to_string);
    node
}

fn import_snapshot(e: &KpEntry) -> EntrySnapshot {
    EntrySnapshot {
        title: e.get_title().unwrap_or_default().to_string(),
        username: e.get_username().unwrap_or_default().to_string(),
        password: e.get_password().unwrap_or_default().to_string(),
        url: e.get_url().unwrap_or_default().to_string(),
        notes: e.get("Notes").map(str::to_string),
        icon_id: e.icon_id,
        tags: e.tags.clone(),
        last_modified: e.times.get_last_modification().copied(),
    }
}

/// Nodes from the previously loaded database, keyed by UUID.
#[derive(Default)]
struct Originals {
    groups: HashMap<Uuid, KpGroup>,
    entries: HashMap<Uuid, KpEntry>,
}

impl Originals {
    fn drain(&mut self, group: &mut KpGroup) {
        for child in std::mem::take(&mut group.children) {
            match child {
                KpNode::Group(mut g) => {
                    self.drain(&mut g);
                    self.groups.insert(g.uuid, g);
                }
                KpNode::Entry(e) => {
                    self.entries.insert(e.uuid, e);
                }
            }
        }
    }
}

fn export_group(store: &Store, id: NodeId, mut target: KpGroup, originals: &mut Originals) -> KpGroup {
    if let Some(node) = store.node(id) {
        target.uuid = node.uuid;
        target.name = node.name.clone();
        target.notes = node.notes.clone();
        target.icon_id = node.icon_id;
    }

    for &child in store.children(id) {
        let Some(node) = store.node(child) else {
            continue;
        };
        match &node.kind {
            NodeKind::Group(_) => {
                let base = originals
                    .groups
                    .remove(&node.uuid)
                    .unwrap_or_else(|| KpGroup::new(&node.name));
                let group = export_group(store, child, base, originals);
                target.children.push(KpNode::Group(group));
            }
            NodeKind::Entry(data) => {
                let base = originals
                    .entries
                    .remove(&node.uuid)
                    .unwrap_or_else(KpEntry::new);
                target
                    .children
                    .push(KpNode::Entry(export_entry(node, data, base)));
            }
        }
    }
    target
}

fn export_entry(node: &Node, data: &EntryData, mut target: KpEntry) -> KpEntry {
    let mut history = target.history.take().unwrap_or_else(History::default);
    let known = history.get_entries().len();

    // New snapshots are built on top of the entry as it was last stored.
    let template = target.clone();
    for snapshot in data.history.iter().skip(known) {
        history.add_entry(export_snapshot(snapshot, template.clone()));
    }

    target.uuid = node.uuid;
    set_fields(
        &mut target,
        &node.name,
        &data.username,
        &data.password,
        &data.url,
        node.notes.as_deref(),
    );
    target.icon_id = node.icon_id;
    target.tags = data.tags.clone();
    if let Some(modified) = data.last_modified {
        target.times.set_last_modification(modified);
    }
    if !history.get_entries().is_empty() {
        target.history = Some(history);
    }
    target
}

fn export_snapshot(snapshot: &EntrySnapshot, mut target: KpEntry) -> KpEntry {
    target.history = None;
    set_fields(
        &mut target,
        &snapshot.title,
        &snapshot.username,
        &snapshot.password,
        &snapshot.url,
        snapshot.notes.as_deref(),
    );
    target.icon_id = snapshot.icon_id;
    target.tags = snapshot.tags.clone();
    if let Some(modified) = snapshot.last_modified {
        target.times.set_last_modification(modified);
    }
    target
}

fn set_fields(
    target: &mut KpEntry,
    title: &str,
    username: &str,
    password: &str,
    url: &str,
    notes: Option<&str>,
) {
    target
        .fields
        .insert("Title".to_string(), Value::Unprotected(title.to_string()));
    target
        .fields
        .insert("UserName".to_string(), Value::Unprotected(username.to_string()));
    target.fields.insert(
        "Password".to_string(),
        Value::Protected(password.as_bytes().to_vec().into()),
    );
    target
        .fields
        .insert("URL".to_string(), Value::Unprotected(url.to_string()));
    match notes {
        Some(notes) => {
            target
                .fields
                .insert("Notes".to_string(), Value::Unprotected(notes.to_string()));
        }
        None => {
            target.fields.remove("Notes");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_then_import_keeps_tree_and_history() {
        let mut store = Store::new("Root");
        let group = store.add_group(store.root(), "Infra").unwrap();
        let mut data = EntryData {
            username: "admin".into(),
            password: "first".into(),
            url: "https://db.example".into(),
            ..EntryData::default()
        };
        data.set_tags(["prod".to_string()]);
        let id = store.add_entry(group, "postgres", data).unwrap();
        let node = store.node_mut(id).unwrap();
        node.notes = Some("primary".into());
        let snapshot = node.snapshot().unwrap();
        let entry = node.as_entry_mut().unwrap();
        entry.history.push(snapshot);
        entry.password = "second".into();

        let mut originals = Originals::default();
        let root = export_group(&store, store.root(), KpGroup::new("Root"), &mut originals);
        let mut db = Database::new(DatabaseConfig::default());
        db.root = root;

        let back = import_database(&db);
        let group = crate::navigator::resolve(&back, &["Infra"]).unwrap();
        let id = crate::search::entries_titled(&back, group, "postgres").unwrap()[0];
        let node = back.node(id).unwrap();
        let entry = node.as_entry().unwrap();

        assert_eq!(node.notes.as_deref(), Some("primary"));
        assert_eq!(entry.username, "admin");
        assert_eq!(entry.password, "second");
        assert_eq!(entry.tags, vec!["prod"]);
        assert_eq!(entry.history.len(), 1);
        assert_eq!(entry.history[0].password, "first");
    }
}
