//! One invocation against one database: load, act once, persist, discard.

use crate::backend::VaultBackend;
use crate::database::KeepassDatabase;
use crate::error::{Result, VaultError};
use crate::models::{NodeId, Store};
use crate::mutation::{self, Defaults};
use crate::navigator;
use crate::params::{EntryOp, EntryRequest, GroupOp, GroupRequest, Invocation, LookupRequest, Request};
use crate::path;
use crate::projection::{self, Outcome};
use crate::search;

/// An opened store bound to the backend it came from.
///
/// Every operation consumes the session, so a session performs exactly one
/// logical operation and the decrypted store is dropped (and wiped) as soon
/// as it returns, whether it succeeded or not.
pub struct Session<B: VaultBackend> {
    backend: B,
    store: Store,
    defaults: Defaults,
    check_mode: bool,
}

impl<B: VaultBackend> Session<B> {
    pub fn open(mut backend: B) -> Result<Self> {
        let store = backend.open()?;
        Ok(Self {
            backend,
            store,
            defaults: Defaults::default(),
            check_mode: false,
        })
    }

    pub fn with_defaults(mut self, defaults: Defaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Apply mutations in memory only.
    pub fn check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Direct access for batch edits; finish with [`Session::save`].
    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    /// Persist whatever was done through [`Session::store_mut`].
    pub fn save(mut self) -> Result<()> {
        if self.check_mode {
            return Ok(());
        }
        self.backend.save(&self.store)
    }

    pub fn run(self, request: Request) -> Result<Outcome> {
        match request {
            Request::Entry(req) => self.entry(req),
            Request::Group(req) => self.group(req),
            Request::Lookup(req) => self.lookup(&req),
        }
    }

    fn scope(&self, segments: &[String]) -> Result<NodeId> {
        navigator::resolve(&self.store, segments)
            .ok_or_else(|| VaultError::GroupNotFound(path::join(segments)))
    }

    /// Find entries. Never writes.
    pub fn lookup(self, request: &LookupRequest) -> Result<Outcome> {
        let scope = self.scope(&request.group_path)?;
        let found = search::search(&self.store, scope, &request.query)?;
        tracing::info!(
            "Lookup in '{}' returned {} entries",
            path::join(&request.group_path),
            found.len()
        );

        let entries = found
            .into_iter()
            .filter_map(|id| projection::entry_record(&self.store, id, false))
            .collect();
        Ok(Outcome::Entries { entries })
    }

    pub fn entry(mut self, request: EntryRequest) -> Result<Outcome> {
        let scope = self.scope(&request.group_path)?;

        let outcome = match request.op {
            EntryOp::Create(new) => {
                let applied = mutation::create_entry(&mut self.store, scope, new, &self.defaults)?;
                self.project_entry(applied.node, applied.changed)?
            }
            EntryOp::Modify { title, changes } => {
                let applied = mutation::modify_entry(&mut self.store, scope, &title, changes)?;
                self.project_entry(applied.node, applied.changed)?
            }
            EntryOp::Delete { title } => {
                mutation::delete_entry(&mut self.store, scope, &title)?;
                Outcome::Deleted { changed: true }
            }
        };

        self.commit(&outcome)?;
        Ok(outcome)
    }

    pub fn group(mut self, request: GroupRequest) -> Result<Outcome> {
        let GroupRequest { parent, name, op } = request;

        let outcome = match op {
            GroupOp::Create { group, create_path } => {
                let applied = mutation::create_group(
                    &mut self.store,
                    &parent,
                    group,
                    create_path,
                    &self.defaults,
                )?;
                self.project_group(applied.node, applied.changed)?
            }
            GroupOp::Modify(changes) => {
                let applied = mutation::modify_group(&mut self.store, &parent, &name, changes)?;
                self.project_group(applied.node, applied.changed)?
            }
            GroupOp::Delete => {
                mutation::delete_group(&mut self.store, &parent, &name)?;
                Outcome::Deleted { changed: true }
            }
        };

        self.commit(&outcome)?;
        Ok(outcome)
    }

    fn project_entry(&self, id: NodeId, changed: bool) -> Result<Outcome> {
        projection::entry_record(&self.store, id, changed)
            .map(Outcome::Entry)
            .ok_or(VaultError::StaleNode(id))
    }

    fn project_group(&self, id: NodeId, changed: bool) -> Result<Outcome> {
        projection::group_record(&self.store, id, changed)
            .map(Outcome::Group)
            .ok_or(VaultError::StaleNode(id))
    }

    /// The single durable write of an invocation.
    fn commit(&mut self, outcome: &Outcome) -> Result<()> {
        if !outcome.changed() {
            return Ok(());
        }
        if self.check_mode {
            tracing::info!("Check mode: changes not saved");
            return Ok(());
        }
        self.backend.save(&self.store)
    }
}

/// Run a validated invocation against the KeePass file it names.
pub fn run(invocation: Invocation, defaults: Defaults) -> Result<Outcome> {
    let Invocation {
        connection,
        request,
        check_mode,
    } = invocation;

    let backend = KeepassDatabase::new(connection.database, connection.credentials);
    Session::open(backend)?
        .with_defaults(defaults)
        .check_mode(check_mode)
        .run(request)
}
