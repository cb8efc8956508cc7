//! Storage backends that load and persist a [`Store`].

use std::fmt;
use std::path::PathBuf;
use zeroize::Zeroizing;

use crate::error::{Result, VaultError};
use crate::models::Store;

/// Something that can materialise a [`Store`] and write it back.
pub trait VaultBackend {
    /// Load and decrypt the whole tree.
    fn open(&mut self) -> Result<Store>;

    /// Durably write the tree.
    fn save(&mut self, store: &Store) -> Result<()>;
}

impl<B: VaultBackend + ?Sized> VaultBackend for &mut B {
    fn open(&mut self) -> Result<Store> {
        (**self).open()
    }

    fn save(&mut self, store: &Store) -> Result<()> {
        (**self).save(store)
    }
}

/// Master password and/or keyfile for a database.
#[derive(Clone, Default)]
pub struct Credentials {
    pub password: Option<Zeroizing<String>>,
    pub keyfile: Option<PathBuf>,
}

impl Credentials {
    /// At least one of password or keyfile is required. An empty password
    /// counts as none.
    pub fn new(password: Option<String>, keyfile: Option<PathBuf>) -> Result<Self> {
        let password = password.filter(|p| !p.is_empty());
        if password.is_none() && keyfile.is_none() {
            return Err(VaultError::validation(
                "Either 'database_password' or 'keyfile' (or both) are required.",
            ));
        }
        Ok(Self {
            password: password.map(Zeroizing::new),
            keyfile,
        })
    }

    pub fn password(password: &str) -> Self {
        Self {
            password: Some(Zeroizing::new(password.to_string())),
            keyfile: None,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("keyfile", &self.keyfile)
            .finish()
    }
}

/// Keeps the tree in memory. Useful for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    store: Option<Store>,
    saves: usize,
    fail_saves: bool,
}

impl MemoryBackend {
    pub fn new(store: Store) -> Self {
        Self {
            store: Some(store),
            ..Self::default()
        }
    }

    /// Make every following save fail.
    pub fn failing_saves(mut self) -> Self {
        self.fail_saves = true;
        self
    }

    /// How many times the tree has been persisted.
    pub fn saves(&self) -> usize {
        self.saves
    }

    /// The last persisted tree.
    pub fn store(&self) -> Option<&Store> {
        self.store.as_ref()
    }
}

impl VaultBackend for MemoryBackend {
    fn open(&mut self) -> Result<Store> {
        self.store
            .clone()
            .ok_or_else(|| VaultError::Corrupt("memory backend holds no database".into()))
    }

    fn save(&mut self, store: &Store) -> Result<()> {
        if self.fail_saves {
            return Err(VaultError::Save {
                path: "<memory>".into(),
                source: "saving is disabled".into(),
            });
        }
        self.store = Some(store.clone());
        self.saves += 1;
        Ok(())
    }
}
