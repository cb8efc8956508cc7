//! Core models and database handling for keepctl.
//!
//! This crate provides the group/entry tree, path-based group navigation,
//! entry search, mutations with history, and the KeePass backend used by the
//! command line frontend.

pub mod backend;
pub mod database;
pub mod error;
pub mod models;
pub mod mutation;
pub mod navigator;
pub mod params;
pub mod password;
pub mod path;
pub mod projection;
pub mod search;
pub mod session;

pub use backend::{Credentials, MemoryBackend, VaultBackend};
pub use database::KeepassDatabase;
pub use error::{ErrorKind, Failure, Result, VaultError};
pub use models::{EntryData, EntrySnapshot, Node, NodeId, NodeKind, Store};
pub use mutation::Defaults;
pub use params::{EntryParams, GroupParams, Invocation, LookupParams, Request};
pub use projection::{EntryRecord, GroupRecord, Outcome};
pub use search::{Criteria, MatchMode, Query};
pub use session::Session;
