//! Error types for vault operations.

use serde::Serialize;
use std::error::Error as _;
use thiserror::Error;

use crate::models::NodeId;

/// Every failure an invocation can end with.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("{0}")]
    Validation(String),

    #[error("Could not open the database, as the credentials are wrong.")]
    Credentials(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Could not open the database, as the checksum of the database is wrong. This could be caused by a corrupt database.")]
    Checksum(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Could not open the database or keyfile: {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not read the database: {0}")]
    Corrupt(String),

    #[error("Path does not exist: '{0}'. Set 'create_path' to create it")]
    PathNotFound(String),

    #[error("No group found at '{0}'")]
    GroupNotFound(String),

    #[error("No entry titled '{title}' found in '{group_path}'")]
    EntryNotFound { title: String, group_path: String },

    #[error("More than one {what} named '{name}' found in '{group_path}' ({count} matches)")]
    Ambiguous {
        what: &'static str,
        name: String,
        group_path: String,
        count: usize,
    },

    #[error("Invalid pattern for '{field}'")]
    InvalidPattern {
        field: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("Could not save the database: {path}")]
    Save {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Node {0:?} is not a live group")]
    StaleNode(NodeId),
}

/// The failure kinds a caller can tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    #[serde(rename = "ValidationError")]
    Validation,
    #[serde(rename = "BackendError")]
    Backend,
    #[serde(rename = "NotFoundError")]
    NotFound,
}

impl VaultError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VaultError::Validation(_) | VaultError::InvalidPattern { .. } => ErrorKind::Validation,
            VaultError::Credentials(_)
            | VaultError::Checksum(_)
            | VaultError::Io { .. }
            | VaultError::Corrupt(_)
            | VaultError::Save { .. }
            | VaultError::StaleNode(_) => ErrorKind::Backend,
            VaultError::PathNotFound(_)
            | VaultError::GroupNotFound(_)
            | VaultError::EntryNotFound { .. }
            | VaultError::Ambiguous { .. } => ErrorKind::NotFound,
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        VaultError::Validation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, VaultError>;

/// Structured failure handed back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub failed: bool,
    pub msg: String,
    pub kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
}

impl From<&VaultError> for Failure {
    fn from(err: &VaultError) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }

        Self {
            failed: true,
            msg: err.to_string(),
            kind: err.kind(),
            exception: (!causes.is_empty()).then(|| causes.join("\ncaused by: ")),
        }
    }
}
