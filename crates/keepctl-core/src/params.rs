//! Caller parameters and their validation into typed requests.
//!
//! Each verb has a flat parameter structure deserialised straight from the
//! caller's key/value map. Unknown keys and wrongly typed values are rejected
//! by serde; [`EntryParams::validate`] and friends then check the rules that
//! span several fields, once, before any tree is loaded.

use serde::{Deserialize, Deserializer};
use std::path::PathBuf;

use crate::backend::Credentials;
use crate::error::{Result, VaultError};
use crate::mutation::{
    self, EntryChanges, GroupChanges, NewEntry, NewGroup, PasswordSpec, MAX_ICON_ID,
};
use crate::path;
use crate::search::{Criteria, MatchMode, Query};

/// Mutating verb requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Modify,
    Delete,
}

impl std::str::FromStr for Action {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "create" => Ok(Action::Create),
            "modify" => Ok(Action::Modify),
            "delete" => Ok(Action::Delete),
            other => Err(VaultError::validation(format!(
                "No action matched: '{other}'. Use one of create, modify, delete"
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Where the database lives and how to unlock it.
#[derive(Debug, Clone)]
pub struct Connection {
    pub database: PathBuf,
    pub credentials: Credentials,
}

impl Connection {
    fn new(database: PathBuf, password: Option<String>, keyfile: Option<PathBuf>) -> Result<Self> {
        Ok(Self {
            database,
            credentials: Credentials::new(password, keyfile)?,
        })
    }
}

/// A fully validated invocation.
#[derive(Debug)]
pub struct Invocation {
    pub connection: Connection,
    pub request: Request,
    /// Apply in memory only; never persist.
    pub check_mode: bool,
}

#[derive(Debug)]
pub enum Request {
    Entry(EntryRequest),
    Group(GroupRequest),
    Lookup(LookupRequest),
}

#[derive(Debug)]
pub struct EntryRequest {
    pub group_path: Vec<String>,
    pub op: EntryOp,
}

#[derive(Debug)]
pub enum EntryOp {
    Create(NewEntry),
    Modify { title: String, changes: EntryChanges },
    Delete { title: String },
}

#[derive(Debug)]
pub struct GroupRequest {
    /// Path of the group holding the target group.
    pub parent: Vec<String>,
    pub name: String,
    pub op: GroupOp,
}

#[derive(Debug)]
pub enum GroupOp {
    Create { group: NewGroup, create_path: bool },
    Modify(GroupChanges),
    Delete,
}

#[derive(Debug)]
pub struct LookupRequest {
    pub group_path: Vec<String>,
    pub query: Query,
}

fn check_icon(icon_id: Option<usize>) -> Result<Option<usize>> {
    match icon_id {
        Some(icon) if icon > MAX_ICON_ID => Err(VaultError::validation(format!(
            "'icon_id' must be between 0 and {MAX_ICON_ID}, got {icon}"
        ))),
        other => Ok(other),
    }
}

fn require_name(field: &str, value: String) -> Result<String> {
    if value.is_empty() {
        return Err(VaultError::validation(format!("'{field}' must not be empty")));
    }
    Ok(value)
}

/// Parameters of the `entry` verb.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntryParams {
    pub database: PathBuf,
    pub database_password: Option<String>,
    pub keyfile: Option<PathBuf>,
    pub action: Action,
    pub title: String,
    pub group_path: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub password_length: Option<usize>,
    pub url: Option<String>,
    pub notes: Option<String>,
    pub icon_id: Option<usize>,
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub check_mode: bool,
}

impl EntryParams {
    pub fn validate(self) -> Result<Invocation> {
        let password = PasswordSpec::from_options(self.password, self.password_length)?;
        let connection = Connection::new(self.database, self.database_password, self.keyfile)?;
        let title = require_name("title", self.title)?;
        let icon_id = check_icon(self.icon_id)?;

        let op = match self.action {
            Action::Create => EntryOp::Create(NewEntry {
                title,
                username: self.username,
                password,
                url: self.url,
                notes: self.notes,
                icon_id,
                tags: self.tags,
            }),
            Action::Modify => EntryOp::Modify {
                title,
                changes: EntryChanges {
                    username: self.username,
                    password,
                    url: self.url,
                    notes: self.notes,
                    icon_id,
                    tags: self.tags,
                },
            },
            Action::Delete => EntryOp::Delete { title },
        };

        Ok(Invocation {
            connection,
            request: Request::Entry(EntryRequest {
                group_path: path::normalize(self.group_path.as_deref().unwrap_or_default()),
                op,
            }),
            check_mode: self.check_mode,
        })
    }
}

/// Parameters of the `group` verb.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupParams {
    pub database: PathBuf,
    pub database_password: Option<String>,
    pub keyfile: Option<PathBuf>,
    pub action: Action,
    pub name: String,
    pub path: Option<String>,
    pub create_path: Option<bool>,
    pub new_name: Option<String>,
    pub notes: Option<String>,
    pub icon_id: Option<usize>,
    #[serde(default)]
    pub check_mode: bool,
}

impl GroupParams {
    pub fn validate(self) -> Result<Invocation> {
        match (self.action, &self.new_name, self.create_path) {
            (Action::Create | Action::Delete, Some(_), _) => {
                return Err(VaultError::validation(
                    "Action 'create' or 'delete' do not take 'new_name'",
                ))
            }
            (Action::Create, _, None) => {
                return Err(VaultError::validation(
                    "Action 'create' requires 'create_path' to specify whether a missing path should be created",
                ))
            }
            (Action::Modify | Action::Delete, _, Some(_)) => {
                return Err(VaultError::validation(
                    "Action 'modify' or 'delete' cannot take 'create_path'",
                ))
            }
            _ => {}
        }

        let connection = Connection::new(self.database, self.database_password, self.keyfile)?;
        mutation::check_group_name("name", &self.name)?;
        if let Some(new_name) = &self.new_name {
            mutation::check_group_name("new_name", new_name)?;
        }
        let name = self.name;
        let icon_id = check_icon(self.icon_id)?;

        let op = match self.action {
            Action::Create => GroupOp::Create {
                group: NewGroup {
                    name: name.clone(),
                    notes: self.notes,
                    icon_id,
                },
                create_path: self.create_path.unwrap_or_default(),
            },
            Action::Modify => GroupOp::Modify(GroupChanges {
                new_name: self.new_name,
                notes: self.notes,
                icon_id,
            }),
            Action::Delete => GroupOp::Delete,
        };

        Ok(Invocation {
            connection,
            request: Request::Group(GroupRequest {
                parent: path::normalize(self.path.as_deref().unwrap_or_default()),
                name,
                op,
            }),
            check_mode: self.check_mode,
        })
    }
}

fn default_recursive() -> bool {
    true
}

/// Parameters of the `lookup` verb.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LookupParams {
    pub database: PathBuf,
    pub database_password: Option<String>,
    pub keyfile: Option<PathBuf>,
    pub title: Option<String>,
    pub username: Option<String>,
    pub notes: Option<String>,
    pub url: Option<String>,
    pub tags: Option<Vec<String>>,
    pub group_path: Option<String>,
    #[serde(default)]
    pub regex: bool,
    #[serde(default = "default_recursive")]
    pub recursive: bool,
}

impl LookupParams {
    pub fn validate(self) -> Result<Invocation> {
        let connection = Connection::new(self.database, self.database_password, self.keyfile)?;
        let criteria = Criteria {
            title: self.title,
            username: self.username,
            notes: self.notes,
            url: self.url,
            tags: self.tags,
        };
        let mode = if self.regex {
            MatchMode::Regex
        } else {
            MatchMode::Exact
        };

        Ok(Invocation {
            connection,
            request: Request::Lookup(LookupRequest {
                group_path: path::normalize(self.group_path.as_deref().unwrap_or_default()),
                query: Query::new(criteria).recursive(self.recursive).mode(mode),
            }),
            check_mode: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(value: serde_json::Value) -> Result<Invocation> {
        serde_json::from_value::<EntryParams>(value)
            .map_err(|e| VaultError::Validation(e.to_string()))?
            .validate()
    }

    fn group(value: serde_json::Value) -> Result<Invocation> {
        serde_json::from_value::<GroupParams>(value)
            .map_err(|e| VaultError::Validation(e.to_string()))?
            .validate()
    }

    #[test]
    fn entry_create_is_typed() {
        let invocation = entry(json!({
            "database": "db.kdbx",
            "database_password": "pw",
            "action": "CREATE",
            "title": "svc1",
            "password_length": 12,
            "group_path": "/Infra//DB/",
        }))
        .unwrap();

        let Request::Entry(request) = invocation.request else {
            panic!("expected entry request");
        };
        assert_eq!(request.group_path, vec!["Infra", "DB"]);
        let EntryOp::Create(new) = request.op else {
            panic!("expected create");
        };
        assert_eq!(new.password, Some(PasswordSpec::Generate(12)));
    }

    #[test]
    fn password_and_length_conflict() {
        let err = entry(json!({
            "database": "db.kdbx",
            "database_password": "pw",
            "action": "modify",
            "title": "svc1",
            "password": "x",
            "password_length": 12,
        }))
        .unwrap_err();
        assert!(matches!(err, VaultError::Validation(ref m) if m.contains("password_length")));
    }

    #[test]
    fn credentials_are_required() {
        let err = entry(json!({
            "database": "db.kdbx",
            "action": "delete",
            "title": "svc1",
        }))
        .unwrap_err();
        assert!(matches!(err, VaultError::Validation(ref m) if m.contains("keyfile")));
    }

    #[test]
    fn unknown_keys_and_actions_are_rejected() {
        assert!(entry(json!({
            "database": "db.kdbx",
            "database_password": "pw",
            "action": "create",
            "title": "svc1",
            "colour": "red",
        }))
        .is_err());

        assert!(entry(json!({
            "database": "db.kdbx",
            "database_password": "pw",
            "action": "rename",
            "title": "svc1",
        }))
        .is_err());
    }

    #[test]
    fn icon_out_of_range() {
        let err = entry(json!({
            "database": "db.kdbx",
            "keyfile": "db.key",
            "action": "create",
            "title": "svc1",
            "icon_id": 69,
        }))
        .unwrap_err();
        assert!(matches!(err, VaultError::Validation(_)));
    }

    #[test]
    fn group_option_rules() {
        let base = |extra: serde_json::Value| {
            let mut value = json!({
                "database": "db.kdbx",
                "database_password": "pw",
                "name": "Creds",
            });
            value
                .as_object_mut()
                .unwrap()
                .extend(extra.as_object().unwrap().clone());
            group(value)
        };

        assert!(base(json!({ "action": "create" })).is_err());
        assert!(base(json!({ "action": "create", "create_path": true, "new_name": "x" })).is_err());
        assert!(base(json!({ "action": "modify", "create_path": false })).is_err());
        assert!(base(json!({ "action": "delete", "new_name": "x" })).is_err());

        let ok = base(json!({ "action": "create", "create_path": true, "path": "Infra/DB" }))
            .unwrap();
        let Request::Group(request) = ok.request else {
            panic!("expected group request");
        };
        assert_eq!(request.parent, vec!["Infra", "DB"]);
        assert!(matches!(request.op, GroupOp::Create { create_path: true, .. }));
    }

    #[test]
    fn group_names_are_single_segments() {
        let with = |extra: serde_json::Value| {
            let mut value = json!({
                "database": "db.kdbx",
                "database_password": "pw",
            });
            value
                .as_object_mut()
                .unwrap()
                .extend(extra.as_object().unwrap().clone());
            group(value)
        };

        let err = with(json!({ "action": "create", "create_path": false, "name": "a/b" }))
            .unwrap_err();
        assert!(matches!(err, VaultError::Validation(ref m) if m.contains("'name'")));

        let err = with(json!({ "action": "modify", "name": "Infra", "new_name": "Infra/DB" }))
            .unwrap_err();
        assert!(matches!(err, VaultError::Validation(ref m) if m.contains("'new_name'")));

        assert!(with(json!({ "action": "modify", "name": "Infra", "new_name": "" })).is_err());
        assert!(with(json!({ "action": "delete", "name": "" })).is_err());
    }

    #[test]
    fn lookup_defaults_and_bool_typing() {
        let invocation = serde_json::from_value::<LookupParams>(json!({
            "database": "db.kdbx",
            "database_password": "pw",
            "title": "^My",
            "regex": true,
        }))
        .unwrap()
        .validate()
        .unwrap();

        let Request::Lookup(request) = invocation.request else {
            panic!("expected lookup request");
        };
        assert!(request.query.recursive);
        assert_eq!(request.query.mode, MatchMode::Regex);
        assert!(request.group_path.is_empty());

        let non_bool = serde_json::from_value::<LookupParams>(json!({
            "database": "db.kdbx",
            "database_password": "pw",
            "recursive": "yes",
        }));
        assert!(non_bool.is_err());
    }
}
