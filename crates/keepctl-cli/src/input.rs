//! Assembly of the flat parameter map handed to the core.

use anyhow::{bail, Context, Result};
use keepctl_core::VaultError;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::io::Read;
use std::path::Path;

use crate::config::Config;

pub type Params = Map<String, Value>;

/// Parameters that are not strings. Only their `--set` values are read as JSON.
const TYPED_KEYS: &[&str] = &[
    "regex",
    "recursive",
    "check_mode",
    "create_path",
    "icon_id",
    "password_length",
    "tags",
];

/// Parameters whose values must never appear in a message.
const SECRET_KEYS: &[&str] = &["database_password", "password"];

/// Read a JSON object from `path`, or from stdin when `path` is `-`.
pub fn read_params_file(path: &Path) -> Result<Params> {
    let contents = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read parameters from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read parameter file: {}", path.display()))?
    };

    match serde_json::from_str::<Value>(&contents).context("Parameter file is not valid JSON")? {
        Value::Object(map) => Ok(map),
        other => bail!("Parameters must be a JSON object, got {}", type_name(&other)),
    }
}

/// Parse a `key=value` pair.
///
/// Values of bool, number and list parameters are read as JSON, so
/// `regex=true` is a bool and `tags=["a"]` a list. Every other value is kept
/// verbatim as a string, so `title=2024` stays a string.
pub fn parse_pair(raw: &str) -> Result<(String, Value)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("Expected key=value, got '{raw}'");
    };
    if key.is_empty() {
        bail!("Empty key in '{raw}'");
    }
    let value = if TYPED_KEYS.contains(&key) {
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()))
    } else {
        Value::String(value.to_string())
    };
    Ok((key.to_string(), value))
}

/// Merge `--set` pairs over the file parameters; later pairs win.
pub fn merge_pairs(mut params: Params, pairs: Vec<(String, Value)>) -> Params {
    params.extend(pairs);
    params
}

/// Fill connection gaps from the configuration.
///
/// `database` comes from `database_path` when absent. The configured keyfile
/// is only used when the caller supplied neither password nor keyfile.
pub fn apply_config(params: &mut Params, config: &Config) {
    if let Some(database) = &config.database_path {
        if !params.contains_key("database") {
            params.insert(
                "database".into(),
                Value::String(database.to_string_lossy().into_owned()),
            );
        }
    }

    if let Some(keyfile) = &config.keyfile {
        if !params.contains_key("database_password") && !params.contains_key("keyfile") {
            params.insert(
                "keyfile".into(),
                Value::String(keyfile.to_string_lossy().into_owned()),
            );
        }
    }
}

/// Deserialise a verb's parameters.
///
/// Errors name the offending parameter but never repeat its value.
pub fn typed<T: DeserializeOwned>(params: Params) -> Result<T, VaultError> {
    for key in SECRET_KEYS {
        if let Some(value) = params.get(*key) {
            if !value.is_string() && !value.is_null() {
                return Err(VaultError::Validation(format!(
                    "'{key}' must be a string, got {}",
                    type_name(value)
                )));
            }
        }
    }

    match serde_json::from_value::<T>(Value::Object(params.clone())) {
        Ok(typed) => Ok(typed),
        Err(err) => {
            let message = err.to_string();
            if !is_value_error(&message) {
                return Err(VaultError::Validation(message));
            }
            let redacted = redact(&message);
            Err(VaultError::Validation(match offending_key::<T>(&params, &message) {
                Some(key) => format!("Invalid value for '{key}': {redacted}"),
                None => format!("Invalid parameter value: {redacted}"),
            }))
        }
    }
}

fn is_value_error(message: &str) -> bool {
    message.starts_with("invalid type") || message.starts_with("invalid value")
}

/// Drop the backtick-quoted values serde puts into type errors.
fn redact(message: &str) -> String {
    let mut out = String::new();
    for (i, part) in message.split('`').enumerate() {
        if i % 2 == 0 {
            out.push_str(part);
        } else {
            out.truncate(out.trim_end().len());
        }
    }
    out
}

/// The first key whose removal changes the error.
fn offending_key<T: DeserializeOwned>(params: &Params, message: &str) -> Option<String> {
    params
        .keys()
        .find(|key| {
            let mut without = params.clone();
            without.remove(key.as_str());
            match serde_json::from_value::<T>(Value::Object(without)) {
                Ok(_) => true,
                Err(err) => err.to_string() != message,
            }
        })
        .cloned()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
