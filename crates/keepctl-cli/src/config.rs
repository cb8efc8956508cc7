//! Configuration file handling.
//!
//! Reads from `~/.config/keepctl/keepctl.toml`

use anyhow::{Context, Result};
use keepctl_core::mutation::{Defaults, DEFAULT_ENTRY_ICON, DEFAULT_GROUP_ICON, MAX_ICON_ID};
use keepctl_core::password;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tool configuration. Every value only fills gaps in the caller's parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Database used when the parameters name none.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// Keyfile used when the parameters name neither keyfile nor password.
    #[serde(default)]
    pub keyfile: Option<PathBuf>,
    /// Length of generated passwords.
    #[serde(default = "default_password_length")]
    pub password_length: usize,
    /// Icon for new entries.
    #[serde(default = "default_entry_icon")]
    pub entry_icon: usize,
    /// Icon for new groups.
    #[serde(default = "default_group_icon")]
    pub group_icon: usize,
    /// Notes attached to new entries and groups that come without any.
    #[serde(default)]
    pub default_notes: Option<String>,
}

fn default_password_length() -> usize {
    password::DEFAULT_LENGTH
}

fn default_entry_icon() -> usize {
    DEFAULT_ENTRY_ICON
}

fn default_group_icon() -> usize {
    DEFAULT_GROUP_ICON
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            keyfile: None,
            password_length: default_password_length(),
            entry_icon: default_entry_icon(),
            group_icon: default_group_icon(),
            default_notes: None,
        }
    }
}

impl Config {
    /// Load configuration from the config file.
    ///
    /// If `custom_path` is provided, load from that path and fail if it is
    /// missing. Otherwise, load from the default XDG config location and fall
    /// back to defaults when there is no file.
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self> {
        let is_custom = custom_path.is_some();
        let config_path = match custom_path {
            Some(path) => path,
            None => match Self::config_path() {
                Some(path) => path,
                None => return Ok(Self::default()),
            },
        };

        if !config_path.exists() {
            if is_custom {
                anyhow::bail!("Config file not found: {}", config_path.display());
            }
            tracing::debug!("No config at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", config_path.display()))?;

        tracing::info!("Loaded config from {}", config_path.display());
        Ok(config)
    }

    /// Values must obey the same bounds as the matching parameters.
    fn validate(&self) -> Result<()> {
        for (field, icon) in [("entry_icon", self.entry_icon), ("group_icon", self.group_icon)] {
            if icon > MAX_ICON_ID {
                anyhow::bail!("'{field}' must be between 0 and {MAX_ICON_ID}, got {icon}");
            }
        }
        Ok(())
    }

    /// Get the path to the config file.
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("keepctl").join("keepctl.toml"))
    }

    /// Defaults handed to the mutation engine.
    pub fn defaults(&self) -> Defaults {
        Defaults {
            password_length: self.password_length,
            entry_icon: self.entry_icon,
            group_icon: self.group_icon,
            notes: self.default_notes.clone(),
        }
    }
}
