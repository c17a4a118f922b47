use crate::errors::{Result, StackError};
use crate::stack::patch::{Identity, DEFAULT_NAME_LENGTH};
use ::config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Every key `pst config` understands
pub const KEYS: &[&str] = &[
    "author.name",
    "author.email",
    "editor",
    "stack.name_length",
    "stack.storage_dir",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub author: AuthorSettings,
    /// Editor command for message editing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editor: Option<String>,
    pub stack: StackSettings,
}

/// Identity used for multi-author squashes and as committer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

// Unset fields are left out of the file so they never mask a lower layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackSettings {
    /// Maximum length of names derived from messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_length: Option<usize>,
    /// Where stack state lives instead of `<gitdir>/patch-stack`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<PathBuf>,
}

impl StackSettings {
    pub fn name_length(&self) -> usize {
        self.name_length.unwrap_or(DEFAULT_NAME_LENGTH)
    }
}

impl Settings {
    /// Load settings from a file; a missing file gives the defaults
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Self::load_layered(&[path.to_path_buf()])
    }

    /// Load `files` in order, later files overriding earlier ones key by key.
    /// Missing files are skipped.
    pub fn load_layered(files: &[PathBuf]) -> Result<Self> {
        let builder = files.iter().fold(Config::builder(), |builder, path| {
            builder.add_source(
                File::from(path.as_path())
                    .format(FileFormat::Json)
                    .required(false),
            )
        });
        builder
            .build()
            .and_then(|config| config.try_deserialize::<Settings>())
            .map_err(|e| StackError::config(format!("Failed to parse config: {e}")))
    }

    /// Save settings to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                StackError::config(format!("Failed to create config directory: {e}"))
            })?;
        }
        crate::utils::atomic_file::write_json(path, self)
    }

    /// Configured identity, if both name and email are set
    pub fn author_identity(&self) -> Option<Identity> {
        match (&self.author.name, &self.author.email) {
            (Some(name), Some(email)) => Some(Identity::new(name.clone(), email.clone())),
            _ => None,
        }
    }

    /// Update a configuration value by key
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let optional = |value: &str| {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        };

        match key {
            "author.name" => self.author.name = optional(value),
            "author.email" => self.author.email = optional(value),
            "editor" => self.editor = optional(value),
            "stack.name_length" => {
                let length: usize = value.trim().parse().map_err(|_| {
                    StackError::config(format!("Invalid name length: {value}"))
                })?;
                if length == 0 {
                    return Err(StackError::config("stack.name_length must be positive"));
                }
                self.stack.name_length = Some(length);
            }
            "stack.storage_dir" => self.stack.storage_dir = optional(value).map(PathBuf::from),
            _ => return Err(StackError::config(format!("Unknown config key: {key}"))),
        }
        Ok(())
    }

    /// Get a configuration value by key; unset values are empty strings
    pub fn get_value(&self, key: &str) -> Result<String> {
        let value = match key {
            "author.name" => self.author.name.clone().unwrap_or_default(),
            "author.email" => self.author.email.clone().unwrap_or_default(),
            "editor" => self.editor.clone().unwrap_or_default(),
            "stack.name_length" => self.stack.name_length().to_string(),
            "stack.storage_dir" => self
                .stack
                .storage_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            _ => return Err(StackError::config(format!("Unknown config key: {key}"))),
        };
        Ok(value)
    }

    /// All keys with their current values
    pub fn list(&self) -> Result<Vec<(&'static str, String)>> {
        KEYS.iter()
            .map(|key| Ok((*key, self.get_value(key)?)))
            .collect()
    }
}
