//! Host-wide configuration and per-plugin configuration documents

use crate::plugin::scanner::DEFAULT_UNIT_EXTENSION;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the per-plugin configuration document inside the plugin folder
pub const PLUGIN_CONFIG_FILE: &str = "config.toml";

/// Host-wide settings shared by every plugin instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Folder holding one private sub-folder per plugin
    pub global_folder: PathBuf,
    /// Namespace prefix; a plugin's namespace root is `<prefix>.<name>`
    pub namespace_prefix: String,
    /// Discovery worker threads per plugin, 0 lets rayon decide
    pub discovery_threads: usize,
    /// File extension of component units in directory and archive sources
    pub unit_extension: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            global_folder: PathBuf::from("config/whomine"),
            namespace_prefix: "whomine".to_string(),
            discovery_threads: 0,
            unit_extension: DEFAULT_UNIT_EXTENSION.to_string(),
        }
    }
}

impl HostConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: HostConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.global_folder.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("Global folder cannot be empty".to_string()));
        }

        if self.namespace_prefix.is_empty() {
            return Err(ConfigError::Invalid("Namespace prefix cannot be empty".to_string()));
        }

        if self.namespace_prefix.split('.').any(|segment| segment.is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "Namespace prefix '{}' contains an empty segment",
                self.namespace_prefix
            )));
        }

        if self.unit_extension.is_empty() || self.unit_extension.contains('.') {
            return Err(ConfigError::Invalid(format!(
                "Unit extension '{}' must be a bare extension",
                self.unit_extension
            )));
        }

        Ok(())
    }

    /// Namespace root scanned for the named plugin's components
    pub fn namespace_root(&self, plugin_name: &str) -> String {
        format!("{}.{}", self.namespace_prefix, plugin_name.to_lowercase())
    }
}

/// A plugin's key-value configuration document.
///
/// Values read from disk are merged with defaults from the plugin's embedded
/// template; keys present on disk always win.
pub struct PluginConfig {
    file: PathBuf,
    template: Option<&'static str>,
    document: RwLock<toml::Table>,
}

impl PluginConfig {
    pub fn new(file: PathBuf, template: Option<&'static str>) -> Self {
        Self {
            file,
            template,
            document: RwLock::new(toml::Table::new()),
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Discard the in-memory document and read it again from disk.
    /// A missing file yields the template defaults only.
    pub fn reload(&self) -> Result<(), ConfigError> {
        let mut document = if self.file.exists() {
            let content = std::fs::read_to_string(&self.file).map_err(|source| ConfigError::Io {
                path: self.file.clone(),
                source,
            })?;
            content
                .parse::<toml::Table>()
                .map_err(|e| ConfigError::Parse(format!("{}: {}", self.file.display(), e)))?
        } else {
            toml::Table::new()
        };

        if let Some(defaults) = self.defaults()? {
            merge_defaults(&mut document, &defaults);
        }

        *self.document.write() = document;
        Ok(())
    }

    /// Snapshot of the current document
    pub fn document(&self) -> toml::Table {
        self.document.read().clone()
    }

    pub fn get(&self, key: &str) -> Option<toml::Value> {
        self.document.read().get(key).cloned()
    }

    pub fn set_document(&self, document: toml::Table) {
        *self.document.write() = document;
    }

    /// Write the current document to disk
    pub fn save(&self) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(&*self.document.read())
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(&self.file, content).map_err(|source| ConfigError::Io {
            path: self.file.clone(),
            source,
        })
    }

    /// Write the embedded template to disk unless a config file already
    /// exists. Returns whether a file was written.
    pub fn save_default(&self) -> Result<bool, ConfigError> {
        match self.template {
            Some(template) if !self.file.exists() => {
                std::fs::write(&self.file, template).map_err(|source| ConfigError::Io {
                    path: self.file.clone(),
                    source,
                })?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn defaults(&self) -> Result<Option<toml::Table>, ConfigError> {
        self.template
            .map(|template| {
                template
                    .parse::<toml::Table>()
                    .map_err(|e| ConfigError::Parse(format!("embedded config template: {}", e)))
            })
            .transpose()
    }
}

/// Insert every key of `defaults` missing from `target`, descending into
/// tables present on both sides
fn merge_defaults(target: &mut toml::Table, defaults: &toml::Table) {
    for (key, default) in defaults {
        match (target.get_mut(key), default) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(nested)) => {
                merge_defaults(existing, nested);
            }
            (Some(_), _) => {}
            (None, _) => {
                target.insert(key.clone(), default.clone());
            }
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
