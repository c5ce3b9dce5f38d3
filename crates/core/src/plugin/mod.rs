//! Plugin component framework
//!
//! A plugin declares its components in a [`ComponentTable`]. Its
//! [`LifecycleController`] finds them under the plugin's namespace root,
//! registers them with the host on enable and withdraws them on disable,
//! recording every step in a [`StatusTracker`].

pub mod component;
pub mod lifecycle;
pub mod registry;
pub mod scanner;
pub mod status;

pub use component::{
    ActivationState, Component, ComponentDeclaration, ComponentFactory, ComponentKind, ComponentMarker,
    ComponentTable, EventListener, InventoryHolder, Managed, StaticDeclaration, StaticMarker,
};
pub use lifecycle::{LifecycleController, LifecycleState};
pub use registry::ComponentRegistry;
pub use scanner::{ArchiveSource, ClassScanner, ClassSource, DirectorySource, ScanError, TableSource};
pub use status::{Priority, StatusError, StatusMarker, StatusTracker, StatusWatcher};

use serde::{Deserialize, Serialize};

/// Hooks a plugin implements around the framework's own lifecycle work
pub trait PluginHooks: Send + Sync {
    /// Get plugin information and metadata
    fn info(&self) -> PluginInfo;

    /// Embedded TOML template providing config defaults
    fn default_config(&self) -> Option<&'static str> {
        None
    }

    /// Called after every component has been discovered.
    ///
    /// Returning an error fails the plugin.
    fn on_load(&self, _plugin: &LifecycleController) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called after every component has been registered with the host.
    ///
    /// Returning an error, or calling `request_disable` on the plugin
    /// context, shuts the plugin down again before it is marked enabled.
    fn on_enable(&self, _plugin: &LifecycleController) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called first when the plugin is being disabled
    fn on_disable(&self, _plugin: &LifecycleController) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Plugin information and metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Plugin name (must be unique); also names the plugin folder
    pub name: String,
    pub version: semver::Version,
    pub description: String,
    pub authors: Vec<String>,
}

impl PluginInfo {
    pub fn new(name: impl Into<String>, version: semver::Version) -> Self {
        Self {
            name: name.into(),
            version,
            description: String::new(),
            authors: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.authors.push(author.into());
        self
    }
}

impl std::fmt::Display for PluginInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} v{}", self.name, self.version)
    }
}
