//! Explicit host and plugin contexts
//!
//! A single [`HostContext`] is built at process start and shared by
//! reference with every plugin controller. Each controller owns one
//! [`PluginContext`], which components receive when they are registered.

use crate::config::{ConfigError, HostConfig, PluginConfig, PLUGIN_CONFIG_FILE};
use crate::error::BootError;
use crate::host::{ExecutionContext, Scheduler, TaskHandle};
use dashmap::DashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// State shared by every plugin in the process
#[derive(Debug, Default)]
pub struct HostCache {
    /// Labels (names and aliases) of commands only players may run
    pub player_only_commands: DashSet<String>,
}

/// Process-wide context replacing static globals
#[derive(Debug)]
pub struct HostContext {
    config: HostConfig,
    cache: HostCache,
}

impl HostContext {
    /// Validate the configuration and create the global folder
    pub fn new(config: HostConfig) -> Result<Arc<Self>, ConfigError> {
        config.validate()?;

        if !config.global_folder.exists() {
            std::fs::create_dir_all(&config.global_folder).map_err(|source| ConfigError::Io {
                path: config.global_folder.clone(),
                source,
            })?;
            tracing::info!("Created global folder {}", config.global_folder.display());
        }

        Ok(Arc::new(Self {
            config,
            cache: HostCache::default(),
        }))
    }

    /// Get host configuration
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Get the cache shared by every plugin
    pub fn cache(&self) -> &HostCache {
        &self.cache
    }

    /// Folder holding every plugin folder
    pub fn global_folder(&self) -> &Path {
        &self.config.global_folder
    }

    /// Whether the command label may only be used by players
    pub fn is_player_only(&self, label: &str) -> bool {
        self.cache.player_only_commands.contains(label)
    }
}

/// Per-plugin context handed to components at registration
pub struct PluginContext {
    name: String,
    folder: PathBuf,
    host: Arc<HostContext>,
    scheduler: Arc<dyn Scheduler>,
    config: PluginConfig,
    active: AtomicBool,
}

impl PluginContext {
    /// The plugin folder is `<global>/<name>` and is created by
    /// [`PluginContext::create_folder`].
    pub(crate) fn new(
        name: &str,
        host: Arc<HostContext>,
        scheduler: Arc<dyn Scheduler>,
        config_template: Option<&'static str>,
    ) -> Self {
        let folder = host.global_folder().join(name);
        let config = PluginConfig::new(folder.join(PLUGIN_CONFIG_FILE), config_template);

        Self {
            name: name.to_string(),
            folder,
            host,
            scheduler,
            config,
            active: AtomicBool::new(false),
        }
    }

    /// Create the plugin's private folder. Failure is fatal for this plugin.
    pub(crate) fn create_folder(&self) -> Result<(), BootError> {
        std::fs::create_dir_all(&self.folder).map_err(|source| BootError::Storage {
            path: self.folder.clone(),
            source,
        })
    }

    /// Get plugin name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The plugin's private storage folder
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Get the shared host context
    pub fn host(&self) -> &Arc<HostContext> {
        &self.host
    }

    /// Get plugin configuration document
    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// Whether the plugin is currently active (enabling or enabled)
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Ask for the plugin to be shut down. Takes effect at the next lifecycle
    /// checkpoint, e.g. right after the enable hook returns.
    pub fn request_disable(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            tracing::info!("Plugin {} requested shutdown", self.name);
        }
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    /// Write an embedded resource into the plugin folder, keeping its
    /// relative path. Existing files are only replaced when `replace` is set.
    /// Paths leaving the plugin folder are rejected. Returns whether the file
    /// was written.
    pub fn save_resource(&self, path: &str, contents: &[u8], replace: bool) -> std::io::Result<bool> {
        let relative = path.replace('\\', "/");
        if relative.trim().is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "resource path cannot be empty",
            ));
        }

        let relative_path = Path::new(relative.trim_start_matches('/'));
        if relative_path
            .components()
            .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir))
        {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("resource path '{}' leaves the plugin folder", path),
            ));
        }

        let target = self.folder.join(relative_path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }

        if target.exists() && !replace {
            tracing::warn!(
                "Could not save {} to {} because it already exists",
                relative,
                target.display()
            );
            return Ok(false);
        }

        std::fs::write(&target, contents)?;
        Ok(true)
    }

    /// Run a task on the main thread at the next tick
    pub fn run_task<F>(&self, task: F) -> Box<dyn TaskHandle>
    where
        F: FnMut() + Send + 'static,
    {
        self.scheduler.schedule(Box::new(task), 0, None, ExecutionContext::Main)
    }

    /// Run a task on the host's worker pool
    pub fn run_task_async<F>(&self, task: F) -> Box<dyn TaskHandle>
    where
        F: FnMut() + Send + 'static,
    {
        self.scheduler.schedule(Box::new(task), 0, None, ExecutionContext::Async)
    }

    pub fn run_task_later<F>(&self, task: F, delay: u64) -> Box<dyn TaskHandle>
    where
        F: FnMut() + Send + 'static,
    {
        self.scheduler.schedule(Box::new(task), delay, None, ExecutionContext::Main)
    }

    pub fn run_task_later_async<F>(&self, task: F, delay: u64) -> Box<dyn TaskHandle>
    where
        F: FnMut() + Send + 'static,
    {
        self.scheduler.schedule(Box::new(task), delay, None, ExecutionContext::Async)
    }

    pub fn run_task_timer<F>(&self, task: F, delay: u64, period: u64) -> Box<dyn TaskHandle>
    where
        F: FnMut() + Send + 'static,
    {
        self.scheduler.schedule(Box::new(task), delay, Some(period), ExecutionContext::Main)
    }

    pub fn run_task_timer_async<F>(&self, task: F, delay: u64, period: u64) -> Box<dyn TaskHandle>
    where
        F: FnMut() + Send + 'static,
    {
        self.scheduler.schedule(Box::new(task), delay, Some(period), ExecutionContext::Async)
    }
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("name", &self.name)
            .field("folder", &self.folder)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}
