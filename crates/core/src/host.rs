//! Interfaces of the hosting server consumed by the plugin framework
//!
//! The framework never implements these. A host wires its command table,
//! event bus and scheduler in through [`HostServices`] when it constructs a
//! plugin's lifecycle controller.

use crate::command::{ChildPermission, CommandExecutor, CommandNode, PermissionDefault};
use crate::context::PluginContext;
use crate::error::HostError;
use crate::plugin::EventListener;
use std::sync::Arc;

/// Everything the host command table needs to expose one command
#[derive(Clone)]
pub struct CommandBinding {
    pub name: String,
    pub aliases: Vec<String>,
    pub usage: Option<String>,
    pub description: Option<String>,
    pub permission: Option<String>,
    /// Executor doubling as the tab completer
    pub executor: Arc<dyn CommandExecutor>,
    pub grammar: Option<CommandNode>,
}

impl std::fmt::Debug for CommandBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBinding")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("usage", &self.usage)
            .field("description", &self.description)
            .field("permission", &self.permission)
            .field("grammar", &self.grammar)
            .finish_non_exhaustive()
    }
}

/// A permission node registered with the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionNode {
    pub name: String,
    pub default: PermissionDefault,
    pub children: Vec<ChildPermission>,
}

/// The host's command table
pub trait CommandTable: Send + Sync {
    /// Create or fetch the command slot named in `binding` and attach its
    /// metadata, executor and grammar under the plugin's namespace.
    fn bind(&self, plugin: &str, binding: CommandBinding) -> Result<(), HostError>;

    /// Whether a permission node is already known to the host
    fn has_permission(&self, node: &str) -> bool;

    fn add_permission(&self, permission: PermissionNode) -> Result<(), HostError>;

    /// Drop a command previously bound by the plugin
    fn unbind(&self, _plugin: &str, _name: &str) {}
}

/// The host's event bus.
///
/// Binding a listener's handler methods to event types follows the host's
/// own convention; the framework only submits each listener once per enable
/// cycle.
pub trait EventBus: Send + Sync {
    fn register(&self, plugin: &PluginContext, listener: Arc<dyn EventListener>) -> Result<(), HostError>;

    /// Drop every listener the plugin registered
    fn unregister_all(&self, _plugin: &str) {}
}

/// Where a scheduled task runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionContext {
    /// The single serialized server thread
    Main,
    /// The host's parallel worker pool
    Async,
}

/// Work handed to the scheduler. Periodic tasks are invoked repeatedly.
pub type Task = Box<dyn FnMut() + Send + 'static>;

/// Handle to a scheduled task
pub trait TaskHandle: Send + Sync {
    fn cancel(&self);

    fn is_cancelled(&self) -> bool;
}

/// The host's task scheduler. Delays and periods are in server ticks.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, task: Task, delay: u64, period: Option<u64>, context: ExecutionContext) -> Box<dyn TaskHandle>;
}

/// Host capabilities handed to every plugin controller
#[derive(Clone)]
pub struct HostServices {
    pub commands: Arc<dyn CommandTable>,
    pub events: Arc<dyn EventBus>,
    pub scheduler: Arc<dyn Scheduler>,
}

impl HostServices {
    pub fn new(
        commands: Arc<dyn CommandTable>,
        events: Arc<dyn EventBus>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            commands,
            events,
            scheduler,
        }
    }
}
