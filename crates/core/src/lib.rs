//! Component lifecycle framework for WhoMine server plugins
//!
//! Plugins declare commands, event listeners, packet listeners and inventory
//! holders once. The framework discovers them under the plugin's namespace,
//! registers them with the host when the plugin is enabled, routes packets to
//! interested listeners and tears everything down again on disable.

#![warn(
    clippy::expect_used,
    clippy::get_unwrap,
    clippy::missing_assert_message,
    clippy::mutex_atomic,
    clippy::unwrap_in_result,
    clippy::unwrap_used,
    clippy::clone_on_ref_ptr,
    clippy::explicit_iter_loop,
    clippy::implicit_clone,
    clippy::inefficient_to_string,
    clippy::manual_let_else,
    clippy::redundant_closure_for_method_calls
)]

pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod host;
pub mod logging;
pub mod packet;
pub mod plugin;

#[cfg(test)]
pub(crate) mod testing;

#[doc(hidden)]
pub use inventory;
pub use proto;

pub use command::{CommandDescriptor, CommandExecutor, CommandNode, CommandSender, PermissionDefault};
pub use config::{ConfigError, HostConfig, PluginConfig};
pub use context::{HostCache, HostContext, PluginContext};
pub use error::{BootError, ComponentError, HostError, ListenerFault};
pub use host::{CommandTable, EventBus, ExecutionContext, HostServices, Scheduler, TaskHandle};
pub use packet::{PacketDispatcher, PacketListener, PacketWhitelist};
pub use plugin::{
    Component, ComponentMarker, ComponentTable, LifecycleController, LifecycleState, PluginHooks, PluginInfo,
    StatusMarker, StatusTracker,
};
