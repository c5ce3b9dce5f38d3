//! Host doubles shared by the integration tests

#![allow(dead_code)]

use parking_lot::Mutex;
use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use whomine::host::{CommandBinding, PermissionNode, Task};
use whomine::packet::PacketWhitelist;
use whomine::plugin::{EventListener, InventoryHolder};
use whomine::proto::PacketEvent;
use whomine::{
    CommandExecutor, CommandSender, CommandTable, EventBus, ExecutionContext, HostConfig, HostContext, HostError,
    HostServices, LifecycleController, PacketListener, PluginContext, PluginHooks, PluginInfo, Scheduler, TaskHandle,
};

pub struct Handle(AtomicBool);

impl TaskHandle for Handle {
    fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct IdleScheduler;

impl Scheduler for IdleScheduler {
    fn schedule(&self, _task: Task, _delay: u64, _period: Option<u64>, _context: ExecutionContext) -> Box<dyn TaskHandle> {
        Box::new(Handle(AtomicBool::new(false)))
    }
}

#[derive(Default)]
pub struct Commands {
    pub bound: Mutex<Vec<String>>,
}

impl CommandTable for Commands {
    fn bind(&self, _plugin: &str, binding: CommandBinding) -> Result<(), HostError> {
        self.bound.lock().push(binding.name);
        Ok(())
    }

    fn has_permission(&self, _node: &str) -> bool {
        false
    }

    fn add_permission(&self, _permission: PermissionNode) -> Result<(), HostError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct Events {
    pub registered: AtomicUsize,
}

impl EventBus for Events {
    fn register(&self, _plugin: &PluginContext, _listener: Arc<dyn EventListener>) -> Result<(), HostError> {
        self.registered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct Listener;

impl EventListener for Listener {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct Executor;

impl CommandExecutor for Executor {
    fn execute(&self, _sender: &CommandSender, _label: &str, _args: &[String]) -> anyhow::Result<bool> {
        Ok(true)
    }
}

pub struct Holder;

impl InventoryHolder for Holder {
    fn open(&self, _plugin: &PluginContext, _player: whomine::proto::uuid::Uuid) -> anyhow::Result<()> {
        Ok(())
    }
}

pub struct PacketCounter {
    whitelist: PacketWhitelist,
    pub received: AtomicUsize,
}

impl PacketCounter {
    pub fn new(whitelist: PacketWhitelist) -> Self {
        Self {
            whitelist,
            received: AtomicUsize::new(0),
        }
    }
}

impl PacketListener for PacketCounter {
    fn whitelist(&self) -> PacketWhitelist {
        self.whitelist.clone()
    }

    fn on_packet_receive(&self, _plugin: &PluginContext, _event: &mut PacketEvent) -> anyhow::Result<()> {
        self.received.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Plugin hooks that optionally ask for shutdown from the enable hook
pub struct Hooks {
    pub name: &'static str,
    pub shutdown_on_enable: bool,
}

impl Hooks {
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            shutdown_on_enable: false,
        })
    }

    pub fn shutting_down(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            shutdown_on_enable: true,
        })
    }
}

impl PluginHooks for Hooks {
    fn info(&self) -> PluginInfo {
        PluginInfo::new(self.name, semver::Version::new(1, 0, 0))
    }

    fn on_enable(&self, plugin: &LifecycleController) -> anyhow::Result<()> {
        if self.shutdown_on_enable {
            plugin.context().request_disable();
        }
        Ok(())
    }
}

pub fn host(dir: &TempDir, discovery_threads: usize) -> Arc<HostContext> {
    HostContext::new(HostConfig {
        global_folder: dir.path().join("plugins"),
        discovery_threads,
        ..HostConfig::default()
    })
    .expect("Failed to create host context")
}

pub fn services() -> HostServices {
    HostServices::new(
        Arc::new(Commands::default()),
        Arc::new(Events::default()),
        Arc::new(IdleScheduler),
    )
}
