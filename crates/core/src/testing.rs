//! Test doubles shared by the unit tests

use crate::command::{CommandExecutor, CommandSender};
use crate::config::HostConfig;
use crate::context::{HostContext, PluginContext};
use crate::error::HostError;
use crate::host::{
    CommandBinding, CommandTable, EventBus, ExecutionContext, HostServices, PermissionNode, Scheduler, Task, TaskHandle,
};
use crate::packet::{PacketListener, PacketWhitelist};
use crate::plugin::{EventListener, InventoryHolder, LifecycleController, PluginHooks, PluginInfo};
use parking_lot::Mutex;
use proto::PacketEvent;
use std::any::Any;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

pub struct NoopListener;

impl EventListener for NoopListener {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct NoopCommand;

impl CommandExecutor for NoopCommand {
    fn execute(&self, _sender: &CommandSender, _label: &str, _args: &[String]) -> anyhow::Result<bool> {
        Ok(true)
    }
}

#[derive(Default)]
pub struct NoopHolder {
    opened: AtomicUsize,
}

impl NoopHolder {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl InventoryHolder for NoopHolder {
    fn open(&self, _plugin: &PluginContext, _player: uuid::Uuid) -> anyhow::Result<()> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct RecordingHandle(AtomicBool);

impl TaskHandle for RecordingHandle {
    fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Scheduler that records the scheduling parameters and never runs tasks
#[derive(Default)]
pub struct RecordingScheduler {
    calls: Mutex<Vec<(u64, Option<u64>, ExecutionContext)>>,
}

impl RecordingScheduler {
    pub fn calls(&self) -> Vec<(u64, Option<u64>, ExecutionContext)> {
        self.calls.lock().clone()
    }
}

impl Scheduler for RecordingScheduler {
    fn schedule(&self, _task: Task, delay: u64, period: Option<u64>, context: ExecutionContext) -> Box<dyn TaskHandle> {
        self.calls.lock().push((delay, period, context));
        Box::new(RecordingHandle(AtomicBool::new(false)))
    }
}

#[derive(Default)]
pub struct RecordingCommandTable {
    bound: Mutex<Vec<String>>,
    unbound: Mutex<Vec<String>>,
    permissions: Mutex<Vec<PermissionNode>>,
    known: Mutex<HashSet<String>>,
}

impl RecordingCommandTable {
    /// Pretend the host already knows the permission node
    pub fn grant(&self, node: &str) {
        self.known.lock().insert(node.to_string());
    }

    pub fn bound(&self) -> Vec<String> {
        self.bound.lock().clone()
    }

    pub fn unbound(&self) -> Vec<String> {
        self.unbound.lock().clone()
    }

    pub fn permissions(&self) -> Vec<PermissionNode> {
        self.permissions.lock().clone()
    }
}

impl CommandTable for RecordingCommandTable {
    fn bind(&self, _plugin: &str, binding: CommandBinding) -> Result<(), HostError> {
        self.bound.lock().push(binding.name);
        Ok(())
    }

    fn has_permission(&self, node: &str) -> bool {
        self.known.lock().contains(node)
    }

    fn add_permission(&self, permission: PermissionNode) -> Result<(), HostError> {
        self.known.lock().insert(permission.name.clone());
        self.permissions.lock().push(permission);
        Ok(())
    }

    fn unbind(&self, _plugin: &str, name: &str) {
        self.unbound.lock().push(name.to_string());
    }
}

#[derive(Default)]
pub struct RecordingEventBus {
    registered: AtomicUsize,
    unregistered: AtomicUsize,
}

impl RecordingEventBus {
    pub fn registered(&self) -> usize {
        self.registered.load(Ordering::SeqCst)
    }

    pub fn unregistered(&self) -> usize {
        self.unregistered.load(Ordering::SeqCst)
    }
}

impl EventBus for RecordingEventBus {
    fn register(&self, _plugin: &PluginContext, _listener: Arc<dyn EventListener>) -> Result<(), HostError> {
        self.registered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn unregister_all(&self, _plugin: &str) {
        self.unregistered.fetch_add(1, Ordering::SeqCst);
    }
}

/// Command table whose first `bind` call panics
#[derive(Default)]
pub struct PanickingCommandTable {
    calls: AtomicUsize,
}

impl PanickingCommandTable {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CommandTable for PanickingCommandTable {
    fn bind(&self, _plugin: &str, binding: CommandBinding) -> Result<(), HostError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("command table rejected {}", binding.name);
        }
        Ok(())
    }

    fn has_permission(&self, _node: &str) -> bool {
        false
    }

    fn add_permission(&self, _permission: PermissionNode) -> Result<(), HostError> {
        Ok(())
    }
}

/// Event bus whose first `register` call panics
#[derive(Default)]
pub struct PanickingEventBus {
    calls: AtomicUsize,
}

impl PanickingEventBus {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EventBus for PanickingEventBus {
    fn register(&self, _plugin: &PluginContext, _listener: Arc<dyn EventListener>) -> Result<(), HostError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("event bus is not ready");
        }
        Ok(())
    }
}

pub struct CountingPacketListener {
    whitelist: PacketWhitelist,
    cancel: bool,
    received: AtomicUsize,
    sent: AtomicUsize,
}

impl CountingPacketListener {
    pub fn new(whitelist: PacketWhitelist) -> Self {
        Self {
            whitelist,
            cancel: false,
            received: AtomicUsize::new(0),
            sent: AtomicUsize::new(0),
        }
    }

    /// Cancels every event it receives
    pub fn cancelling(whitelist: PacketWhitelist) -> Self {
        Self {
            cancel: true,
            ..Self::new(whitelist)
        }
    }

    pub fn received(&self) -> usize {
        self.received.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }
}

impl PacketListener for CountingPacketListener {
    fn whitelist(&self) -> PacketWhitelist {
        self.whitelist.clone()
    }

    fn on_packet_receive(&self, _plugin: &PluginContext, event: &mut PacketEvent) -> anyhow::Result<()> {
        self.received.fetch_add(1, Ordering::SeqCst);
        if self.cancel {
            event.set_cancelled(true);
        }
        Ok(())
    }

    fn on_packet_send(&self, _plugin: &PluginContext, _event: &mut PacketEvent) -> anyhow::Result<()> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Listener whose hooks always fail, either with an error or a panic
pub struct FailingPacketListener {
    whitelist: PacketWhitelist,
    panics: bool,
}

impl FailingPacketListener {
    pub fn new(whitelist: PacketWhitelist, panics: bool) -> Self {
        Self { whitelist, panics }
    }

    fn fail(&self) -> anyhow::Result<()> {
        if self.panics {
            panic!("listener panicked");
        }
        Err(anyhow::anyhow!("listener failed"))
    }
}

impl PacketListener for FailingPacketListener {
    fn whitelist(&self) -> PacketWhitelist {
        self.whitelist.clone()
    }

    fn on_packet_receive(&self, _plugin: &PluginContext, _event: &mut PacketEvent) -> anyhow::Result<()> {
        self.fail()
    }

    fn on_packet_send(&self, _plugin: &PluginContext, _event: &mut PacketEvent) -> anyhow::Result<()> {
        self.fail()
    }
}

/// Plugin hooks counting their calls, optionally failing on demand
pub struct TestHooks {
    name: &'static str,
    config: Option<&'static str>,
    fail_load: bool,
    fail_enable: bool,
    disable_on_enable: bool,
    loads: AtomicUsize,
    enables: AtomicUsize,
    disables: AtomicUsize,
}

impl TestHooks {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            config: None,
            fail_load: false,
            fail_enable: false,
            disable_on_enable: false,
            loads: AtomicUsize::new(0),
            enables: AtomicUsize::new(0),
            disables: AtomicUsize::new(0),
        }
    }

    pub fn failing_load(mut self) -> Self {
        self.fail_load = true;
        self
    }

    pub fn failing_enable(mut self) -> Self {
        self.fail_enable = true;
        self
    }

    /// Disable the plugin from inside the enable hook
    pub fn disabling_on_enable(mut self) -> Self {
        self.disable_on_enable = true;
        self
    }

    pub fn with_config(mut self, template: &'static str) -> Self {
        self.config = Some(template);
        self
    }

    /// Load, enable and disable hook calls so far
    pub fn calls(&self) -> (usize, usize, usize) {
        (
            self.loads.load(Ordering::SeqCst),
            self.enables.load(Ordering::SeqCst),
            self.disables.load(Ordering::SeqCst),
        )
    }
}

impl PluginHooks for TestHooks {
    fn info(&self) -> PluginInfo {
        PluginInfo::new(self.name, semver::Version::new(1, 0, 0))
    }

    fn default_config(&self) -> Option<&'static str> {
        self.config
    }

    fn on_load(&self, _plugin: &LifecycleController) -> anyhow::Result<()> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_load {
            anyhow::bail!("load hook failed");
        }
        Ok(())
    }

    fn on_enable(&self, plugin: &LifecycleController) -> anyhow::Result<()> {
        self.enables.fetch_add(1, Ordering::SeqCst);
        if self.fail_enable {
            anyhow::bail!("enable hook failed");
        }
        if self.disable_on_enable {
            plugin.disable()?;
        }
        Ok(())
    }

    fn on_disable(&self, _plugin: &LifecycleController) -> anyhow::Result<()> {
        self.disables.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Host context rooted in a fresh temporary directory
pub fn host_context() -> (TempDir, Arc<HostContext>) {
    let dir = TempDir::new().unwrap();
    let host = HostContext::new(HostConfig {
        global_folder: dir.path().join("plugins"),
        ..HostConfig::default()
    })
    .unwrap();
    (dir, host)
}

/// Plugin context named `MSTest` with its folder created
pub fn plugin_context() -> (TempDir, Arc<PluginContext>) {
    let (dir, host) = host_context();
    let context = PluginContext::new("MSTest", host, Arc::new(RecordingScheduler::default()), None);
    context.create_folder().unwrap();
    (dir, Arc::new(context))
}

pub fn host_services(commands: Arc<RecordingCommandTable>, events: Arc<RecordingEventBus>) -> HostServices {
    HostServices::new(commands, events, Arc::new(RecordingScheduler::default()))
}
