//! Plugin lifecycle state machine and controller
//!
//! One [`LifecycleController`] drives one plugin instance through
//! load, enable and disable. Every state change goes through
//! [`LifecycleController::transition`], which checks legality and records the
//! matching status marker.

use super::component::{Component, ComponentDeclaration, ComponentKind, ComponentMarker, ComponentTable};
use super::registry::ComponentRegistry;
use super::scanner::{ClassScanner, ClassSource, TableSource};
use super::status::{StatusMarker, StatusTracker};
use super::{PluginHooks, PluginInfo};
use crate::command::CommandDescriptor;
use crate::config::{ConfigError, PluginConfig};
use crate::context::{HostContext, PluginContext};
use crate::error::{panic_message, BootError, ComponentError};
use crate::host::{CommandBinding, HostServices, PermissionNode};
use crate::packet::{ListenerIndex, PacketDispatcher};
use parking_lot::{Mutex, RwLock};
use proto::PacketEvent;
use rayon::prelude::*;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

/// Lifecycle state of a plugin instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Created,
    LoadInProgress,
    Loaded,
    EnableInProgress,
    Enabled,
    DisableInProgress,
    Disabled,
    /// Terminal; the instance must be dropped and rebuilt
    Failed,
}

impl LifecycleState {
    /// States reachable from this one
    pub fn valid_transitions(self) -> &'static [LifecycleState] {
        match self {
            Self::Created => &[Self::LoadInProgress, Self::Failed],
            Self::LoadInProgress => &[Self::Loaded, Self::Failed],
            Self::Loaded => &[Self::EnableInProgress],
            Self::EnableInProgress => &[Self::Enabled, Self::DisableInProgress, Self::Failed],
            Self::Enabled => &[Self::DisableInProgress],
            Self::DisableInProgress => &[Self::Disabled, Self::Failed],
            Self::Disabled => &[Self::EnableInProgress, Self::LoadInProgress],
            Self::Failed => &[],
        }
    }

    pub fn can_transition_to(self, target: LifecycleState) -> bool {
        self.valid_transitions().contains(&target)
    }

    /// Status marker recorded on entering this state
    pub fn marker(self) -> Option<StatusMarker> {
        match self {
            Self::Created => None,
            Self::LoadInProgress => Some(StatusMarker::LoadInProgress),
            Self::Loaded => Some(StatusMarker::Loaded),
            Self::EnableInProgress => Some(StatusMarker::EnableInProgress),
            Self::Enabled => Some(StatusMarker::Enabled),
            Self::DisableInProgress => Some(StatusMarker::DisableInProgress),
            Self::Disabled => Some(StatusMarker::Disabled),
            Self::Failed => Some(StatusMarker::Failed),
        }
    }

    pub fn is_failed(self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::LoadInProgress => write!(f, "LoadInProgress"),
            Self::Loaded => write!(f, "Loaded"),
            Self::EnableInProgress => write!(f, "EnableInProgress"),
            Self::Enabled => write!(f, "Enabled"),
            Self::DisableInProgress => write!(f, "DisableInProgress"),
            Self::Disabled => write!(f, "Disabled"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Discovery passes, in the order they are started
const DISCOVERY_PASSES: [ComponentKind; 4] = [
    ComponentKind::Command,
    ComponentKind::InventoryHolder,
    ComponentKind::EventListener,
    ComponentKind::PacketListener,
];

/// Drives one plugin through scan, discovery, registration and teardown
pub struct LifecycleController {
    info: PluginInfo,
    hooks: Arc<dyn PluginHooks>,
    table: Arc<ComponentTable>,
    scanner: ClassScanner,
    services: HostServices,
    context: Arc<PluginContext>,
    status: Arc<StatusTracker>,
    state: Mutex<LifecycleState>,
    class_names: RwLock<Vec<String>>,
    registry: RwLock<Arc<ComponentRegistry>>,
    dispatcher: PacketDispatcher,
}

impl LifecycleController {
    /// Create a controller in the `Created` state. Nothing touches the
    /// filesystem until [`LifecycleController::load`].
    pub fn new(
        hooks: Arc<dyn PluginHooks>,
        table: Arc<ComponentTable>,
        source: Arc<dyn ClassSource>,
        host: Arc<HostContext>,
        services: HostServices,
    ) -> Self {
        let info = hooks.info();
        let context = Arc::new(PluginContext::new(
            &info.name,
            host,
            Arc::clone(&services.scheduler),
            hooks.default_config(),
        ));

        Self {
            info,
            hooks,
            table,
            scanner: ClassScanner::new(source),
            services,
            context,
            status: Arc::new(StatusTracker::new()),
            state: Mutex::new(LifecycleState::Created),
            class_names: RwLock::new(Vec::new()),
            registry: RwLock::new(Arc::new(ComponentRegistry::new())),
            dispatcher: PacketDispatcher::new(),
        }
    }

    /// Controller whose classes are exactly the ones declared in `table`
    pub fn from_table(
        hooks: Arc<dyn PluginHooks>,
        table: Arc<ComponentTable>,
        host: Arc<HostContext>,
        services: HostServices,
    ) -> Self {
        let source = Arc::new(TableSource::from_table(&table));
        Self::new(hooks, table, source, host, services)
    }

    /// Get plugin name
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Get plugin information
    pub fn info(&self) -> &PluginInfo {
        &self.info
    }

    /// Get current lifecycle state
    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    /// Status markers recorded for this plugin
    pub fn status(&self) -> &Arc<StatusTracker> {
        &self.status
    }

    /// Context handed to this plugin's components
    pub fn context(&self) -> &Arc<PluginContext> {
        &self.context
    }

    /// Registry of the most recent load
    pub fn registry(&self) -> Arc<ComponentRegistry> {
        self.registry.read().clone()
    }

    /// Get the packet dispatcher
    pub fn dispatcher(&self) -> &PacketDispatcher {
        &self.dispatcher
    }

    /// Class names found by the most recent scan, sorted
    pub fn class_names(&self) -> Vec<String> {
        self.class_names.read().clone()
    }

    /// Whether the plugin is enabling or enabled and has not asked to stop
    pub fn is_active(&self) -> bool {
        self.context.is_active()
    }

    /// Move to `to` if the state table allows it and record its marker
    pub fn transition(&self, to: LifecycleState) -> Result<(), BootError> {
        let from = {
            let mut state = self.state.lock();
            let from = *state;
            if !from.can_transition_to(to) {
                return Err(BootError::InvalidTransition {
                    plugin: self.info.name.clone(),
                    from,
                    to,
                });
            }
            *state = to;
            from
        };

        tracing::debug!("Plugin {} transitioned {} -> {}", self.info.name, from, to);
        if let Some(marker) = to.marker() {
            self.status.set_status(marker);
        }
        Ok(())
    }

    /// Scan, discover every component, then run the load hook.
    ///
    /// Storage, scan and load hook failures leave the plugin `Failed`.
    pub fn load(&self) -> Result<(), BootError> {
        let started = Instant::now();
        self.transition(LifecycleState::LoadInProgress)?;

        if let Err(e) = self.run_load() {
            self.fail(&e);
            return Err(e);
        }

        self.transition(LifecycleState::Loaded)?;
        tracing::info!(
            "Loaded {} v{} in {}ms",
            self.info.name,
            self.info.version,
            started.elapsed().as_millis()
        );
        Ok(())
    }

    fn run_load(&self) -> Result<(), BootError> {
        self.context.create_folder()?;

        let host_config = self.context.host().config();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(host_config.discovery_threads)
            .thread_name({
                let name = self.info.name.to_lowercase();
                move |i| format!("{}-discovery-{}", name, i)
            })
            .build()?;

        let root = host_config.namespace_root(&self.info.name);
        let class_names = pool.install(|| self.scanner.scan(&root))?;

        let registry = ComponentRegistry::new();
        pool.install(|| self.discover(&class_names, &registry));
        tracing::debug!(
            "Discovered {} components in {} classes of {}",
            registry.len(),
            class_names.len(),
            self.info.name
        );

        *self.class_names.write() = class_names;
        *self.registry.write() = Arc::new(registry);

        match catch_unwind(AssertUnwindSafe(|| self.hooks.on_load(self))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(BootError::LoadHook {
                plugin: self.info.name.clone(),
                source,
            }),
            Err(payload) => Err(BootError::LoadHook {
                plugin: self.info.name.clone(),
                source: anyhow::anyhow!("panicked: {}", panic_message(payload.as_ref())),
            }),
        }
    }

    fn fail(&self, error: &BootError) {
        tracing::error!("Plugin {} failed to boot: {}", self.info.name, error);
        self.context.set_active(false);
        self.dispatcher.clear();
        if let Err(e) = self.transition(LifecycleState::Failed) {
            tracing::warn!("{}", e);
        }
    }

    /// Run the four discovery passes concurrently on the current pool
    fn discover(&self, class_names: &[String], registry: &ComponentRegistry) {
        rayon::scope(|scope| {
            for kind in DISCOVERY_PASSES {
                scope.spawn(move |_| self.discover_kind(kind, class_names, registry));
            }
        });
    }

    fn discover_kind(&self, kind: ComponentKind, class_names: &[String], registry: &ComponentRegistry) {
        class_names.par_iter().for_each(|class_name| {
            let Some(declaration) = self.table.get(class_name) else {
                return;
            };
            if !declaration.is_marked(kind) {
                return;
            }

            if let Err(e) = instantiate(declaration).and_then(|component| accept(declaration, component, registry)) {
                match e {
                    ComponentError::KindMismatch { .. } => tracing::warn!("{}", e),
                    _ => tracing::error!("Failed to load {} of {}: {}", kind, self.info.name, e),
                }
            }
        });
    }

    /// Register every component with the host, run the enable hook and
    /// publish the packet index.
    ///
    /// If the hook fails or calls [`PluginContext::request_disable`] the
    /// plugin goes straight through the disable sequence instead. A hook that
    /// calls [`LifecycleController::disable`] itself has already run that
    /// sequence, and enable returns once it sees the plugin disabled.
    pub fn enable(&self) -> Result<(), BootError> {
        let started = Instant::now();
        self.transition(LifecycleState::EnableInProgress)?;
        self.context.set_active(true);

        let registry = self.registry();
        self.register_commands(&registry);
        self.register_event_listeners(&registry);
        let index = self.register_packet_listeners(&registry);
        self.register_inventory_holders(&registry);

        match catch_unwind(AssertUnwindSafe(|| self.hooks.on_enable(self))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!("Enable hook of {} failed: {}", self.info.name, e);
                self.context.request_disable();
            }
            Err(payload) => {
                tracing::error!(
                    "Enable hook of {} panicked: {}",
                    self.info.name,
                    panic_message(payload.as_ref())
                );
                self.context.request_disable();
            }
        }

        if matches!(self.state(), LifecycleState::DisableInProgress | LifecycleState::Disabled) {
            tracing::info!("{} was disabled by its enable hook", self.info.name);
            return Ok(());
        }

        if !self.context.is_active() {
            tracing::info!("{} was deactivated while enabling, disabling", self.info.name);
            self.transition(LifecycleState::DisableInProgress)?;
            return self.run_disable(started);
        }

        self.dispatcher.publish(index);
        self.transition(LifecycleState::Enabled)?;
        tracing::info!("Enabled {} in {}ms", self.info.name, started.elapsed().as_millis());
        Ok(())
    }

    /// Run the disable hook and withdraw everything the plugin registered
    pub fn disable(&self) -> Result<(), BootError> {
        let started = Instant::now();
        self.transition(LifecycleState::DisableInProgress)?;
        self.run_disable(started)
    }

    fn run_disable(&self, started: Instant) -> Result<(), BootError> {
        self.context.set_active(false);

        match catch_unwind(AssertUnwindSafe(|| self.hooks.on_disable(self))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("Disable hook of {} failed: {}", self.info.name, e),
            Err(payload) => tracing::error!(
                "Disable hook of {} panicked: {}",
                self.info.name,
                panic_message(payload.as_ref())
            ),
        }

        self.dispatcher.clear();

        let registry = self.registry();
        registry.mark_all_unregistered();
        for (descriptor, _) in registry.commands() {
            self.services.commands.unbind(&self.info.name, descriptor.name());
        }
        self.services.events.unregister_all(&self.info.name);

        self.transition(LifecycleState::Disabled)?;
        tracing::info!("Disabled {} in {}ms", self.info.name, started.elapsed().as_millis());
        Ok(())
    }

    fn register_commands(&self, registry: &ComponentRegistry) {
        for (descriptor, managed) in registry.commands() {
            match catch_unwind(AssertUnwindSafe(|| self.register_command(&descriptor, managed.instance()))) {
                Ok(Ok(())) => managed.mark_registered(&self.context),
                Ok(Err(e)) => tracing::error!("Failed to register command {}: {}", descriptor, e),
                Err(payload) => tracing::error!(
                    "Command {} panicked while registering: {}",
                    descriptor,
                    panic_message(payload.as_ref())
                ),
            }
        }
    }

    fn register_command(
        &self,
        descriptor: &CommandDescriptor,
        executor: &Arc<dyn crate::command::CommandExecutor>,
    ) -> Result<(), crate::error::HostError> {
        let non_empty = |value: &str| (!value.is_empty()).then(|| value.to_string());
        let permission = non_empty(descriptor.permission());

        if let Some(node) = &permission {
            if !self.services.commands.has_permission(node) {
                self.services.commands.add_permission(PermissionNode {
                    name: node.clone(),
                    default: descriptor.permission_default(),
                    children: descriptor.child_permissions().to_vec(),
                })?;
            }
        }

        if descriptor.is_player_only() {
            let cache = &self.context.host().cache().player_only_commands;
            for label in descriptor.labels() {
                cache.insert(label.to_string());
            }
        }

        self.services.commands.bind(
            &self.info.name,
            CommandBinding {
                name: descriptor.name().to_string(),
                aliases: descriptor.aliases().to_vec(),
                usage: non_empty(descriptor.usage()),
                description: non_empty(descriptor.description()),
                permission,
                executor: Arc::clone(executor),
                grammar: descriptor.grammar().cloned(),
            },
        )
    }

    fn register_event_listeners(&self, registry: &ComponentRegistry) {
        for managed in registry.event_listeners() {
            let listener = Arc::clone(managed.instance());
            match catch_unwind(AssertUnwindSafe(|| self.services.events.register(&self.context, listener))) {
                Ok(Ok(())) => managed.mark_registered(&self.context),
                Ok(Err(e)) => tracing::error!("Failed to register event listener {}: {}", managed.class_name(), e),
                Err(payload) => tracing::error!(
                    "Event listener {} panicked while registering: {}",
                    managed.class_name(),
                    panic_message(payload.as_ref())
                ),
            }
        }
    }

    fn register_packet_listeners(&self, registry: &ComponentRegistry) -> ListenerIndex {
        let mut builder = ListenerIndex::builder();
        for managed in registry.packet_listeners() {
            let listener = Arc::clone(managed.instance());
            match catch_unwind(AssertUnwindSafe(|| {
                builder.add(managed.class_name(), listener, Arc::clone(&self.context));
            })) {
                Ok(()) => managed.mark_registered(&self.context),
                Err(payload) => tracing::error!(
                    "Packet listener {} panicked while reporting its whitelist: {}",
                    managed.class_name(),
                    panic_message(payload.as_ref())
                ),
            }
        }
        builder.build()
    }

    fn register_inventory_holders(&self, registry: &ComponentRegistry) {
        for managed in registry.inventory_holders() {
            match catch_unwind(AssertUnwindSafe(|| managed.instance().register(&self.context))) {
                Ok(Ok(())) => managed.mark_registered(&self.context),
                Ok(Err(e)) => tracing::error!("Failed to register inventory holder {}: {}", managed.class_name(), e),
                Err(payload) => tracing::error!(
                    "Inventory holder {} panicked while registering: {}",
                    managed.class_name(),
                    panic_message(payload.as_ref())
                ),
            }
        }
    }

    /// Deliver an inbound packet to this plugin's listeners
    pub fn call_packet_receive(&self, event: &mut PacketEvent) -> usize {
        self.dispatcher.dispatch_receive(event)
    }

    /// Deliver an outbound packet to this plugin's listeners
    pub fn call_packet_send(&self, event: &mut PacketEvent) -> usize {
        self.dispatcher.dispatch_send(event)
    }

    /// Open the custom inventory of the registered holder class for a player
    pub fn open_inventory(&self, class_name: &str, player: uuid::Uuid) -> anyhow::Result<()> {
        let holder = self
            .registry()
            .inventory_holder(class_name)
            .ok_or_else(|| anyhow::anyhow!("Inventory holder {} is not known to {}", class_name, self.info.name))?;

        if holder.state() != super::ActivationState::Registered {
            anyhow::bail!("Inventory holder {} is not registered", class_name);
        }

        holder.instance().open(&self.context, player)
    }

    /// Get the plugin configuration document
    pub fn config(&self) -> &PluginConfig {
        self.context.config()
    }

    /// Write the default config if missing, then read it
    pub fn load_config(&self) -> Result<(), ConfigError> {
        self.save_default_config()?;
        self.reload_config()
    }

    pub fn reload_config(&self) -> Result<(), ConfigError> {
        self.context.config().reload()
    }

    pub fn save_config(&self) -> Result<(), ConfigError> {
        self.context.config().save()
    }

    pub fn save_default_config(&self) -> Result<bool, ConfigError> {
        self.context.config().save_default()
    }

    pub fn save_resource(&self, path: &str, contents: &[u8], replace: bool) -> std::io::Result<bool> {
        self.context.save_resource(path, contents, replace)
    }
}

impl std::fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleController")
            .field("name", &self.info.name)
            .field("state", &self.state())
            .field("registry", &self.registry())
            .finish_non_exhaustive()
    }
}

/// Construct one component, catching factory errors and panics
fn instantiate(declaration: &ComponentDeclaration) -> Result<Component, ComponentError> {
    match catch_unwind(AssertUnwindSafe(|| declaration.construct())) {
        Ok(Ok(component)) => Ok(component),
        Ok(Err(source)) => Err(ComponentError::Construction {
            class: declaration.class_name().to_string(),
            source,
        }),
        Err(payload) => Err(ComponentError::Panicked {
            class: declaration.class_name().to_string(),
            message: panic_message(payload.as_ref()),
        }),
    }
}

/// Insert a constructed component if it matches its declared marker
fn accept(
    declaration: &ComponentDeclaration,
    component: Component,
    registry: &ComponentRegistry,
) -> Result<(), ComponentError> {
    let class_name = declaration.class_name();
    match (declaration.marker(), component) {
        (Some(ComponentMarker::Command(descriptor)), Component::Command(executor)) => {
            registry.insert_command(descriptor.clone(), class_name, executor);
        }
        (Some(ComponentMarker::EventListener), Component::EventListener(listener)) => {
            registry.insert_event_listener(class_name, listener);
        }
        (Some(ComponentMarker::PacketListener), Component::PacketListener(listener)) => {
            registry.insert_packet_listener(class_name, listener);
        }
        (Some(ComponentMarker::InventoryHolder), Component::InventoryHolder(holder)) => {
            registry.insert_inventory_holder(class_name, holder);
        }
        (Some(marker), component) => {
            return Err(ComponentError::KindMismatch {
                class: class_name.to_string(),
                expected: marker.kind(),
                actual: component.kind(),
            });
        }
        (None, _) => {}
    }
    Ok(())
}
