//! Components and the declaration table that replaces runtime reflection
//!
//! Every component kind is a trait object behind one [`Component`] sum type.
//! Classes are declared once, either with hand-written
//! [`ComponentTable::register`] calls or with [`declare_component!`], which
//! collects declarations at link time.

use crate::command::{CommandDescriptor, CommandExecutor};
use crate::context::PluginContext;
use crate::packet::PacketListener;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// The four component kinds a plugin can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentKind {
    Command,
    EventListener,
    PacketListener,
    InventoryHolder,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command => write!(f, "command"),
            Self::EventListener => write!(f, "event listener"),
            Self::PacketListener => write!(f, "packet listener"),
            Self::InventoryHolder => write!(f, "inventory holder"),
        }
    }
}

/// Listener submitted to the host event bus.
///
/// The host binds handler methods by its own convention and can downcast
/// through [`EventListener::as_any`] to reach them.
pub trait EventListener: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// Holder of a custom inventory that can be opened for players
pub trait InventoryHolder: Send + Sync {
    /// Called once per enable cycle with the owning plugin
    fn register(&self, _plugin: &PluginContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Open the inventory for the player
    fn open(&self, plugin: &PluginContext, player: uuid::Uuid) -> anyhow::Result<()>;
}

/// A constructed component, one variant per kind
#[derive(Clone)]
pub enum Component {
    Command(Arc<dyn CommandExecutor>),
    EventListener(Arc<dyn EventListener>),
    PacketListener(Arc<dyn PacketListener>),
    InventoryHolder(Arc<dyn InventoryHolder>),
}

impl Component {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Self::Command(_) => ComponentKind::Command,
            Self::EventListener(_) => ComponentKind::EventListener,
            Self::PacketListener(_) => ComponentKind::PacketListener,
            Self::InventoryHolder(_) => ComponentKind::InventoryHolder,
        }
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self.kind())
    }
}

/// Marker attached to a declared class, the analogue of an annotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentMarker {
    Command(CommandDescriptor),
    EventListener,
    PacketListener,
    InventoryHolder,
}

impl ComponentMarker {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Self::Command(_) => ComponentKind::Command,
            Self::EventListener => ComponentKind::EventListener,
            Self::PacketListener => ComponentKind::PacketListener,
            Self::InventoryHolder => ComponentKind::InventoryHolder,
        }
    }
}

/// Activation state of a managed component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivationState {
    Discovered,
    Registered,
    Unregistered,
}

/// A discovered component instance with its identity and activation state
pub struct Managed<T: ?Sized> {
    class_name: String,
    instance: Arc<T>,
    state: Mutex<ActivationState>,
    owner: OnceLock<Arc<PluginContext>>,
}

impl<T: ?Sized> Managed<T> {
    pub fn new(class_name: impl Into<String>, instance: Arc<T>) -> Self {
        Self {
            class_name: class_name.into(),
            instance,
            state: Mutex::new(ActivationState::Discovered),
            owner: OnceLock::new(),
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn instance(&self) -> &Arc<T> {
        &self.instance
    }

    pub fn state(&self) -> ActivationState {
        *self.state.lock()
    }

    /// The owning plugin, available once the component has been registered
    pub fn owner(&self) -> Option<&Arc<PluginContext>> {
        self.owner.get()
    }

    /// Attach the owner (first registration only) and mark as registered
    pub(crate) fn mark_registered(&self, owner: &Arc<PluginContext>) {
        // The owner never changes after the first registration
        let _ = self.owner.set(Arc::clone(owner));
        *self.state.lock() = ActivationState::Registered;
    }

    pub(crate) fn mark_unregistered(&self) {
        let mut state = self.state.lock();
        if *state == ActivationState::Registered {
            *state = ActivationState::Unregistered;
        }
    }
}

impl<T: ?Sized> fmt::Debug for Managed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Managed")
            .field("class_name", &self.class_name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Factory building one component instance
pub type ComponentFactory = Arc<dyn Fn() -> anyhow::Result<Component> + Send + Sync>;

/// One declared class: its name, optional marker and factory
#[derive(Clone)]
pub struct ComponentDeclaration {
    class_name: String,
    marker: Option<ComponentMarker>,
    factory: ComponentFactory,
}

impl ComponentDeclaration {
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn marker(&self) -> Option<&ComponentMarker> {
        self.marker.as_ref()
    }

    /// Whether the class is marked as the given kind
    pub fn is_marked(&self, kind: ComponentKind) -> bool {
        self.marker.as_ref().is_some_and(|marker| marker.kind() == kind)
    }

    pub fn construct(&self) -> anyhow::Result<Component> {
        (self.factory)()
    }
}

impl fmt::Debug for ComponentDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDeclaration")
            .field("class_name", &self.class_name)
            .field("marker", &self.marker)
            .finish_non_exhaustive()
    }
}

/// Declaration collected at link time through [`declare_component!`]
pub struct StaticDeclaration {
    pub class_name: &'static str,
    pub marker: StaticMarker,
    pub factory: fn() -> anyhow::Result<Component>,
}

/// Const-constructible form of [`ComponentMarker`]
#[derive(Clone, Copy)]
pub enum StaticMarker {
    None,
    Command(fn() -> CommandDescriptor),
    EventListener,
    PacketListener,
    InventoryHolder,
}

impl StaticMarker {
    fn resolve(self) -> Option<ComponentMarker> {
        match self {
            Self::None => None,
            Self::Command(descriptor) => Some(ComponentMarker::Command(descriptor())),
            Self::EventListener => Some(ComponentMarker::EventListener),
            Self::PacketListener => Some(ComponentMarker::PacketListener),
            Self::InventoryHolder => Some(ComponentMarker::InventoryHolder),
        }
    }
}

inventory::collect!(StaticDeclaration);

/// Declare a component class once; it is collected into
/// [`ComponentTable::collected`] at process start.
///
/// ```ignore
/// declare_component!("whomine.msessentials.listener.PlayerJoin", event_listener, || {
///     Ok(Component::EventListener(Arc::new(PlayerJoinListener)))
/// });
/// declare_component!("whomine.msessentials.command.Mute", command(mute_descriptor), || {
///     Ok(Component::Command(Arc::new(MuteCommand)))
/// });
/// ```
#[macro_export]
macro_rules! declare_component {
    (@marker untagged) => { $crate::plugin::StaticMarker::None };
    (@marker command($descriptor:expr)) => { $crate::plugin::StaticMarker::Command($descriptor) };
    (@marker event_listener) => { $crate::plugin::StaticMarker::EventListener };
    (@marker packet_listener) => { $crate::plugin::StaticMarker::PacketListener };
    (@marker inventory_holder) => { $crate::plugin::StaticMarker::InventoryHolder };
    ($class:expr, $kind:ident $(($descriptor:expr))?, $factory:expr) => {
        $crate::inventory::submit! {
            $crate::plugin::StaticDeclaration {
                class_name: $class,
                marker: $crate::declare_component!(@marker $kind $(($descriptor))?),
                factory: $factory,
            }
        }
    };
}

/// Table of declared classes keyed by fully-qualified class name
#[derive(Default)]
pub struct ComponentTable {
    declarations: BTreeMap<String, ComponentDeclaration>,
}

impl ComponentTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table of every declaration submitted through [`declare_component!`]
    pub fn collected() -> Self {
        let mut table = Self::new();
        for declaration in inventory::iter::<StaticDeclaration> {
            let factory = declaration.factory;
            table.insert(ComponentDeclaration {
                class_name: declaration.class_name.to_string(),
                marker: declaration.marker.resolve(),
                factory: Arc::new(factory),
            });
        }
        table
    }

    /// Declare a class. Declaring the same class twice keeps the last one.
    pub fn register<F>(&mut self, class_name: impl Into<String>, marker: Option<ComponentMarker>, factory: F) -> &mut Self
    where
        F: Fn() -> anyhow::Result<Component> + Send + Sync + 'static,
    {
        self.insert(ComponentDeclaration {
            class_name: class_name.into(),
            marker,
            factory: Arc::new(factory),
        });
        self
    }

    fn insert(&mut self, declaration: ComponentDeclaration) {
        if let Some(previous) = self.declarations.insert(declaration.class_name.clone(), declaration) {
            tracing::debug!("Class {} declared twice, keeping the last declaration", previous.class_name);
        }
    }

    pub fn get(&self, class_name: &str) -> Option<&ComponentDeclaration> {
        self.declarations.get(class_name)
    }

    /// Declared class names in lexicographic order
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.declarations.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

impl fmt::Debug for ComponentTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentTable")
            .field("declarations", &self.declarations.len())
            .finish()
    }
}
