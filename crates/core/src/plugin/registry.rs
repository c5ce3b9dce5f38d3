//! Component registry for a single plugin load
//!
//! Discovery passes insert into the registry from many threads at once. Every
//! insert is a single short critical section and all read accessors return
//! owned snapshots.

use super::component::{EventListener, InventoryHolder, Managed};
use crate::command::{CommandDescriptor, CommandExecutor};
use crate::packet::PacketListener;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

pub type ManagedCommand = Managed<dyn CommandExecutor>;
pub type ManagedEventListener = Managed<dyn EventListener>;
pub type ManagedPacketListener = Managed<dyn PacketListener>;
pub type ManagedInventoryHolder = Managed<dyn InventoryHolder>;

/// Registry of the components discovered for one plugin.
///
/// Inserting a key that is already present replaces the previous entry.
#[derive(Default)]
pub struct ComponentRegistry {
    /// Command descriptor to executor
    commands: DashMap<CommandDescriptor, Arc<ManagedCommand>>,
    /// Holder class name to holder
    inventory_holders: DashMap<String, Arc<ManagedInventoryHolder>>,
    /// Event listeners ordered by class name
    event_listeners: Mutex<BTreeMap<String, Arc<ManagedEventListener>>>,
    /// Packet listeners ordered by class name
    packet_listeners: Mutex<BTreeMap<String, Arc<ManagedPacketListener>>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a command executor under its descriptor
    pub fn insert_command(
        &self,
        descriptor: CommandDescriptor,
        class_name: &str,
        executor: Arc<dyn CommandExecutor>,
    ) -> Arc<ManagedCommand> {
        let managed = Arc::new(Managed::new(class_name, executor));
        if let Some(previous) = self.commands.insert(descriptor.clone(), Arc::clone(&managed)) {
            tracing::debug!(
                "Command {} from {} replaced by {}",
                descriptor,
                previous.class_name(),
                class_name
            );
        }
        managed
    }

    /// Insert an inventory holder under its class name
    pub fn insert_inventory_holder(
        &self,
        class_name: &str,
        holder: Arc<dyn InventoryHolder>,
    ) -> Arc<ManagedInventoryHolder> {
        let managed = Arc::new(Managed::new(class_name, holder));
        if self
            .inventory_holders
            .insert(class_name.to_string(), Arc::clone(&managed))
            .is_some()
        {
            tracing::debug!("Inventory holder {} replaced", class_name);
        }
        managed
    }

    /// Insert an event listener under its class name
    pub fn insert_event_listener(
        &self,
        class_name: &str,
        listener: Arc<dyn EventListener>,
    ) -> Arc<ManagedEventListener> {
        let managed = Arc::new(Managed::new(class_name, listener));
        if self
            .event_listeners
            .lock()
            .insert(class_name.to_string(), Arc::clone(&managed))
            .is_some()
        {
            tracing::debug!("Event listener {} replaced", class_name);
        }
        managed
    }

    /// Insert a packet listener under its class name
    pub fn insert_packet_listener(
        &self,
        class_name: &str,
        listener: Arc<dyn PacketListener>,
    ) -> Arc<ManagedPacketListener> {
        let managed = Arc::new(Managed::new(class_name, listener));
        if self
            .packet_listeners
            .lock()
            .insert(class_name.to_string(), Arc::clone(&managed))
            .is_some()
        {
            tracing::debug!("Packet listener {} replaced", class_name);
        }
        managed
    }

    /// Snapshot of the commands, ordered by command name
    pub fn commands(&self) -> Vec<(CommandDescriptor, Arc<ManagedCommand>)> {
        let mut commands: Vec<_> = self
            .commands
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        commands.sort_by(|(a, _), (b, _)| a.name().cmp(b.name()));
        commands
    }

    /// Snapshot of the inventory holders, ordered by class name
    pub fn inventory_holders(&self) -> Vec<Arc<ManagedInventoryHolder>> {
        let mut holders: Vec<_> = self
            .inventory_holders
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        holders.sort_by(|a, b| a.class_name().cmp(b.class_name()));
        holders
    }

    /// Snapshot of the event listeners, ordered by class name
    pub fn event_listeners(&self) -> Vec<Arc<ManagedEventListener>> {
        self.event_listeners.lock().values().cloned().collect()
    }

    /// Snapshot of the packet listeners, ordered by class name
    pub fn packet_listeners(&self) -> Vec<Arc<ManagedPacketListener>> {
        self.packet_listeners.lock().values().cloned().collect()
    }

    /// Look up a command by name or alias
    pub fn command(&self, label: &str) -> Option<Arc<ManagedCommand>> {
        self.commands
            .iter()
            .find(|entry| entry.key().labels().any(|l| l == label))
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Look up an inventory holder by class name
    pub fn inventory_holder(&self, class_name: &str) -> Option<Arc<ManagedInventoryHolder>> {
        self.inventory_holders
            .get(class_name)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Get number of commands
    pub fn len_commands(&self) -> usize {
        self.commands.len()
    }

    /// Get number of inventory holders
    pub fn len_inventory_holders(&self) -> usize {
        self.inventory_holders.len()
    }

    /// Get number of event listeners
    pub fn len_event_listeners(&self) -> usize {
        self.event_listeners.lock().len()
    }

    /// Get number of packet listeners
    pub fn len_packet_listeners(&self) -> usize {
        self.packet_listeners.lock().len()
    }

    /// Total number of components across all kinds
    pub fn len(&self) -> usize {
        self.len_commands() + self.len_inventory_holders() + self.len_event_listeners() + self.len_packet_listeners()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mark every registered component as unregistered
    pub(crate) fn mark_all_unregistered(&self) {
        for entry in self.commands.iter() {
            entry.value().mark_unregistered();
        }
        for entry in self.inventory_holders.iter() {
            entry.value().mark_unregistered();
        }
        for listener in self.event_listeners.lock().values() {
            listener.mark_unregistered();
        }
        for listener in self.packet_listeners.lock().values() {
            listener.mark_unregistered();
        }
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("commands", &self.len_commands())
            .field("inventory_holders", &self.len_inventory_holders())
            .field("event_listeners", &self.len_event_listeners())
            .field("packet_listeners", &self.len_packet_listeners())
            .finish()
    }
}
