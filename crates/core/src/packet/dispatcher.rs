//! Type-routed packet dispatch
//!
//! The [`ListenerIndex`] is built once per enable cycle and published as an
//! immutable `Arc`. Until an index is published every lookup is empty, so the
//! host network layer may deliver packets while the plugin is still enabling.

use crate::context::PluginContext;
use crate::error::{panic_message, ListenerFault};
use crate::packet::{PacketListener, PacketWhitelist};
use parking_lot::RwLock;
use proto::{PacketEvent, PacketType};
use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Direction of a dispatched packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Receive,
    Send,
}

impl Delivery {
    fn hook(self) -> &'static str {
        match self {
            Self::Receive => "on_packet_receive",
            Self::Send => "on_packet_send",
        }
    }
}

/// A listener as stored in the index
#[derive(Clone)]
pub struct IndexedListener {
    class_name: Arc<str>,
    listener: Arc<dyn PacketListener>,
    owner: Arc<PluginContext>,
}

impl IndexedListener {
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    fn same_listener(&self, other: &Self) -> bool {
        Arc::as_ptr(&self.listener).cast::<()>() == Arc::as_ptr(&other.listener).cast::<()>()
    }

    fn deliver(&self, event: &mut PacketEvent, delivery: Delivery) -> Result<(), ListenerFault> {
        let result = catch_unwind(AssertUnwindSafe(|| match delivery {
            Delivery::Receive => self.listener.on_packet_receive(&self.owner, event),
            Delivery::Send => self.listener.on_packet_send(&self.owner, event),
        }));

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(ListenerFault::Failed {
                listener: self.class_name.to_string(),
                hook: delivery.hook(),
                source,
            }),
            Err(payload) => Err(ListenerFault::Panicked {
                listener: self.class_name.to_string(),
                hook: delivery.hook(),
                message: panic_message(payload.as_ref()),
            }),
        }
    }
}

/// Mapping from packet type to the listeners interested in it
#[derive(Default)]
pub struct ListenerIndex {
    by_type: HashMap<PacketType, Vec<IndexedListener>>,
    /// Listeners whitelisting every type, used for types nobody named explicitly
    wildcard: Vec<IndexedListener>,
    listeners: usize,
}

impl ListenerIndex {
    pub fn builder() -> ListenerIndexBuilder {
        ListenerIndexBuilder::default()
    }

    /// Listeners for the packet type, in registration order
    pub fn listeners(&self, packet_type: &PacketType) -> &[IndexedListener] {
        self.by_type
            .get(packet_type)
            .map_or(self.wildcard.as_slice(), Vec::as_slice)
    }

    pub fn contains_packet_type(&self, packet_type: &PacketType) -> bool {
        !self.listeners(packet_type).is_empty()
    }

    /// Number of distinct listeners in the index
    pub fn listener_count(&self) -> usize {
        self.listeners
    }
}

/// Collects listeners in registration order and builds a [`ListenerIndex`]
#[derive(Default)]
pub struct ListenerIndexBuilder {
    entries: Vec<(IndexedListener, PacketWhitelist)>,
}

impl ListenerIndexBuilder {
    /// Add a listener, reading its whitelist once
    pub fn add(&mut self, class_name: &str, listener: Arc<dyn PacketListener>, owner: Arc<PluginContext>) -> &mut Self {
        let whitelist = listener.whitelist();
        let entry = IndexedListener {
            class_name: Arc::from(class_name),
            listener,
            owner,
        };

        if self.entries.iter().any(|(existing, _)| existing.same_listener(&entry)) {
            tracing::debug!("Packet listener {} added twice, ignoring the duplicate", class_name);
        } else {
            self.entries.push((entry, whitelist));
        }

        self
    }

    pub fn build(self) -> ListenerIndex {
        let named: HashSet<PacketType> = self
            .entries
            .iter()
            .filter_map(|(_, whitelist)| match whitelist {
                PacketWhitelist::Types(types) => Some(types.iter().copied()),
                PacketWhitelist::All => None,
            })
            .flatten()
            .collect();

        let mut by_type: HashMap<PacketType, Vec<IndexedListener>> =
            named.into_iter().map(|packet_type| (packet_type, Vec::new())).collect();
        let mut wildcard = Vec::new();
        let listeners = self.entries.len();

        for (entry, whitelist) in self.entries {
            match whitelist {
                PacketWhitelist::Types(types) => {
                    for packet_type in types {
                        if let Some(bucket) = by_type.get_mut(&packet_type) {
                            bucket.push(entry.clone());
                        }
                    }
                }
                PacketWhitelist::All => {
                    for bucket in by_type.values_mut() {
                        bucket.push(entry.clone());
                    }
                    wildcard.push(entry);
                }
            }
        }

        ListenerIndex {
            by_type,
            wildcard,
            listeners,
        }
    }
}

/// Routes packet events to the listeners of the published index
#[derive(Default)]
pub struct PacketDispatcher {
    index: RwLock<Option<Arc<ListenerIndex>>>,
}

impl PacketDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current index wholesale
    pub fn publish(&self, index: ListenerIndex) {
        tracing::debug!("Publishing packet listener index with {} listeners", index.listener_count());
        *self.index.write() = Some(Arc::new(index));
    }

    /// Withdraw the index; subsequent lookups are empty. Dispatches already
    /// in progress keep their snapshot and run to completion.
    pub fn clear(&self) {
        *self.index.write() = None;
    }

    /// Whether an index is currently published
    pub fn is_ready(&self) -> bool {
        self.index.read().is_some()
    }

    fn current(&self) -> Option<Arc<ListenerIndex>> {
        self.index.read().clone()
    }

    /// Number of listeners a packet of this type would reach
    pub fn listener_count(&self, packet_type: &PacketType) -> usize {
        self.current().map_or(0, |index| index.listeners(packet_type).len())
    }

    /// Deliver an inbound packet. Returns the number of listeners invoked.
    pub fn dispatch_receive(&self, event: &mut PacketEvent) -> usize {
        self.dispatch(event, Delivery::Receive)
    }

    /// Deliver an outbound packet. Returns the number of listeners invoked.
    pub fn dispatch_send(&self, event: &mut PacketEvent) -> usize {
        self.dispatch(event, Delivery::Send)
    }

    fn dispatch(&self, event: &mut PacketEvent, delivery: Delivery) -> usize {
        let Some(index) = self.current() else {
            return 0;
        };

        let listeners = index.listeners(&event.packet_type());
        for listener in listeners {
            if let Err(fault) = listener.deliver(event, delivery) {
                tracing::error!("{}", fault);
            }
        }

        listeners.len()
    }
}
