//! Packet listeners and type-routed dispatch

pub mod dispatcher;
pub mod listener;

pub use dispatcher::{Delivery, IndexedListener, ListenerIndex, ListenerIndexBuilder, PacketDispatcher};
pub use listener::{PacketListener, PacketWhitelist};
