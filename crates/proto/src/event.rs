//! Packet events handed to plugins by the host network layer

use crate::packet::PacketType;
use bytes::Bytes;
use std::net::SocketAddr;
use uuid::Uuid;

/// A protocol message together with its type
#[derive(Debug, Clone)]
pub struct PacketContainer {
    packet_type: PacketType,
    payload: Bytes,
}

impl PacketContainer {
    pub fn new(packet_type: PacketType, payload: Bytes) -> Self {
        Self {
            packet_type,
            payload,
        }
    }

    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    /// Raw message body as received or about to be sent
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Replace the message body
    pub fn set_payload(&mut self, payload: Bytes) {
        self.payload = payload;
    }
}

/// The connection a packet travels over
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Remote address of the client
    pub address: SocketAddr,
    /// Player bound to the connection, once login has completed
    pub player: Option<Uuid>,
}

impl Connection {
    pub fn new(address: SocketAddr) -> Self {
        Self {
            address,
            player: None,
        }
    }

    pub fn with_player(mut self, player: Uuid) -> Self {
        self.player = Some(player);
        self
    }
}

/// An inbound or outbound packet passing through the host
#[derive(Debug, Clone)]
pub struct PacketEvent {
    container: PacketContainer,
    connection: Connection,
    cancelled: bool,
}

impl PacketEvent {
    pub fn new(container: PacketContainer, connection: Connection) -> Self {
        Self {
            container,
            connection,
            cancelled: false,
        }
    }

    pub fn packet_type(&self) -> PacketType {
        self.container.packet_type()
    }

    pub fn container(&self) -> &PacketContainer {
        &self.container
    }

    pub fn container_mut(&mut self) -> &mut PacketContainer {
        &mut self.container
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// A cancelled packet is dropped by the host after dispatch completes.
    /// Listeners later in the chain still see it.
    pub fn set_cancelled(&mut self, cancelled: bool) {
        self.cancelled = cancelled;
    }
}
