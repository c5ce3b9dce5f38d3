//! Packet type identifiers

use std::fmt;
use std::hash::{Hash, Hasher};

/// Connection protocol phase a packet belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Protocol {
    Handshake,
    Status,
    Login,
    Configuration,
    Play,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handshake => write!(f, "handshake"),
            Self::Status => write!(f, "status"),
            Self::Login => write!(f, "login"),
            Self::Configuration => write!(f, "configuration"),
            Self::Play => write!(f, "play"),
        }
    }
}

/// Direction a packet travels in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PacketFlow {
    /// Client to server
    Serverbound,
    /// Server to client
    Clientbound,
}

impl fmt::Display for PacketFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serverbound => write!(f, "serverbound"),
            Self::Clientbound => write!(f, "clientbound"),
        }
    }
}

/// Identity of a protocol message type.
///
/// Two packet types are equal when protocol, flow and id match. The name is
/// informational only and does not take part in equality or hashing.
#[derive(Debug, Clone, Copy)]
pub struct PacketType {
    protocol: Protocol,
    flow: PacketFlow,
    id: u32,
    name: &'static str,
}

impl PacketType {
    /// Create a new packet type identifier
    pub const fn new(protocol: Protocol, flow: PacketFlow, id: u32, name: &'static str) -> Self {
        Self {
            protocol,
            flow,
            id,
            name,
        }
    }

    pub const fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub const fn flow(&self) -> PacketFlow {
        self.flow
    }

    pub const fn id(&self) -> u32 {
        self.id
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Whether this packet is sent by the client
    pub const fn is_serverbound(&self) -> bool {
        matches!(self.flow, PacketFlow::Serverbound)
    }
}

impl PartialEq for PacketType {
    fn eq(&self, other: &Self) -> bool {
        self.protocol == other.protocol && self.flow == other.flow && self.id == other.id
    }
}

impl Eq for PacketType {}

impl Hash for PacketType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.protocol.hash(state);
        self.flow.hash(state);
        self.id.hash(state);
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{:#04x} ({})", self.protocol, self.flow, self.id, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const UPDATE_SIGN: PacketType = PacketType::new(Protocol::Play, PacketFlow::Serverbound, 0x36, "update_sign");

    #[test]
    fn test_name_does_not_affect_identity() {
        let renamed = PacketType::new(Protocol::Play, PacketFlow::Serverbound, 0x36, "sign_update");
        assert_eq!(UPDATE_SIGN, renamed);

        let mut set = HashSet::new();
        set.insert(UPDATE_SIGN);
        assert!(set.contains(&renamed));
    }

    #[test]
    fn test_flow_distinguishes_types() {
        let clientbound = PacketType::new(Protocol::Play, PacketFlow::Clientbound, 0x36, "update_sign");
        assert_ne!(UPDATE_SIGN, clientbound);
        assert!(UPDATE_SIGN.is_serverbound());
        assert!(!clientbound.is_serverbound());
    }

    #[test]
    fn test_display() {
        assert_eq!(UPDATE_SIGN.to_string(), "play/serverbound/0x36 (update_sign)");
    }
}
