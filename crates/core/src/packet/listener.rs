//! Packet listener contract

use crate::context::PluginContext;
use proto::{PacketEvent, PacketType};
use std::collections::HashSet;

/// Packet types a listener wants delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketWhitelist {
    /// An explicit, finite set of packet types
    Types(HashSet<PacketType>),
    /// Every packet type
    All,
}

impl PacketWhitelist {
    pub fn of<I>(types: I) -> Self
    where
        I: IntoIterator<Item = PacketType>,
    {
        Self::Types(types.into_iter().collect())
    }

    pub fn contains(&self, packet_type: &PacketType) -> bool {
        match self {
            Self::Types(types) => types.contains(packet_type),
            Self::All => true,
        }
    }
}

/// Listener receiving packets travelling through the host.
///
/// Hooks run synchronously on the network thread delivering the packet and
/// must not block.
pub trait PacketListener: Send + Sync {
    /// Declared type interest, read once per enable cycle
    fn whitelist(&self) -> PacketWhitelist;

    /// A packet was received from a client
    fn on_packet_receive(&self, _plugin: &PluginContext, _event: &mut PacketEvent) -> anyhow::Result<()> {
        Ok(())
    }

    /// A packet is about to be sent to a client
    fn on_packet_send(&self, _plugin: &PluginContext, _event: &mut PacketEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proto::{PacketFlow, Protocol};

    const SIGN: PacketType = PacketType::new(Protocol::Play, PacketFlow::Serverbound, 0x36, "update_sign");
    const CHAT: PacketType = PacketType::new(Protocol::Play, PacketFlow::Clientbound, 0x6c, "system_chat");

    #[test]
    fn test_whitelist_contains() {
        let whitelist = PacketWhitelist::of([SIGN, SIGN]);
        assert!(whitelist.contains(&SIGN));
        assert!(!whitelist.contains(&CHAT));
        assert!(PacketWhitelist::All.contains(&CHAT));

        match whitelist {
            PacketWhitelist::Types(types) => assert_eq!(types.len(), 1),
            PacketWhitelist::All => panic!("expected an explicit whitelist"),
        }
    }
}
