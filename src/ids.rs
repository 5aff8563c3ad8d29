//! Opaque identifiers for the entities that make up a [`crate::model::world::World`].
//!
//! Interfaces and connections reference each other by id rather than by
//! pointer, matching the arena+index design called out in the source
//! material's design notes: lookups stay O(1) and nothing ever needs to
//! move.

use std::fmt;

macro_rules! newtype_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u64);

        impl $name {
            pub fn raw(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

newtype_id!(DeviceId);
newtype_id!(ConnectionId);
newtype_id!(PacketId);

/// Hands out monotonically increasing ids for one entity kind.
///
/// Kept deterministic on purpose: two identically-sequenced edits of a
/// [`crate::model::world::World`] produce identical ids, which is what
/// makes the round-trip/idempotence properties in the spec checkable.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdGen {
    devices: u64,
    connections: u64,
    packets: u64,
}

impl IdGen {
    pub fn next_device(&mut self) -> DeviceId {
        let id = self.devices;
        self.devices += 1;
        DeviceId(id)
    }

    pub fn next_connection(&mut self) -> ConnectionId {
        let id = self.connections;
        self.connections += 1;
        ConnectionId(id)
    }

    pub fn next_packet(&mut self) -> PacketId {
        let id = self.packets;
        self.packets += 1;
        PacketId(id)
    }
}
