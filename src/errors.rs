//! Closed error surface for every user-invoked (configuration-style)
//! operation on a [`crate::model::world::World`].
//!
//! Packet-path failures (no route, TTL expiry, firewall deny, STP block)
//! never produce a `SimError` — they are encoded as engine outputs
//! (an ICMP packet, or no output at all) and are never unwound, per the
//! error handling design.

use crate::ids::{ConnectionId, DeviceId};

#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum SimError {
    #[error("device {0} does not exist")]
    DeviceNotFound(DeviceId),

    #[error("connection {0} does not exist")]
    ConnectionNotFound(ConnectionId),

    #[error("device {device} has no interface named {interface}")]
    InterfaceNotFound { device: DeviceId, interface: String },

    #[error("interface {interface} on device {device} is already connected")]
    InterfaceAlreadyConnected { device: DeviceId, interface: String },

    #[error("vlan id {0} is out of range (expected 1..=4094)")]
    InvalidVlanId(u16),

    #[error("vlan 1 is the default vlan and cannot be removed")]
    CannotRemoveDefaultVlan,

    #[error("vlan {0} does not exist on this switch")]
    VlanNotFound(u16),

    #[error("invalid IPv4 address: {0}")]
    InvalidIpAddress(String),

    #[error("invalid subnet mask: {0}")]
    InvalidMask(String),

    #[error("invalid CIDR notation: {0}")]
    InvalidCidr(String),

    #[error("route for {network}/{mask} does not exist")]
    RouteNotFound { network: String, mask: String },

    #[error("a connected route cannot be mutated or removed directly")]
    ConnectedRouteIsReadOnly,

    #[error("DHCP server on this interface requires a configured IPv4 address")]
    DhcpServerNeedsInterfaceIp,

    #[error("device {0} does not support this operation")]
    UnsupportedDeviceKind(DeviceId),

    #[error("SVI for vlan {0} does not exist")]
    SviNotFound(u16),

    #[error("no TCP listener on port {0}")]
    NoListener(u16),

    #[error("no established TCP connection on local port {local_port} to remote port {remote_port}")]
    TcpNotEstablished { local_port: u16, remote_port: u16 },
}

pub type SimResult<T> = Result<T, SimError>;
