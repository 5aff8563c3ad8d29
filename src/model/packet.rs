//! The unit the engine moves (§3 Packet).
//!
//! Per the design notes, the flat packet record is replaced with a tagged
//! union over `kind` carrying only the fields relevant to that kind —
//! there is no way to "forget to set a field" on an ARP packet and have a
//! stray TCP flag survive.

use std::net::Ipv4Addr;

use crate::ids::{ConnectionId, DeviceId, PacketId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AtDevice,
    OnLink { progress: u32 },
    Buffered,
    Arrived,
    Dropped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpOp {
    Request,
    Reply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcpFlag {
    Syn,
    Ack,
    Fin,
    Rst,
    Psh,
}

#[derive(Debug, Clone, Default)]
pub struct TcpFlags {
    pub syn: bool,
    pub ack: bool,
    pub fin: bool,
    pub rst: bool,
    pub psh: bool,
}

impl TcpFlags {
    pub fn with(flags: &[TcpFlag]) -> Self {
        let mut f = Self::default();
        for flag in flags {
            match flag {
                TcpFlag::Syn => f.syn = true,
                TcpFlag::Ack => f.ack = true,
                TcpFlag::Fin => f.fin = true,
                TcpFlag::Rst => f.rst = true,
                TcpFlag::Psh => f.psh = true,
            }
        }
        f
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpType {
    EchoReply,
    DestinationUnreachable,
    EchoRequest,
    TimeExceeded,
}

impl IcmpType {
    pub fn code(self) -> u8 {
        match self {
            IcmpType::EchoReply => 0,
            IcmpType::DestinationUnreachable => 3,
            IcmpType::EchoRequest => 8,
            IcmpType::TimeExceeded => 11,
        }
    }
}

/// code 0 = network-unreachable variant, code 1 = host-unreachable
/// (supplemental, used by the ARP-retry-exhaustion path).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpCode {
    NetworkUnreachable,
    HostUnreachable,
    Na,
}

impl IcmpCode {
    pub fn value(self) -> u8 {
        match self {
            IcmpCode::NetworkUnreachable => 0,
            IcmpCode::HostUnreachable => 1,
            IcmpCode::Na => 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IcmpUnreachablePayload {
    pub original_dest_ip: Ipv4Addr,
    pub original_source_ip: Ipv4Addr,
    pub original_type: String,
}

#[derive(Debug, Clone)]
pub enum DhcpMessageType {
    Discover,
    Offer,
    Request,
    Ack,
}

#[derive(Debug, Clone)]
pub struct BpduPayload {
    pub root_bridge_id: String,
    pub root_path_cost: u32,
    pub sender_bridge_id: String,
    pub sender_port_id: String,
    pub message_age: u32,
    pub max_age: u32,
    pub hello_time: u32,
    pub forward_delay: u32,
    pub topology_change: bool,
}

#[derive(Debug, Clone)]
pub enum Payload {
    None,
    Arp {
        op: ArpOp,
        sender_ip: Ipv4Addr,
        sender_mac: String,
        target_ip: Ipv4Addr,
        target_mac: String,
    },
    Icmp {
        icmp_type: IcmpType,
        code: IcmpCode,
        seq: u32,
        unreachable: Option<IcmpUnreachablePayload>,
    },
    Tcp {
        src_port: u16,
        dst_port: u16,
        flags: TcpFlags,
        seq: u32,
        ack: u32,
        payload_len: u32,
    },
    Dhcp {
        message_type: DhcpMessageType,
        client_mac: String,
        offered_ip: Option<Ipv4Addr>,
    },
    Bpdu(BpduPayload),
    Cdp {
        hostname: String,
        device_kind: String,
        local_interface: String,
    },
    Opaque,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    Icmp,
    Tcp,
    Udp,
    Arp,
    Dhcp,
    Dns,
    Http,
    Https,
    Stp,
    Cdp,
}

#[derive(Debug, Clone)]
pub struct Packet {
    pub id: PacketId,
    pub kind: PacketKind,

    pub source_mac: String,
    pub dest_mac: String,
    pub vlan_tag: Option<u16>,

    pub source_ip: Option<Ipv4Addr>,
    pub dest_ip: Option<Ipv4Addr>,
    pub ttl: u8,
    pub size: u32,

    pub payload: Payload,

    pub current_device: DeviceId,
    pub last_device: Option<DeviceId>,
    pub target_device: Option<DeviceId>,
    pub ingress_interface: Option<String>,
    pub egress_interface: Option<String>,
    /// The connection currently (or most recently) being traversed. Not
    /// part of the spec's packet attributes; an internal bookkeeping field
    /// so the scheduler and the link processor don't have to re-derive a
    /// connection from a `(current, target)` device pair.
    pub link: Option<ConnectionId>,

    pub stage: Stage,
    pub waiting_for_arp: Option<Ipv4Addr>,
    pub arp_retries: u32,

    pub path: Vec<DeviceId>,
    pub is_locally_generated: bool,
}

impl Packet {
    pub fn new(id: PacketId, kind: PacketKind, current_device: DeviceId) -> Self {
        Self {
            id,
            kind,
            source_mac: String::new(),
            dest_mac: String::new(),
            vlan_tag: None,
            source_ip: None,
            dest_ip: None,
            ttl: 64,
            size: 64,
            payload: Payload::None,
            current_device,
            last_device: None,
            target_device: None,
            ingress_interface: None,
            egress_interface: None,
            link: None,
            stage: Stage::AtDevice,
            waiting_for_arp: None,
            arp_retries: 0,
            path: vec![current_device],
            is_locally_generated: false,
        }
    }

    pub fn is_broadcast_or_multicast(&self) -> bool {
        crate::addr::is_broadcast_mac(&self.dest_mac) || crate::addr::is_multicast_mac(&self.dest_mac)
    }
}
