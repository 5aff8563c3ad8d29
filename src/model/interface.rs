//! Interface (§3 Interface).

use std::net::Ipv4Addr;

use crate::ids::ConnectionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VlanMode {
    Access,
    Trunk,
}

impl Default for VlanMode {
    fn default() -> Self {
        VlanMode::Access
    }
}

#[derive(Debug, Clone)]
pub struct Interface {
    pub name: String,
    pub mac: String,
    pub ip: Option<Ipv4Addr>,
    pub mask: Option<Ipv4Addr>,
    pub gateway: Option<Ipv4Addr>,
    pub up: bool,
    pub speed_mbps: u32,
    pub connection: Option<ConnectionId>,

    pub vlan_mode: VlanMode,
    pub access_vlan: u16,
    pub allowed_vlans: Vec<u16>,
    pub native_vlan: u16,

    pub dhcp_client: bool,
    pub dhcp_lease_expiry: Option<chrono::DateTime<chrono::Utc>>,
    pub dns_servers: Vec<Ipv4Addr>,
}

impl Interface {
    pub fn new(name: impl Into<String>, mac: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mac: mac.into(),
            ip: None,
            mask: None,
            gateway: None,
            up: true,
            speed_mbps: 1000,
            connection: None,
            vlan_mode: VlanMode::Access,
            access_vlan: 1,
            allowed_vlans: vec![1],
            native_vlan: 1,
            dhcp_client: false,
            dhcp_lease_expiry: None,
            dns_servers: Vec::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn network(&self) -> Option<(Ipv4Addr, Ipv4Addr)> {
        match (self.ip, self.mask) {
            (Some(ip), Some(mask)) => Some((crate::addr::network_of(ip, mask), mask)),
            _ => None,
        }
    }

    /// Whether this trunk port permits a given (untagged-resolved) VLAN.
    pub fn permits_vlan(&self, vlan: u16) -> bool {
        match self.vlan_mode {
            VlanMode::Access => self.access_vlan == vlan,
            VlanMode::Trunk => self.allowed_vlans.contains(&vlan),
        }
    }

    pub fn clear_dhcp(&mut self) {
        self.ip = None;
        self.mask = None;
        self.gateway = None;
        self.dhcp_client = false;
        self.dhcp_lease_expiry = None;
        self.dns_servers.clear();
    }
}
