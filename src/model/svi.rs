//! Switch Virtual Interface (§3 SVI, §4.4 SVI engine).

use std::net::Ipv4Addr;

#[derive(Debug, Clone)]
pub struct Svi {
    pub vlan_id: u16,
    pub ip: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub mac: String,
    pub up: bool,
}

impl Svi {
    pub fn pseudo_interface_name(&self) -> String {
        format!("Vlan{}", self.vlan_id)
    }

    pub fn network(&self) -> Ipv4Addr {
        crate::addr::network_of(self.ip, self.mask)
    }
}
