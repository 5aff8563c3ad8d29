//! Device (§3 Device).
//!
//! Per the design notes, devices are modeled as a variant over the eight
//! kinds rather than a class hierarchy; `at-device` dispatch is an
//! exhaustive match in `engine::scheduler`, not a virtual call. Tables that
//! only make sense for some kinds (MAC table, VLANs, STP, DHCP server,
//! firewall rules) live in `KindState`, a sub-enum carried alongside the
//! fields every device has.

use std::collections::HashMap;

use crate::ids::DeviceId;
use crate::model::arp::ArpTable;
use crate::model::dhcp::DhcpServerConfig;
use crate::model::firewall::FirewallRule;
use crate::model::interface::Interface;
use crate::model::mac_table::MacTable;
use crate::model::route::RouteTable;
use crate::model::stp::StpConfig;
use crate::model::svi::Svi;
use crate::model::tcp::TcpTable;
use crate::model::vlan::VlanCatalog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Pc,
    Laptop,
    Server,
    Router,
    Switch,
    Hub,
    Firewall,
    Cloud,
}

impl DeviceKind {
    pub fn is_l2_forwarder(self) -> bool {
        matches!(self, DeviceKind::Switch | DeviceKind::Hub)
    }

    pub fn is_l3_capable(self) -> bool {
        matches!(
            self,
            DeviceKind::Router
                | DeviceKind::Firewall
                | DeviceKind::Pc
                | DeviceKind::Laptop
                | DeviceKind::Server
                | DeviceKind::Cloud
        )
    }

    pub fn has_arp_table(self) -> bool {
        self.is_l3_capable()
    }

    pub fn has_tcp_table(self) -> bool {
        matches!(
            self,
            DeviceKind::Pc | DeviceKind::Laptop | DeviceKind::Server | DeviceKind::Router
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct SwitchState {
    pub mac_table: MacTable,
    pub vlans: VlanCatalog,
    pub svis: Vec<Svi>,
    pub stp: StpConfig,
    pub svi_routes: RouteTable,
}

#[derive(Debug, Clone, Default)]
pub struct RouterState {
    pub routes: RouteTable,
    pub dhcp_servers: Vec<DhcpServerConfig>,
}

#[derive(Debug, Clone, Default)]
pub struct FirewallState {
    pub routes: RouteTable,
    pub rules: Vec<FirewallRule>,
}

/// CDP neighbor table (supplemental, §SPEC_FULL).
#[derive(Debug, Clone, Default)]
pub struct CdpTable {
    pub neighbors: HashMap<String, (String, String)>, // local interface -> (hostname, kind)
}

#[derive(Debug, Clone)]
pub struct Device {
    pub id: DeviceId,
    pub kind: DeviceKind,
    pub hostname: String,
    pub running: bool,
    pub interfaces: Vec<Interface>,

    pub arp: ArpTable,
    pub tcp: TcpTable,
    pub cdp: CdpTable,

    pub switch: SwitchState,
    pub router: RouterState,
    pub firewall: FirewallState,
    pub dhcp_servers_on_server: Vec<DhcpServerConfig>,
}

impl Device {
    pub fn new(id: DeviceId, kind: DeviceKind, hostname: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            hostname: hostname.into(),
            running: true,
            interfaces: Vec::new(),
            arp: ArpTable::new(),
            tcp: TcpTable::new(),
            cdp: CdpTable::default(),
            switch: SwitchState::default(),
            router: RouterState::default(),
            firewall: FirewallState::default(),
            dhcp_servers_on_server: Vec::new(),
        }
    }

    pub fn interface(&self, name: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.name == name)
    }

    pub fn interface_mut(&mut self, name: &str) -> Option<&mut Interface> {
        self.interfaces.iter_mut().find(|i| i.name == name)
    }

    pub fn interface_by_mac(&self, mac: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.mac.eq_ignore_ascii_case(mac))
    }

    /// All DHCP server configs relevant to this device, regardless of
    /// whether it is a router/firewall or a plain server (§3: DHCP server
    /// configs live on routers, servers).
    pub fn dhcp_servers(&self) -> impl Iterator<Item = &DhcpServerConfig> {
        self.router
            .dhcp_servers
            .iter()
            .chain(self.dhcp_servers_on_server.iter())
    }

    pub fn dhcp_servers_mut(&mut self) -> impl Iterator<Item = &mut DhcpServerConfig> {
        self.router
            .dhcp_servers
            .iter_mut()
            .chain(self.dhcp_servers_on_server.iter_mut())
    }

    /// Rebuilds the connected routes derived from interface IPs/masks (and
    /// from SVIs, for switches). Connected routes are never hand-edited by
    /// user code, per the invariant in §3.
    pub fn rebuild_connected_routes(&mut self) {
        use crate::model::route::{RouteEntry, RouteKind};
        use std::net::Ipv4Addr;

        let routes = match self.kind {
            DeviceKind::Router => &mut self.router.routes,
            DeviceKind::Firewall => &mut self.firewall.routes,
            _ => return,
        };

        routes.all().to_vec().into_iter().for_each(|r| {
            if r.kind == RouteKind::Connected {
                routes.remove(r.network, r.mask);
            }
        });

        for iface in &self.interfaces {
            if let Some((network, mask)) = iface.network() {
                routes.upsert(RouteEntry {
                    network,
                    mask,
                    gateway: Ipv4Addr::new(0, 0, 0, 0),
                    interface: iface.name.clone(),
                    metric: 0,
                    kind: RouteKind::Connected,
                });
            }
        }
    }

    /// Switches additionally install connected routes for SVIs (§4.4),
    /// kept in a dedicated table since a switch's primary identity isn't a
    /// router.
    pub fn rebuild_svi_routes(&mut self) {
        use crate::model::route::{RouteEntry, RouteKind};
        use std::net::Ipv4Addr;

        let svis = self.switch.svis.clone();
        let routes = &mut self.switch.svi_routes;

        routes.all().to_vec().into_iter().for_each(|r| {
            routes.remove(r.network, r.mask);
        });

        for svi in &svis {
            routes.upsert(RouteEntry {
                network: svi.network(),
                mask: svi.mask,
                gateway: Ipv4Addr::new(0, 0, 0, 0),
                interface: svi.pseudo_interface_name(),
                metric: 0,
                kind: RouteKind::Connected,
            });
        }
    }
}
