//! The aggregate "world" value (Design Notes §9: one owned world threaded
//! through `tick`; no global mutable state).

use std::collections::HashMap;
use std::net::Ipv4Addr;

use crate::config::SimConfig;
use crate::errors::{SimError, SimResult};
use crate::ids::{ConnectionId, DeviceId, IdGen, PacketId};
use crate::model::connection::Connection;
use crate::model::device::{Device, DeviceKind};
use crate::model::packet::Packet;
use crate::model::route::{RouteEntry, RouteKind, RouteTable};
use crate::model::vlan::is_valid_vlan_id;

pub struct World {
    pub devices: HashMap<DeviceId, Device>,
    pub connections: HashMap<ConnectionId, Connection>,
    pub packets: Vec<Packet>,
    pub config: SimConfig,
    pub tick_count: u64,
    ids: IdGen,
}

impl World {
    pub fn new(config: SimConfig) -> Self {
        Self {
            devices: HashMap::new(),
            connections: HashMap::new(),
            packets: Vec::new(),
            config,
            tick_count: 0,
            ids: IdGen::default(),
        }
    }

    // ---- Device / interface CRUD -----------------------------------

    pub fn add_device(&mut self, kind: DeviceKind, hostname: impl Into<String>) -> DeviceId {
        let id = self.ids.next_device();
        self.devices.insert(id, Device::new(id, kind, hostname));
        id
    }

    pub fn remove_device(&mut self, id: DeviceId) -> SimResult<()> {
        self.devices.remove(&id).ok_or(SimError::DeviceNotFound(id))?;
        self.connections.retain(|_, c| !c.involves(id));
        self.packets
            .retain(|p| p.current_device != id && p.target_device != Some(id));
        Ok(())
    }

    pub fn device(&self, id: DeviceId) -> SimResult<&Device> {
        self.devices.get(&id).ok_or(SimError::DeviceNotFound(id))
    }

    pub fn device_mut(&mut self, id: DeviceId) -> SimResult<&mut Device> {
        self.devices.get_mut(&id).ok_or(SimError::DeviceNotFound(id))
    }

    pub fn add_interface(&mut self, device: DeviceId, mut interface: crate::model::interface::Interface) -> SimResult<()> {
        if interface.mac.is_empty() {
            interface.mac = crate::addr::next_mac(self.devices.len() as u64 * 16 + self.devices.get(&device).map(|d| d.interfaces.len()).unwrap_or(0) as u64);
        }
        self.device_mut(device)?.interfaces.push(interface);
        Ok(())
    }

    pub fn configure_interface_ip(
        &mut self,
        device: DeviceId,
        interface: &str,
        ip: Ipv4Addr,
        mask: Ipv4Addr,
    ) -> SimResult<()> {
        let dev = self.device_mut(device)?;
        let iface = dev
            .interface_mut(interface)
            .ok_or_else(|| SimError::InterfaceNotFound {
                device,
                interface: interface.to_string(),
            })?;
        iface.ip = Some(ip);
        iface.mask = Some(mask);
        dev.rebuild_connected_routes();
        Ok(())
    }

    pub fn connect(
        &mut self,
        a_device: DeviceId,
        a_interface: &str,
        b_device: DeviceId,
        b_interface: &str,
    ) -> SimResult<ConnectionId> {
        {
            let a = self.device(a_device)?;
            let a_if = a.interface(a_interface).ok_or_else(|| SimError::InterfaceNotFound {
                device: a_device,
                interface: a_interface.to_string(),
            })?;
            if a_if.is_connected() {
                return Err(SimError::InterfaceAlreadyConnected {
                    device: a_device,
                    interface: a_interface.to_string(),
                });
            }
            let b = self.device(b_device)?;
            let b_if = b.interface(b_interface).ok_or_else(|| SimError::InterfaceNotFound {
                device: b_device,
                interface: b_interface.to_string(),
            })?;
            if b_if.is_connected() {
                return Err(SimError::InterfaceAlreadyConnected {
                    device: b_device,
                    interface: b_interface.to_string(),
                });
            }
        }

        let a_speed = self.device(a_device)?.interface(a_interface).unwrap().speed_mbps;
        let b_speed = self.device(b_device)?.interface(b_interface).unwrap().speed_mbps;

        let id = self.ids.next_connection();
        self.connections.insert(
            id,
            Connection::new(a_device, a_interface, a_speed, b_device, b_interface, b_speed),
        );
        self.device_mut(a_device)?.interface_mut(a_interface).unwrap().connection = Some(id);
        self.device_mut(b_device)?.interface_mut(b_interface).unwrap().connection = Some(id);
        Ok(id)
    }

    pub fn disconnect(&mut self, id: ConnectionId) -> SimResult<()> {
        let conn = self.connections.remove(&id).ok_or(SimError::ConnectionNotFound(id))?;
        if let Ok(dev) = self.device_mut(conn.a_device) {
            if let Some(iface) = dev.interface_mut(&conn.a_interface) {
                iface.connection = None;
            }
        }
        if let Ok(dev) = self.device_mut(conn.b_device) {
            if let Some(iface) = dev.interface_mut(&conn.b_interface) {
                iface.connection = None;
            }
        }
        Ok(())
    }

    pub fn connection_for(&self, device: DeviceId, interface: &str) -> Option<&Connection> {
        self.devices
            .get(&device)?
            .interface(interface)?
            .connection
            .and_then(|id| self.connections.get(&id))
    }

    // ---- Routing table ----------------------------------------------

    fn routes_mut(&mut self, device: DeviceId) -> SimResult<&mut RouteTable> {
        let dev = self.device_mut(device)?;
        match dev.kind {
            DeviceKind::Router => Ok(&mut dev.router.routes),
            DeviceKind::Firewall => Ok(&mut dev.firewall.routes),
            _ => Err(SimError::UnsupportedDeviceKind(device)),
        }
    }

    pub fn add_route(
        &mut self,
        device: DeviceId,
        network: Ipv4Addr,
        mask: Ipv4Addr,
        gateway: Ipv4Addr,
        interface: impl Into<String>,
        metric: u32,
    ) -> SimResult<()> {
        self.routes_mut(device)?.upsert(RouteEntry {
            network,
            mask,
            gateway,
            interface: interface.into(),
            metric,
            kind: RouteKind::Static,
        });
        Ok(())
    }

    pub fn remove_route(&mut self, device: DeviceId, network: Ipv4Addr, mask: Ipv4Addr) -> SimResult<()> {
        let table = self.routes_mut(device)?;
        match table.all().iter().find(|r| r.network == network && r.mask == mask) {
            Some(r) if r.kind == RouteKind::Connected => Err(SimError::ConnectedRouteIsReadOnly),
            Some(_) => {
                table.remove(network, mask);
                Ok(())
            }
            None => Err(SimError::RouteNotFound {
                network: network.to_string(),
                mask: mask.to_string(),
            }),
        }
    }

    // ---- VLAN / SVI ----------------------------------------------------

    pub fn add_vlan(&mut self, device: DeviceId, id: u16, name: impl Into<String>) -> SimResult<()> {
        if !is_valid_vlan_id(id) {
            return Err(SimError::InvalidVlanId(id));
        }
        self.device_mut(device)?.switch.vlans.add(id, name);
        Ok(())
    }

    pub fn remove_vlan(&mut self, device: DeviceId, id: u16) -> SimResult<()> {
        if id == 1 {
            return Err(SimError::CannotRemoveDefaultVlan);
        }
        let dev = self.device_mut(device)?;
        if !dev.switch.vlans.remove(id) {
            return Err(SimError::VlanNotFound(id));
        }
        for iface in dev.interfaces.iter_mut() {
            if iface.access_vlan == id {
                iface.access_vlan = 1;
            }
            iface.allowed_vlans.retain(|v| *v != id);
            if iface.native_vlan == id {
                iface.native_vlan = 1;
            }
        }
        dev.switch.svis.retain(|svi| svi.vlan_id != id);
        dev.rebuild_svi_routes();
        Ok(())
    }

    pub fn add_svi(
        &mut self,
        device: DeviceId,
        vlan_id: u16,
        ip: Ipv4Addr,
        mask: Ipv4Addr,
        mac: impl Into<String>,
    ) -> SimResult<()> {
        let dev = self.device_mut(device)?;
        if !dev.switch.vlans.contains(vlan_id) {
            return Err(SimError::VlanNotFound(vlan_id));
        }
        dev.switch.svis.retain(|svi| svi.vlan_id != vlan_id);
        dev.switch.svis.push(crate::model::svi::Svi {
            vlan_id,
            ip,
            mask,
            mac: mac.into(),
            up: true,
        });
        dev.rebuild_svi_routes();
        Ok(())
    }

    pub fn remove_svi(&mut self, device: DeviceId, vlan_id: u16) -> SimResult<()> {
        let dev = self.device_mut(device)?;
        let before = dev.switch.svis.len();
        dev.switch.svis.retain(|svi| svi.vlan_id != vlan_id);
        if dev.switch.svis.len() == before {
            return Err(SimError::SviNotFound(vlan_id));
        }
        dev.rebuild_svi_routes();
        Ok(())
    }

    // ---- STP --------------------------------------------------------

    pub fn set_stp_enabled(&mut self, device: DeviceId, enabled: bool) -> SimResult<()> {
        self.device_mut(device)?.switch.stp.enabled = enabled;
        Ok(())
    }

    /// Sets the bridge's STP priority, snapped to the nearest-below multiple
    /// of 4096 and clamped to 0..=61440, per §6/§8.
    pub fn set_bridge_priority(&mut self, device: DeviceId, priority: i64) -> SimResult<()> {
        self.device_mut(device)?.switch.stp.priority = crate::model::stp::snap_bridge_priority(priority);
        Ok(())
    }

    pub fn set_port_cost(&mut self, device: DeviceId, interface: &str, cost: u32) -> SimResult<()> {
        let dev = self.device_mut(device)?;
        let speed = dev
            .interface(interface)
            .ok_or_else(|| SimError::InterfaceNotFound { device, interface: interface.to_string() })?
            .speed_mbps;
        dev.switch
            .stp
            .ports
            .entry(interface.to_string())
            .or_insert_with(|| crate::model::stp::StpPort::new(0, crate::model::stp::default_path_cost(speed)))
            .path_cost = cost;
        Ok(())
    }

    pub fn set_port_priority(&mut self, device: DeviceId, interface: &str, priority: u8) -> SimResult<()> {
        let dev = self.device_mut(device)?;
        let speed = dev
            .interface(interface)
            .ok_or_else(|| SimError::InterfaceNotFound { device, interface: interface.to_string() })?
            .speed_mbps;
        dev.switch
            .stp
            .ports
            .entry(interface.to_string())
            .or_insert_with(|| crate::model::stp::StpPort::new(0, crate::model::stp::default_path_cost(speed)))
            .port_priority = priority;
        Ok(())
    }

    // ---- Simulation control --------------------------------------------

    /// Stops the simulation: clears in-flight packets and ARP/MAC tables,
    /// leaving routing/VLAN/STP configuration untouched, per §5.
    pub fn stop(&mut self) {
        self.packets.clear();
        for device in self.devices.values_mut() {
            device.arp.clear();
            device.switch.mac_table.clear();
        }
    }

    pub fn next_packet_id(&mut self) -> PacketId {
        self.ids.next_packet()
    }

    /// Read-only view of a device's TCP connection table, for `netstat`-style
    /// terminal surfaces (§6).
    pub fn tcp_connections(&self, device: DeviceId) -> SimResult<&[crate::model::tcp::TcpConnection]> {
        Ok(self.device(device)?.tcp.all())
    }

    pub fn inject(&mut self, packet: Packet) {
        self.packets.push(packet);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::interface::Interface;

    fn iface(name: &str, mac: &str) -> Interface {
        Interface::new(name, mac)
    }

    #[test]
    fn connection_is_symmetric() {
        let mut world = World::new(SimConfig::default());
        let a = world.add_device(DeviceKind::Pc, "pc1");
        let b = world.add_device(DeviceKind::Switch, "sw1");
        world.add_interface(a, iface("eth0", "AA:AA:AA:AA:AA:01")).unwrap();
        world.add_interface(b, iface("Fa0/1", "AA:AA:AA:AA:AA:02")).unwrap();
        world.connect(a, "eth0", b, "Fa0/1").unwrap();

        let a_conn = world.device(a).unwrap().interface("eth0").unwrap().connection.unwrap();
        let b_conn = world.device(b).unwrap().interface("Fa0/1").unwrap().connection.unwrap();
        assert_eq!(a_conn, b_conn);
    }

    #[test]
    fn double_connect_is_rejected() {
        let mut world = World::new(SimConfig::default());
        let a = world.add_device(DeviceKind::Pc, "pc1");
        let b = world.add_device(DeviceKind::Switch, "sw1");
        let c = world.add_device(DeviceKind::Switch, "sw2");
        world.add_interface(a, iface("eth0", "AA:AA:AA:AA:AA:01")).unwrap();
        world.add_interface(b, iface("Fa0/1", "AA:AA:AA:AA:AA:02")).unwrap();
        world.add_interface(c, iface("Fa0/1", "AA:AA:AA:AA:AA:03")).unwrap();
        world.connect(a, "eth0", b, "Fa0/1").unwrap();
        let err = world.connect(a, "eth0", c, "Fa0/1").unwrap_err();
        assert!(matches!(err, SimError::InterfaceAlreadyConnected { .. }));
    }

    #[test]
    fn vlan_boundaries() {
        let mut world = World::new(SimConfig::default());
        let sw = world.add_device(DeviceKind::Switch, "sw1");
        assert!(world.add_vlan(sw, 0, "bad").is_err());
        assert!(world.add_vlan(sw, 4095, "bad").is_err());
        assert!(world.add_vlan(sw, 5000, "bad").is_err());
        assert!(world.add_vlan(sw, 10, "sales").is_ok());
        assert!(world.remove_vlan(sw, 1).is_err());
    }

    #[test]
    fn add_remove_route_round_trips() {
        let mut world = World::new(SimConfig::default());
        let r = world.add_device(DeviceKind::Router, "r1");
        let net = Ipv4Addr::new(172, 16, 0, 0);
        let mask = Ipv4Addr::new(255, 255, 0, 0);
        let gw = Ipv4Addr::new(10, 0, 0, 1);
        world.add_route(r, net, mask, gw, "Gi0/1", 1).unwrap();
        world.remove_route(r, net, mask).unwrap();
        assert!(world.device(r).unwrap().router.routes.lookup(net).is_none());
    }

    #[test]
    fn set_bridge_priority_snaps_and_clamps() {
        let mut world = World::new(SimConfig::default());
        let sw = world.add_device(DeviceKind::Switch, "sw1");

        world.set_bridge_priority(sw, 33000).unwrap();
        assert_eq!(world.device(sw).unwrap().switch.stp.priority, 32768);

        world.set_bridge_priority(sw, 62000).unwrap();
        assert_eq!(world.device(sw).unwrap().switch.stp.priority, 61440);
    }

    #[test]
    fn set_stp_enabled_round_trips() {
        let mut world = World::new(SimConfig::default());
        let sw = world.add_device(DeviceKind::Switch, "sw1");
        assert!(!world.device(sw).unwrap().switch.stp.enabled);
        world.set_stp_enabled(sw, true).unwrap();
        assert!(world.device(sw).unwrap().switch.stp.enabled);
    }

    #[test]
    fn set_port_cost_and_priority_require_existing_interface() {
        let mut world = World::new(SimConfig::default());
        let sw = world.add_device(DeviceKind::Switch, "sw1");
        world.add_interface(sw, iface("Gi0/1", "AA:AA:AA:AA:AA:01")).unwrap();

        assert!(world.set_port_cost(sw, "Gi0/2", 10).is_err());
        world.set_port_cost(sw, "Gi0/1", 10).unwrap();
        assert_eq!(world.device(sw).unwrap().switch.stp.ports.get("Gi0/1").unwrap().path_cost, 10);

        world.set_port_priority(sw, "Gi0/1", 64).unwrap();
        assert_eq!(world.device(sw).unwrap().switch.stp.ports.get("Gi0/1").unwrap().port_priority, 64);
    }
}
