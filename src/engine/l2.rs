//! C4 — switch (and hub) L2 engine: ingress VLAN classification, STP
//! gating, MAC learning, SVI/management diversion, and the forwarding
//! decision (§4.3).

use crate::ids::DeviceId;
use crate::model::device::{Device, DeviceKind};
use crate::model::interface::VlanMode;
use crate::model::packet::Packet;
use crate::model::stp::PortState;
use crate::model::world::World;

use super::svi;

/// Entry point: process one `at-device` frame on a switch or hub.
pub fn process(world: &mut World, device_id: DeviceId, mut packet: Packet) -> Vec<Packet> {
    let Some(device) = world.devices.get(&device_id) else { return Vec::new() };

    if device.kind == DeviceKind::Hub {
        return flood(world, device_id, packet, None);
    }

    // Step 1 — ingress VLAN classification.
    let Some(ingress) = packet.ingress_interface.clone() else { return Vec::new() };
    let Some(vlan) = classify_vlan(device, &ingress, packet.vlan_tag) else {
        return Vec::new();
    };
    packet.vlan_tag = Some(vlan);

    // Step 2 — STP gating: a non-forwarding port drops the frame here, but
    // a Learning port still gets to learn the source MAC below — it just
    // never reaches the forwarding decision (step 5).
    let ingress_forwards = if device.switch.stp.enabled {
        device.switch.stp.ports.get(&ingress).map(|p| p.state == PortState::Forwarding).unwrap_or(true)
    } else {
        true
    };
    let ingress_learns = if device.switch.stp.enabled {
        device.switch.stp.ports.get(&ingress).map(|p| p.state.learns()).unwrap_or(true)
    } else {
        true
    };
    if !ingress_forwards && !ingress_learns {
        if let Some(port) = device.switch.stp.ports.get(&ingress) {
            log::trace!("l2: device {device_id} port {ingress} is {:?}, dropping", port.state);
        }
        return Vec::new();
    }

    // Step 3 — MAC learning.
    if ingress_learns {
        if let Some(device) = world.devices.get_mut(&device_id) {
            device.switch.mac_table.learn(&packet.source_mac, vlan, &ingress);
        }
    }

    if !ingress_forwards {
        return Vec::new();
    }

    let device = world.devices.get(&device_id).unwrap();

    // An ARP request broadcast into this VLAN that happens to ask for an
    // SVI's own IP gets answered by the SVI engine *in addition to* being
    // flooded normally — a real switch is just another host on the VLAN
    // from its neighbors' point of view.
    let mut svi_reply = Vec::new();
    if let crate::model::packet::Payload::Arp { op: crate::model::packet::ArpOp::Request, target_ip, .. } = &packet.payload {
        if device.switch.svis.iter().any(|s| s.vlan_id == vlan && s.ip == *target_ip) {
            svi_reply = svi::process(world, device_id, packet.clone());
        }
    }

    let device = world.devices.get(&device_id).unwrap();

    // Step 4 — management/SVI diversion: a frame addressed to this
    // switch's own MAC, or to a configured SVI's MAC within its VLAN.
    if device.interface_by_mac(&packet.dest_mac).is_some()
        || device
            .switch
            .svis
            .iter()
            .any(|s| s.mac.eq_ignore_ascii_case(&packet.dest_mac) && s.vlan_id == vlan)
    {
        let mut outputs = svi::process(world, device_id, packet);
        outputs.extend(svi_reply);
        return outputs;
    }

    // Step 5 — forwarding decision.
    if crate::addr::is_broadcast_mac(&packet.dest_mac) || crate::addr::is_multicast_mac(&packet.dest_mac) {
        let mut outputs = flood(world, device_id, packet, Some(vlan));
        outputs.extend(svi_reply);
        return outputs;
    }

    let known_port = device.switch.mac_table.lookup(&packet.dest_mac, vlan).map(|e| e.port.clone());
    match known_port {
        Some(port) if port == ingress => Vec::new(),
        Some(port) => match forward_to(world, device_id, &port, vlan, packet) {
            Some(p) => vec![p],
            None => Vec::new(),
        },
        None => flood(world, device_id, packet, Some(vlan)),
    }
}

/// Determines the VLAN a frame belongs to once it lands on `ingress`.
/// Access ports always classify into their access VLAN, dropping any
/// stray tag; trunk ports honor an existing tag or fall back to their
/// native VLAN, and reject VLANs they aren't configured to carry.
fn classify_vlan(device: &Device, ingress: &str, tag: Option<u16>) -> Option<u16> {
    let iface = device.interface(ingress)?;
    let vlan = match iface.vlan_mode {
        VlanMode::Access => iface.access_vlan,
        VlanMode::Trunk => tag.unwrap_or(iface.native_vlan),
    };
    if iface.permits_vlan(vlan) {
        Some(vlan)
    } else {
        None
    }
}

/// Floods `packet` out every up, VLAN-permitting interface except the one
/// it arrived on. Used for broadcast/multicast frames, unknown unicast,
/// and unconditionally by hubs (which carry no VLAN state at all).
pub(crate) fn flood(world: &mut World, device_id: DeviceId, packet: Packet, vlan: Option<u16>) -> Vec<Packet> {
    let ingress = packet.ingress_interface.clone();
    let Some(device) = world.devices.get(&device_id) else { return Vec::new() };

    let targets: Vec<String> = device
        .interfaces
        .iter()
        .filter(|i| i.is_connected() && Some(i.name.clone()) != ingress)
        .filter(|i| match vlan {
            Some(v) => i.permits_vlan(v),
            None => true,
        })
        .filter(|i| {
            !device.switch.stp.enabled
                || device
                    .switch
                    .stp
                    .ports
                    .get(&i.name)
                    .map(|p| p.state.forwards_data())
                    .unwrap_or(true)
        })
        .map(|i| i.name.clone())
        .collect();

    let mut outputs = Vec::new();
    for port in targets {
        if let Some(p) = forward_to(world, device_id, &port, vlan.unwrap_or(1), packet.clone()) {
            outputs.push(p);
        }
    }
    outputs
}

pub(crate) fn forward_to(world: &mut World, device_id: DeviceId, egress_port: &str, vlan: u16, mut packet: Packet) -> Option<Packet> {
    let connection = world.connection_for(device_id, egress_port)?.clone();
    let (peer, _) = connection.peer_of(device_id)?;
    let egress_iface = world.devices.get(&device_id)?.interface(egress_port)?;

    // Trunk egress keeps the tag except for its own native VLAN, which goes
    // out untagged; access egress always strips it. Per §4.3.
    packet.vlan_tag = match egress_iface.vlan_mode {
        VlanMode::Trunk if vlan == egress_iface.native_vlan => None,
        VlanMode::Trunk => Some(vlan),
        VlanMode::Access => None,
    };
    packet.egress_interface = Some(egress_port.to_string());
    packet.target_device = Some(peer);
    Some(packet)
}
