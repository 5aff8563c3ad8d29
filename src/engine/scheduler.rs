//! C10 — scheduler: the single `tick` function that drives every packet
//! forward and ties the per-device engines together (§5).
//!
//! Every engine module (`l2`, `l3`, `svi`, `tcp`, `dhcp`) hands back
//! packets with `target_device` set and `stage` left at its default
//! `AtDevice` — deciding *when* that becomes an on-link packet, and which
//! connection it travels on, is the one piece of bookkeeping this module
//! owns instead of every engine repeating it. `to_on_link` is the only
//! place that performs that transition.

use rand::Rng;

use crate::ids::{ConnectionId, DeviceId};
use crate::model::device::DeviceKind;
use crate::model::packet::{IcmpCode, IcmpType, Packet, PacketKind, Payload, Stage};
use crate::model::world::World;

use super::{cdp, l2, l3, link, stp};

/// How often, in ticks, the scheduler recomputes STP regardless of whether
/// a topology change was observed — a cheap insurance pass against a
/// convergence bug leaving a loop live. Real topology edits call
/// `stp::converge` immediately; this is the periodic backstop.
const STP_RECONVERGE_INTERVAL_TICKS: u64 = 300;

/// Advances the simulation by one tick.
pub fn tick(world: &mut World) {
    let pending = std::mem::take(&mut world.packets);
    let mut produced = Vec::with_capacity(pending.len());

    for packet in pending {
        match packet.stage {
            Stage::AtDevice => produced.extend(dispatch_at_device(world, packet)),
            Stage::OnLink { .. } => {
                if let Some(p) = advance_on_link(world, packet) {
                    produced.push(p);
                }
            }
            Stage::Buffered => produced.extend(retry_buffered(world, packet)),
            Stage::Arrived | Stage::Dropped => {
                // Terminal. A caller polling for delivery (e.g. a ping
                // session) inspects these before they're discarded by
                // draining `world.packets` itself, not through the
                // scheduler.
            }
        }
    }

    world.tick_count += 1;

    if world.config.age_entries {
        age_tables(world);
    }

    if world.config.cdp_interval_ticks > 0 && world.tick_count % world.config.cdp_interval_ticks as u64 == 0 {
        produced.extend(cdp::announce(world));
    }

    if world.tick_count % STP_RECONVERGE_INTERVAL_TICKS == 0 {
        stp::converge(world);
        produced.extend(stp::emit_bpdus(world));
    }

    for packet in produced.iter_mut() {
        to_on_link(world, packet);
    }

    world.packets = produced;
}

/// Dispatches one `at-device` packet to the engine matching its device's
/// kind. An exhaustive match, not a trait object, per the data model's
/// polymorphism-over-kind design.
fn dispatch_at_device(world: &mut World, packet: Packet) -> Vec<Packet> {
    let Some(device) = world.devices.get(&packet.current_device) else { return Vec::new() };
    if !device.running {
        return Vec::new();
    }
    let device_id = packet.current_device;
    match device.kind {
        DeviceKind::Switch | DeviceKind::Hub => l2::process(world, device_id, packet),
        DeviceKind::Router
        | DeviceKind::Firewall
        | DeviceKind::Pc
        | DeviceKind::Laptop
        | DeviceKind::Server
        | DeviceKind::Cloud => l3::process(world, device_id, packet),
    }
}

/// Turns a freshly produced `AtDevice` packet with a `target_device` into
/// an `OnLink` packet carrying the connection it travels on. A no-op for
/// anything already `OnLink`, `Buffered`, `Arrived`, or locally terminal.
fn to_on_link(world: &World, packet: &mut Packet) {
    if packet.stage != Stage::AtDevice {
        return;
    }
    let Some(target) = packet.target_device else { return };
    let Some(egress) = packet.egress_interface.clone() else { return };
    let Some(conn_id) = connection_id_for(world, packet.current_device, &egress) else {
        return;
    };
    packet.link = Some(conn_id);
    packet.stage = Stage::OnLink { progress: 0 };
}

fn connection_id_for(world: &World, device: DeviceId, interface: &str) -> Option<ConnectionId> {
    world.devices.get(&device)?.interface(interface)?.connection
}

fn advance_on_link(world: &mut World, mut packet: Packet) -> Option<Packet> {
    let conn_id = packet.link?;
    let connection = world.connections.get(&conn_id)?.clone();
    let speed = world.config.default_speed;
    let mut rng = rand::thread_rng();
    link::tick(&mut packet, &connection, speed, &world.config, &mut rng);

    match packet.stage {
        Stage::Dropped => {
            log::debug!("scheduler: packet {} dropped in transit", packet.id);
            None
        }
        Stage::AtDevice => {
            // Arrived at the far end; link::tick already flipped
            // current_device/ingress_interface. Clear the bookkeeping
            // field so the next dispatch doesn't mistake it for in-flight.
            packet.link = None;
            Some(packet)
        }
        _ => Some(packet),
    }
}

/// Re-checks a buffered (ARP-pending) packet: forwards it if the target
/// has since resolved, re-issues the ARP request on the configured retry
/// cadence, and converts to an ICMP Host Unreachable once
/// `arp_retry_limit` retries are exhausted (§4.2 Open Question resolution).
fn retry_buffered(world: &mut World, mut packet: Packet) -> Vec<Packet> {
    let Some(target_ip) = packet.waiting_for_arp else { return Vec::new() };
    let device_id = packet.current_device;
    let Some(device) = world.devices.get(&device_id) else { return Vec::new() };

    let resolved = if device.kind == DeviceKind::Switch {
        let Some(vlan) = packet.vlan_tag else { return Vec::new() };
        device.arp.get(&target_ip).cloned().and_then(|entry| {
            device
                .switch
                .mac_table
                .lookup(&entry.mac, vlan)
                .map(|e| (entry.mac.clone(), e.port.clone()))
        })
    } else {
        device.arp.get(&target_ip).cloned().map(|entry| (entry.mac.clone(), entry.interface.clone()))
    };

    if let Some((dest_mac, egress_if)) = resolved {
        packet.dest_mac = dest_mac;
        packet.egress_interface = Some(egress_if.clone());
        packet.waiting_for_arp = None;
        packet.stage = Stage::AtDevice;
        if let Some(conn) = world.connection_for(device_id, &egress_if) {
            if let Some((peer, _)) = conn.peer_of(device_id) {
                packet.target_device = Some(peer);
            }
        }
        return vec![packet];
    }

    let interval = world.config.arp_retry_interval_ticks.max(1);
    let limit = world.config.arp_retry_limit;

    packet.arp_retries += 1;
    if packet.arp_retries >= limit.saturating_mul(interval) {
        log::debug!("scheduler: arp retries exhausted for {target_ip} on device {device_id}, giving up");
        return host_unreachable(world, device_id, &packet).into_iter().collect();
    }

    if packet.arp_retries % interval == 0 {
        let mut outputs = reissue_arp(world, device_id, &packet);
        outputs.push(packet);
        outputs
    } else {
        vec![packet]
    }
}

fn reissue_arp(world: &mut World, device_id: DeviceId, packet: &Packet) -> Vec<Packet> {
    use crate::addr;
    use crate::model::packet::ArpOp;
    use std::net::Ipv4Addr;

    let Some(target_ip) = packet.waiting_for_arp else { return Vec::new() };
    let Some(device) = world.devices.get(&device_id) else { return Vec::new() };

    if device.kind == DeviceKind::Switch {
        let Some(vlan) = packet.vlan_tag else { return Vec::new() };
        let Some(svi) = device.switch.svis.iter().find(|s| s.vlan_id == vlan).cloned() else {
            return Vec::new();
        };
        let mut request = Packet::new(world.next_packet_id(), PacketKind::Arp, device_id);
        request.source_mac = svi.mac.clone();
        request.dest_mac = addr::BROADCAST_MAC.to_string();
        request.vlan_tag = Some(vlan);
        request.payload = Payload::Arp {
            op: ArpOp::Request,
            sender_ip: svi.ip,
            sender_mac: svi.mac,
            target_ip,
            target_mac: addr::BROADCAST_MAC.to_string(),
        };
        return l2::flood(world, device_id, request, Some(vlan));
    }

    let Some(egress_if) = l3::route_egress_interface(world, device_id, target_ip) else { return Vec::new() };
    let Some(iface) = world.devices.get(&device_id).and_then(|d| d.interface(&egress_if)).cloned() else {
        return Vec::new();
    };
    let Some(conn) = world.connection_for(device_id, &egress_if) else { return Vec::new() };
    let Some((peer, _)) = conn.peer_of(device_id) else { return Vec::new() };

    let mut request = Packet::new(world.next_packet_id(), PacketKind::Arp, device_id);
    request.source_mac = iface.mac.clone();
    request.dest_mac = addr::BROADCAST_MAC.to_string();
    request.payload = Payload::Arp {
        op: ArpOp::Request,
        sender_ip: iface.ip.unwrap_or(Ipv4Addr::UNSPECIFIED),
        sender_mac: iface.mac,
        target_ip,
        target_mac: addr::BROADCAST_MAC.to_string(),
    };
    request.egress_interface = Some(egress_if);
    request.target_device = Some(peer);
    vec![request]
}

/// Ages dynamic ARP and MAC entries by one tick, garbage-collecting any
/// past `SimConfig::entry_timeout_ticks` (§9 Open Question resolution 1:
/// aging is declared but disabled by default).
fn age_tables(world: &mut World) {
    let timeout = world.config.entry_timeout_ticks;
    for device in world.devices.values_mut() {
        device.arp.age_all(timeout);
        device.switch.mac_table.age_all(timeout);
    }
}

fn host_unreachable(world: &mut World, device_id: DeviceId, packet: &Packet) -> Option<Packet> {
    let source_ip = packet.source_ip?;
    let ingress = packet.ingress_interface.clone().or_else(|| {
        world.devices.get(&device_id)?.interfaces.first().map(|i| i.name.clone())
    })?;
    let device = world.devices.get(&device_id)?;
    let iface = device.interface(&ingress)?.clone();
    let iface_ip = iface.ip?;
    let dest_mac = device.arp.get(&source_ip).map(|e| e.mac.clone()).unwrap_or_else(|| packet.source_mac.clone());

    let mut reply = Packet::new(world.next_packet_id(), PacketKind::Icmp, device_id);
    reply.source_mac = iface.mac;
    reply.dest_mac = dest_mac;
    reply.source_ip = Some(iface_ip);
    reply.dest_ip = Some(source_ip);
    reply.is_locally_generated = true;
    reply.payload = Payload::Icmp {
        icmp_type: IcmpType::DestinationUnreachable,
        code: IcmpCode::HostUnreachable,
        seq: 0,
        unreachable: Some(crate::model::packet::IcmpUnreachablePayload {
            original_dest_ip: packet.dest_ip.unwrap_or(source_ip),
            original_source_ip: source_ip,
            original_type: format!("{:?}", packet.kind),
        }),
    };
    Some(reply)
}
