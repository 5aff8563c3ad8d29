//! C6 — SVI engine: ARP for a switch virtual interface's own address, and
//! inter-VLAN routing between SVIs on the same switch (§4.4).

use crate::addr;
use crate::ids::DeviceId;
use crate::model::arp::ArpEntryKind;
use crate::model::packet::{ArpOp, IcmpCode, IcmpType, IcmpUnreachablePayload, Packet, PacketKind, Payload};
use crate::model::world::World;

use super::l2;

pub fn process(world: &mut World, device_id: DeviceId, packet: Packet) -> Vec<Packet> {
    match packet.kind {
        PacketKind::Arp => handle_arp(world, device_id, packet),
        PacketKind::Icmp => handle_icmp(world, device_id, packet),
        _ => route(world, device_id, packet),
    }
}

fn handle_arp(world: &mut World, device_id: DeviceId, packet: Packet) -> Vec<Packet> {
    let Payload::Arp { op, sender_ip, sender_mac, target_ip, .. } = packet.payload.clone() else {
        return Vec::new();
    };
    let Some(vlan) = packet.vlan_tag else { return Vec::new() };

    if let Some(dev) = world.devices.get_mut(&device_id) {
        dev.arp.upsert(sender_ip, sender_mac.clone(), format!("Vlan{vlan}"), ArpEntryKind::Dynamic);
    }
    if op != ArpOp::Request {
        return Vec::new();
    }

    let Some(device) = world.devices.get(&device_id) else { return Vec::new() };
    let Some(svi) = device.switch.svis.iter().find(|s| s.vlan_id == vlan && s.ip == target_ip).cloned() else {
        return Vec::new();
    };
    let Some(port) = device.switch.mac_table.lookup(&sender_mac, vlan).map(|e| e.port.clone()) else {
        return Vec::new();
    };

    let mut reply = Packet::new(world.next_packet_id(), PacketKind::Arp, device_id);
    reply.source_mac = svi.mac.clone();
    reply.dest_mac = sender_mac.clone();
    reply.source_ip = Some(target_ip);
    reply.dest_ip = Some(sender_ip);
    reply.vlan_tag = Some(vlan);
    reply.payload = Payload::Arp {
        op: ArpOp::Reply,
        sender_ip: target_ip,
        sender_mac: svi.mac,
        target_ip: sender_ip,
        target_mac: sender_mac,
    };

    l2::forward_to(world, device_id, &port, vlan, reply).into_iter().collect()
}

fn handle_icmp(world: &mut World, device_id: DeviceId, packet: Packet) -> Vec<Packet> {
    let Some(dest_ip) = packet.dest_ip else { return route(world, device_id, packet) };
    let Some(device) = world.devices.get(&device_id) else { return Vec::new() };
    let is_for_svi = device.switch.svis.iter().any(|s| s.ip == dest_ip);
    if !is_for_svi {
        return route(world, device_id, packet);
    }

    let Payload::Icmp { icmp_type: IcmpType::EchoRequest, seq, .. } = packet.payload else {
        return Vec::new();
    };
    let Some(vlan) = packet.vlan_tag else { return Vec::new() };
    let source_mac = packet.source_mac.clone();
    let Some(source_ip) = packet.source_ip else { return Vec::new() };

    let Some(port) = device.switch.mac_table.lookup(&source_mac, vlan).map(|e| e.port.clone()) else {
        return Vec::new();
    };

    let mut reply = Packet::new(world.next_packet_id(), PacketKind::Icmp, device_id);
    reply.source_mac = packet.dest_mac.clone();
    reply.dest_mac = source_mac;
    reply.source_ip = Some(dest_ip);
    reply.dest_ip = Some(source_ip);
    reply.vlan_tag = Some(vlan);
    reply.payload = Payload::Icmp { icmp_type: IcmpType::EchoReply, code: IcmpCode::Na, seq, unreachable: None };

    l2::forward_to(world, device_id, &port, vlan, reply).into_iter().collect()
}

/// Routes a frame addressed to an SVI's MAC toward a different VLAN on the
/// same switch, using the switch's connected-route table (`svi_routes`).
fn route(world: &mut World, device_id: DeviceId, mut packet: Packet) -> Vec<Packet> {
    let Some(dest_ip) = packet.dest_ip else { return Vec::new() };
    let Some(source_vlan) = packet.vlan_tag else { return Vec::new() };

    let Some(device) = world.devices.get(&device_id) else { return Vec::new() };
    let Some(route) = device.switch.svi_routes.lookup(dest_ip).cloned() else {
        return unreachable_reply(world, device_id, &packet, source_vlan);
    };
    let target_vlan: u16 = route
        .interface
        .strip_prefix("Vlan")
        .and_then(|s| s.parse().ok())
        .unwrap_or(source_vlan);
    let Some(svi) = device.switch.svis.iter().find(|s| s.vlan_id == target_vlan).cloned() else {
        return Vec::new();
    };

    if packet.ttl <= 1 {
        return time_exceeded_reply(world, device_id, &packet, source_vlan);
    }
    packet.ttl -= 1;
    packet.source_mac = svi.mac.clone();
    packet.vlan_tag = Some(target_vlan);

    let Some(device) = world.devices.get(&device_id) else { return Vec::new() };
    if let Some(entry) = device.arp.get(&dest_ip).cloned() {
        packet.dest_mac = entry.mac.clone();
        let port = entry.interface.clone();
        return l2::forward_to(world, device_id, &port, target_vlan, packet).into_iter().collect();
    }

    // ARP miss into the target VLAN: flood a request, buffer the original.
    let mut request = Packet::new(world.next_packet_id(), PacketKind::Arp, device_id);
    request.source_mac = svi.mac.clone();
    request.dest_mac = addr::BROADCAST_MAC.to_string();
    request.vlan_tag = Some(target_vlan);
    request.payload = Payload::Arp {
        op: ArpOp::Request,
        sender_ip: svi.ip,
        sender_mac: svi.mac,
        target_ip: dest_ip,
        target_mac: addr::BROADCAST_MAC.to_string(),
    };

    packet.is_locally_generated = false;
    packet.waiting_for_arp = Some(dest_ip);
    packet.stage = crate::model::packet::Stage::Buffered;

    let mut outputs = l2::flood(world, device_id, request, Some(target_vlan));
    outputs.push(packet);
    outputs
}

fn unreachable_reply(world: &mut World, device_id: DeviceId, packet: &Packet, vlan: u16) -> Vec<Packet> {
    icmp_error(world, device_id, packet, vlan, IcmpType::DestinationUnreachable, IcmpCode::NetworkUnreachable)
}

fn time_exceeded_reply(world: &mut World, device_id: DeviceId, packet: &Packet, vlan: u16) -> Vec<Packet> {
    icmp_error(world, device_id, packet, vlan, IcmpType::TimeExceeded, IcmpCode::Na)
}

fn icmp_error(
    world: &mut World,
    device_id: DeviceId,
    packet: &Packet,
    vlan: u16,
    icmp_type: IcmpType,
    code: IcmpCode,
) -> Vec<Packet> {
    let Some(source_ip) = packet.source_ip else { return Vec::new() };
    let Some(device) = world.devices.get(&device_id) else { return Vec::new() };
    let Some(svi) = device.switch.svis.iter().find(|s| s.vlan_id == vlan).cloned() else { return Vec::new() };
    let Some(port) = device.switch.mac_table.lookup(&packet.source_mac, vlan).map(|e| e.port.clone()) else {
        return Vec::new();
    };

    let mut reply = Packet::new(world.next_packet_id(), PacketKind::Icmp, device_id);
    reply.source_mac = svi.mac.clone();
    reply.dest_mac = packet.source_mac.clone();
    reply.source_ip = Some(svi.ip);
    reply.dest_ip = Some(source_ip);
    reply.vlan_tag = Some(vlan);
    reply.payload = Payload::Icmp {
        icmp_type,
        code,
        seq: 0,
        unreachable: Some(IcmpUnreachablePayload {
            original_dest_ip: packet.dest_ip.unwrap_or(source_ip),
            original_source_ip: source_ip,
            original_type: format!("{:?}", packet.kind),
        }),
    };

    l2::forward_to(world, device_id, &port, vlan, reply).into_iter().collect()
}
