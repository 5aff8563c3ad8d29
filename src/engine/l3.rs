//! C5 — router/host L3 engine: ARP, routing, TTL handling, ICMP generation,
//! firewalling, ARP-miss buffering. Implements §4.2 exactly, step by step.

use std::net::Ipv4Addr;

use crate::addr;
use crate::ids::DeviceId;
use crate::model::arp::ArpEntryKind;
use crate::model::device::{Device, DeviceKind};
use crate::model::firewall::{self, Protocol as FwProtocol};
use crate::model::packet::{
    ArpOp, IcmpCode, IcmpType, IcmpUnreachablePayload, Packet, PacketKind, Payload, Stage,
};
use crate::model::route::RouteTable;
use crate::model::world::World;

use super::tcp as tcp_engine;

/// Entry point: process one `at-device` packet on a router, host, firewall,
/// cloud, or a switch handling management traffic. Returns the zero-or-more
/// output packets that replace `packet`.
pub fn process(world: &mut World, device_id: DeviceId, mut packet: Packet) -> Vec<Packet> {
    let is_locally_generated = {
        let device = match world.devices.get(&device_id) {
            Some(d) => d,
            None => return Vec::new(),
        };
        packet.is_locally_generated
            || (packet.last_device.is_none()
                && device.interface_by_mac(&packet.source_mac).is_some())
    };

    let my_interface_name = {
        let device = world.devices.get(&device_id).unwrap();
        device
            .interfaces
            .iter()
            .find(|i| i.mac.eq_ignore_ascii_case(&packet.dest_mac))
            .map(|i| i.name.clone())
    };

    // Step 2 — acceptance.
    if packet.kind != PacketKind::Arp
        && !addr::is_broadcast_mac(&packet.dest_mac)
        && !addr::is_placeholder_mac(&packet.dest_mac)
        && !is_locally_generated
        && my_interface_name.is_none()
    {
        log::trace!("l3: device {device_id} drops frame not addressed to it");
        return Vec::new();
    }

    // Step 3 — ARP handling.
    if packet.kind == PacketKind::Arp {
        return handle_arp(world, device_id, packet);
    }

    // Step 3b — DHCP never gets routed: the client broadcasts directly into
    // its own segment and whichever device carries a matching server config
    // answers, mirroring ARP's same-segment-only handling (§4.7).
    if packet.kind == PacketKind::Dhcp {
        return super::dhcp::handle_incoming(world, device_id, packet);
    }

    // Step 4 — passive learning.
    passive_learn(world, device_id, &packet);

    // Step 5 — firewall.
    if !is_locally_generated {
        if let Some(device) = world.devices.get(&device_id) {
            if device.kind == DeviceKind::Firewall {
                if !evaluate_firewall(device, &packet) {
                    log::warn!("l3: firewall {device_id} dropped packet (deny)");
                    return Vec::new();
                }
            }
        }
    }

    // Step 6 — for-me check.
    if let Some(for_me) = try_deliver_locally(world, device_id, &mut packet) {
        return for_me;
    }

    // Step 7 — route lookup.
    let dest_ip = packet.dest_ip;
    let (egress_if, next_hop) = match dest_ip.and_then(|ip| route_lookup(world, device_id, ip)) {
        Some(r) => r,
        None => return vec![unreachable_reply(world, device_id, &packet, IcmpCode::NetworkUnreachable)]
            .into_iter()
            .flatten()
            .collect(),
    };

    // Step 8 — TTL.
    if !is_locally_generated {
        if packet.ttl <= 1 {
            log::debug!("l3: device {device_id} TTL expired, emitting time-exceeded");
            return time_exceeded_reply(world, device_id, &packet)
                .into_iter()
                .collect();
        }
        packet.ttl -= 1;
    }

    // Step 9/10 — ARP resolve or miss.
    resolve_and_forward(world, device_id, packet, &egress_if, next_hop)
}

fn passive_learn(world: &mut World, device_id: DeviceId, packet: &Packet) {
    if packet.kind == PacketKind::Arp {
        return;
    }
    let Some(source_ip) = packet.source_ip else { return };
    let Some(ingress) = packet.ingress_interface.clone() else { return };
    let Some(device) = world.devices.get_mut(&device_id) else { return };
    let Some(iface) = device.interface(&ingress).cloned() else { return };
    if let Some((network, mask)) = iface.network() {
        if addr::in_subnet(source_ip, network, mask) {
            device.arp.upsert(source_ip, packet.source_mac.clone(), ingress, ArpEntryKind::Dynamic);
        }
    }
}

fn handle_arp(world: &mut World, device_id: DeviceId, packet: Packet) -> Vec<Packet> {
    let Payload::Arp {
        op,
        sender_ip,
        sender_mac,
        target_ip,
        ..
    } = packet.payload.clone()
    else {
        return Vec::new();
    };

    let Some(ingress) = packet.ingress_interface.clone() else {
        return Vec::new();
    };

    if let Some(device) = world.devices.get_mut(&device_id) {
        device.arp.upsert(sender_ip, sender_mac.clone(), ingress.clone(), ArpEntryKind::Dynamic);
    }

    if op != ArpOp::Request {
        return Vec::new();
    }

    let matching_iface = world
        .devices
        .get(&device_id)
        .and_then(|d| d.interfaces.iter().find(|i| i.ip == Some(target_ip)).cloned());

    let Some(iface) = matching_iface else {
        return Vec::new();
    };

    let Some(connection) = world.connection_for(device_id, &iface.name).cloned() else {
        return Vec::new();
    };
    let Some((peer_device, _)) = connection.peer_of(device_id) else {
        return Vec::new();
    };

    let mut reply = Packet::new(world.next_packet_id(), PacketKind::Arp, device_id);
    reply.source_mac = iface.mac.clone();
    reply.dest_mac = sender_mac.clone();
    reply.source_ip = Some(target_ip);
    reply.dest_ip = Some(sender_ip);
    reply.payload = Payload::Arp {
        op: ArpOp::Reply,
        sender_ip: target_ip,
        sender_mac: iface.mac.clone(),
        target_ip: sender_ip,
        target_mac: sender_mac,
    };
    reply.egress_interface = Some(iface.name.clone());
    reply.target_device = Some(peer_device);

    vec![reply]
}

fn evaluate_firewall(device: &Device, packet: &Packet) -> bool {
    let proto = match packet.kind {
        PacketKind::Tcp => FwProtocol::Tcp,
        PacketKind::Udp => FwProtocol::Udp,
        PacketKind::Icmp => FwProtocol::Icmp,
        _ => FwProtocol::Any,
    };
    let (Some(src), Some(dst)) = (packet.source_ip, packet.dest_ip) else {
        return true;
    };
    let (src_port, dst_port) = match &packet.payload {
        Payload::Tcp { src_port, dst_port, .. } => (Some(*src_port), Some(*dst_port)),
        _ => (None, None),
    };
    matches!(
        firewall::evaluate(&device.firewall.rules, proto, src, src_port, dst, dst_port),
        firewall::Action::Allow
    )
}

/// Returns `Some(outputs)` if the packet was for this device (delivered
/// locally), `None` if it must be routed onward.
fn try_deliver_locally(world: &mut World, device_id: DeviceId, packet: &mut Packet) -> Option<Vec<Packet>> {
    let dest_ip = packet.dest_ip?;
    let is_for_me = world
        .devices
        .get(&device_id)?
        .interfaces
        .iter()
        .any(|i| i.ip == Some(dest_ip));
    if !is_for_me {
        return None;
    }

    match packet.kind {
        PacketKind::Tcp => Some(tcp_engine::handle_incoming(world, device_id, packet.clone())),
        PacketKind::Icmp => {
            if let Payload::Icmp { icmp_type, seq, .. } = packet.payload {
                match icmp_type {
                    IcmpType::EchoRequest => Some(vec![echo_reply(world, device_id, packet, seq)]),
                    IcmpType::EchoReply => {
                        packet.stage = Stage::Arrived;
                        Some(vec![packet.clone()])
                    }
                    _ => Some(Vec::new()),
                }
            } else {
                Some(Vec::new())
            }
        }
        _ => Some(Vec::new()),
    }
}

fn echo_reply(world: &mut World, device_id: DeviceId, original: &Packet, seq: u32) -> Packet {
    let mut reply = Packet::new(world.next_packet_id(), PacketKind::Icmp, device_id);
    reply.source_mac = original.dest_mac.clone();
    reply.dest_mac = original.source_mac.clone();
    reply.source_ip = original.dest_ip;
    reply.dest_ip = original.source_ip;
    reply.ttl = 64;
    reply.payload = Payload::Icmp {
        icmp_type: IcmpType::EchoReply,
        code: IcmpCode::Na,
        seq,
        unreachable: None,
    };
    reply.is_locally_generated = true;
    reply.stage = Stage::AtDevice;
    reply
}

/// §4.2 step 7: choose egress interface and next-hop IP.
fn route_lookup(world: &World, device_id: DeviceId, dest_ip: Ipv4Addr) -> Option<(String, Ipv4Addr)> {
    let device = world.devices.get(&device_id)?;

    for iface in &device.interfaces {
        if let Some((network, mask)) = iface.network() {
            if addr::in_subnet(dest_ip, network, mask) {
                return Some((iface.name.clone(), dest_ip));
            }
        }
    }

    if let Some(route_table) = routing_table_of(device) {
        if let Some(route) = route_table.lookup(dest_ip) {
            let next_hop = if route.is_directly_connected() { dest_ip } else { route.gateway };
            return Some((route.interface.clone(), next_hop));
        }
    }

    for iface in &device.interfaces {
        if let Some(gateway) = iface.gateway {
            return Some((iface.name.clone(), gateway));
        }
    }

    None
}

/// Exposes the egress-interface half of `route_lookup` to the scheduler's
/// ARP-retry path, which only needs to know where to re-flood a request.
pub(crate) fn route_egress_interface(world: &World, device_id: DeviceId, dest_ip: Ipv4Addr) -> Option<String> {
    route_lookup(world, device_id, dest_ip).map(|(iface, _)| iface)
}

fn routing_table_of(device: &Device) -> Option<&RouteTable> {
    match device.kind {
        DeviceKind::Router => Some(&device.router.routes),
        DeviceKind::Firewall => Some(&device.firewall.routes),
        _ => None,
    }
}

fn unreachable_reply(world: &mut World, device_id: DeviceId, packet: &Packet, code: IcmpCode) -> Option<Packet> {
    icmp_error_to_sender(world, device_id, packet, IcmpType::DestinationUnreachable, code)
}

fn time_exceeded_reply(world: &mut World, device_id: DeviceId, packet: &Packet) -> Option<Packet> {
    icmp_error_to_sender(world, device_id, packet, IcmpType::TimeExceeded, IcmpCode::Na)
}

fn icmp_error_to_sender(
    world: &mut World,
    device_id: DeviceId,
    packet: &Packet,
    icmp_type: IcmpType,
    code: IcmpCode,
) -> Option<Packet> {
    let source_ip = packet.source_ip?;
    let ingress = packet.ingress_interface.clone()?;
    let device = world.devices.get(&device_id)?;
    let iface = device.interface(&ingress)?.clone();
    let iface_ip = iface.ip?;

    let dest_mac = device
        .arp
        .get(&source_ip)
        .map(|e| e.mac.clone())
        .unwrap_or_else(|| packet.source_mac.clone());

    let mut reply = Packet::new(world.next_packet_id(), PacketKind::Icmp, device_id);
    reply.source_mac = iface.mac.clone();
    reply.dest_mac = dest_mac;
    reply.source_ip = Some(iface_ip);
    reply.dest_ip = Some(source_ip);
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
    reply.is_locally_generated = true;
    reply.stage = Stage::AtDevice;
    Some(reply)
}

fn resolve_and_forward(
    world: &mut World,
    device_id: DeviceId,
    mut packet: Packet,
    egress_if: &str,
    next_hop: Ipv4Addr,
) -> Vec<Packet> {
    let device = match world.devices.get(&device_id) {
        Some(d) => d,
        None => return Vec::new(),
    };
    let iface = match device.interface(egress_if) {
        Some(i) => i.clone(),
        None => return Vec::new(),
    };

    if let Some(arp_entry) = device.arp.get(&next_hop).cloned() {
        packet.source_mac = iface.mac.clone();
        packet.dest_mac = arp_entry.mac;
        packet.egress_interface = Some(iface.name.clone());
        packet.is_locally_generated = false;

        let Some(connection) = world.connection_for(device_id, &iface.name).cloned() else {
            return Vec::new();
        };
        let Some((peer, _)) = connection.peer_of(device_id) else {
            return Vec::new();
        };
        packet.target_device = Some(peer);
        return vec![packet];
    }

    // Step 10 — ARP miss: emit request + buffer original.
    let Some(connection) = world.connection_for(device_id, &iface.name).cloned() else {
        return Vec::new();
    };
    let Some((peer, _)) = connection.peer_of(device_id) else {
        return Vec::new();
    };

    let mut request = Packet::new(world.next_packet_id(), PacketKind::Arp, device_id);
    request.source_mac = iface.mac.clone();
    request.dest_mac = addr::BROADCAST_MAC.to_string();
    request.payload = Payload::Arp {
        op: ArpOp::Request,
        sender_ip: iface.ip.unwrap_or(Ipv4Addr::UNSPECIFIED),
        sender_mac: iface.mac.clone(),
        target_ip: next_hop,
        target_mac: addr::BROADCAST_MAC.to_string(),
    };
    request.egress_interface = Some(iface.name.clone());
    request.target_device = Some(peer);

    // Once queued for the wire it's no longer this device's own traffic:
    // a buffered packet resolved by `scheduler::retry_buffered` is forwarded
    // as-is, with no second pass through this function to flip the flag.
    packet.is_locally_generated = false;
    packet.waiting_for_arp = Some(next_hop);
    packet.stage = Stage::Buffered;

    vec![request, packet]
}
