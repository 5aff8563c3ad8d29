//! C9 — DHCP engine (§4.7): server-side pool allocation plus the
//! discover → offer → request → ack exchange. Discover/Request arrive as
//! ordinary broadcast packets that L3 diverts here instead of routing;
//! this engine never crosses a router hop, matching the single
//! broadcast-domain DHCP model the data model assumes.

use std::net::Ipv4Addr;

use crate::errors::{SimError, SimResult};
use crate::ids::DeviceId;
use crate::model::packet::{DhcpMessageType, Packet, PacketKind, Payload, Stage};
use crate::model::world::World;

const BROADCAST_IP: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 255);

pub fn handle_incoming(world: &mut World, device_id: DeviceId, packet: Packet) -> Vec<Packet> {
    let Payload::Dhcp { message_type, client_mac, offered_ip } = packet.payload.clone() else {
        return Vec::new();
    };

    match message_type {
        DhcpMessageType::Discover => respond(world, device_id, &client_mac, DhcpMessageType::Offer),
        DhcpMessageType::Request => {
            let _ = offered_ip;
            respond(world, device_id, &client_mac, DhcpMessageType::Ack)
        }
        DhcpMessageType::Offer | DhcpMessageType::Ack => Vec::new(),
    }
}

/// Allocates (or reuses) a lease for `client_mac` from the first enabled
/// server config on `device_id` with a free address, and emits the
/// matching Offer/Ack broadcast.
fn respond(world: &mut World, device_id: DeviceId, client_mac: &str, reply_kind: DhcpMessageType) -> Vec<Packet> {
    let now = chrono::Utc::now();

    let allocation = {
        let Some(dev) = world.devices.get_mut(&device_id) else { return Vec::new() };
        let mut found = None;
        for server in dev.dhcp_servers_mut() {
            if !server.enabled {
                continue;
            }
            if let Some(ip) = server.allocate(client_mac, "", now) {
                found = Some((ip, server.interface.clone()));
                break;
            }
        }
        found
    };
    let Some((ip, iface_name)) = allocation else {
        log::debug!("dhcp: device {device_id} has no free lease for {client_mac}");
        return Vec::new();
    };

    let Some(dev) = world.devices.get(&device_id) else { return Vec::new() };
    let Some(iface) = dev.interface(&iface_name).cloned() else { return Vec::new() };

    let mut reply = Packet::new(world.next_packet_id(), PacketKind::Dhcp, device_id);
    reply.source_mac = iface.mac;
    reply.dest_mac = crate::addr::BROADCAST_MAC.to_string();
    reply.source_ip = iface.ip;
    reply.dest_ip = Some(BROADCAST_IP);
    reply.egress_interface = Some(iface_name);
    reply.is_locally_generated = true;
    reply.payload = Payload::Dhcp {
        message_type: reply_kind,
        client_mac: client_mac.to_string(),
        offered_ip: Some(ip),
    };
    vec![reply]
}

/// Releases the lease held by `client_mac` on every DHCP server config on
/// `device_id` (§EXTERNAL INTERFACES `releaseDhcp`).
pub fn release(world: &mut World, device_id: DeviceId, client_mac: &str) -> SimResult<()> {
    let dev = world.device_mut(device_id)?;
    for server in dev.dhcp_servers_mut() {
        server.release(client_mac);
    }
    Ok(())
}

/// Releases the lease a client holds via a given interface and clears that
/// interface's DHCP-assigned configuration (§6 `releaseDhcp`).
pub fn release_interface(world: &mut World, device_id: DeviceId, interface_name: &str) -> SimResult<()> {
    let dev = world.device_mut(device_id)?;
    let iface = dev
        .interface_mut(interface_name)
        .ok_or_else(|| SimError::InterfaceNotFound { device: device_id, interface: interface_name.to_string() })?;
    if !iface.dhcp_client {
        return Ok(());
    }
    let mac = iface.mac.clone();
    iface.clear_dhcp();
    dev.rebuild_connected_routes();
    for server in dev.dhcp_servers_mut() {
        server.release(&mac);
    }
    Ok(())
}

/// `requestDhcp` (§4.7, §6): finds a reachable server via `find_dhcp_server`,
/// emits a Discover broadcast purely for visualization, then directly
/// allocates and installs the lease on `interface_name` — the source
/// models a single synchronous grant rather than a full wire handshake for
/// the client path, per §4.7's "directly installs the chosen lease". The
/// embedder is expected to await this inside the cooperative task shape
/// described in §5 (it never blocks the scheduler itself: it mutates
/// `World` once and returns).
pub fn request(world: &mut World, device_id: DeviceId, interface_name: &str) -> SimResult<String> {
    let dev = world.device(device_id)?;
    let iface = dev
        .interface(interface_name)
        .ok_or_else(|| SimError::InterfaceNotFound { device: device_id, interface: interface_name.to_string() })?;
    let client_mac = iface.mac.clone();
    let hostname = dev.hostname.clone();

    let mut discover = Packet::new(world.next_packet_id(), PacketKind::Dhcp, device_id);
    discover.source_mac = client_mac.clone();
    discover.dest_mac = crate::addr::BROADCAST_MAC.to_string();
    discover.egress_interface = Some(interface_name.to_string());
    discover.is_locally_generated = true;
    discover.stage = Stage::Arrived;
    discover.payload = Payload::Dhcp { message_type: DhcpMessageType::Discover, client_mac: client_mac.clone(), offered_ip: None };
    world.inject(discover);

    let Some(server_id) = find_dhcp_server(world, device_id, interface_name) else {
        return Ok(format!("DHCP request on {interface_name} failed: no DHCP server reachable"));
    };

    let now = chrono::Utc::now();
    let allocation = {
        let Some(server) = world.devices.get_mut(&server_id) else {
            return Ok(format!("DHCP request on {interface_name} failed: server device vanished"));
        };
        let mut found = None;
        for cfg in server.dhcp_servers_mut() {
            if !cfg.enabled {
                continue;
            }
            if let Some(ip) = cfg.allocate(&client_mac, &hostname, now) {
                found = Some((ip, cfg.mask, cfg.gateway, cfg.dns.clone(), cfg.lease_time_secs));
                break;
            }
        }
        found
    };
    let Some((ip, mask, gateway, dns, lease_secs)) = allocation else {
        return Ok(format!("DHCP request on {interface_name} failed: address pool exhausted"));
    };

    let dev = world.device_mut(device_id)?;
    let iface = dev.interface_mut(interface_name).unwrap();
    iface.ip = Some(ip);
    iface.mask = Some(mask);
    iface.gateway = Some(gateway);
    iface.dhcp_client = true;
    iface.dns_servers = dns.clone();
    iface.dhcp_lease_expiry = Some(now + chrono::Duration::seconds(lease_secs as i64));
    dev.rebuild_connected_routes();

    let dns_list = dns.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
    Ok(format!(
        "DHCP request on {interface_name} succeeded\n  IP: {ip}\n  Mask: {mask}\n  Gateway: {gateway}\n  DNS: {dns_list}\n  Lease: {lease_secs}s\n  Server: device {server_id}"
    ))
}

/// Breadth-first search over the L2 (switch/hub) fabric reachable from
/// `start`'s `start_interface`, stopping at the first device carrying an
/// enabled DHCP server, and never crossing a router/firewall hop (§4.7
/// supplemental `findDhcpServer`: DHCP discovery never traverses L3).
pub fn find_dhcp_server(world: &World, start: DeviceId, start_interface: &str) -> Option<DeviceId> {
    use std::collections::{HashSet, VecDeque};

    let start_dev = world.devices.get(&start)?;
    let start_conn_id = start_dev.interface(start_interface)?.connection?;

    let mut visited: HashSet<DeviceId> = HashSet::new();
    visited.insert(start);
    let mut queue: VecDeque<DeviceId> = VecDeque::new();

    let conn = world.connections.get(&start_conn_id)?;
    let (first, _) = conn.peer_of(start)?;
    queue.push_back(first);

    while let Some(current) = queue.pop_front() {
        if !visited.insert(current) {
            continue;
        }
        let Some(dev) = world.devices.get(&current) else { continue };
        if dev.dhcp_servers().any(|s| s.enabled) {
            return Some(current);
        }
        if !dev.kind.is_l2_forwarder() {
            continue;
        }
        for iface in &dev.interfaces {
            let Some(cid) = iface.connection else { continue };
            let Some(conn) = world.connections.get(&cid) else { continue };
            if let Some((peer, _)) = conn.peer_of(current) {
                if !visited.contains(&peer) {
                    queue.push_back(peer);
                }
            }
        }
    }
    None
}
