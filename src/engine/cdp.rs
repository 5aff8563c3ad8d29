//! Supplemental neighbor-discovery engine (§SPEC_FULL ambient feature,
//! not in the distilled [MODULE] list but present throughout the original
//! implementation): periodic CDP-style announcements and the table they
//! populate on the receiving device.
//!
//! Like `stp::emit_bpdus`, announcements are observational snapshots, not
//! packets the scheduler routes hop-by-hop — `handle_incoming` updates the
//! *sending* side's own neighbor table directly rather than waiting for a
//! simulated round trip, since a real CDP neighbor is learned the instant
//! the frame lands on the wire.

use crate::ids::DeviceId;
use crate::model::packet::{Packet, PacketKind, Payload, Stage};
use crate::model::world::World;

/// Emits one neighbor announcement out every connected interface of every
/// running device and immediately records it on the peer's `CdpTable` —
/// the simulated equivalent of the peer having received and parsed it.
pub fn announce(world: &mut World) -> Vec<Packet> {
    let mut outputs = Vec::new();
    let device_ids: Vec<DeviceId> = world.devices.keys().copied().collect();

    for id in device_ids {
        let Some(device) = world.devices.get(&id) else { continue };
        if !device.running {
            continue;
        }
        let hostname = device.hostname.clone();
        let kind = format!("{:?}", device.kind);
        let links: Vec<(String, String, DeviceId, String)> = device
            .interfaces
            .iter()
            .filter_map(|i| {
                let cid = i.connection?;
                let conn = world.connections.get(&cid)?;
                let (peer, peer_if) = conn.peer_of(id)?;
                Some((i.name.clone(), i.mac.clone(), peer, peer_if.to_string()))
            })
            .collect();

        for (local_if, local_mac, peer, peer_if) in links {
            let mut frame = Packet::new(world.next_packet_id(), PacketKind::Cdp, id);
            frame.source_mac = local_mac;
            frame.dest_mac = crate::addr::CDP_MULTICAST_MAC.to_string();
            frame.egress_interface = Some(local_if.clone());
            frame.target_device = Some(peer);
            frame.is_locally_generated = true;
            frame.stage = Stage::Arrived;
            frame.payload = Payload::Cdp {
                hostname: hostname.clone(),
                device_kind: kind.clone(),
                local_interface: local_if,
            };

            if let Some(peer_dev) = world.devices.get_mut(&peer) {
                peer_dev.cdp.neighbors.insert(peer_if, (frame_hostname(&frame), frame_kind(&frame)));
            }
            outputs.push(frame);
        }
    }
    outputs
}

fn frame_hostname(frame: &Packet) -> String {
    match &frame.payload {
        Payload::Cdp { hostname, .. } => hostname.clone(),
        _ => String::new(),
    }
}

fn frame_kind(frame: &Packet) -> String {
    match &frame.payload {
        Payload::Cdp { device_kind, .. } => device_kind.clone(),
        _ => String::new(),
    }
}
