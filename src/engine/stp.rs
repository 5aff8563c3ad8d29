//! C7 — STP engine: global convergence (§4.5).
//!
//! Unlike the other engines, convergence isn't triggered by a single
//! packet — it's a topology-wide fixed point recomputed whenever the
//! scheduler decides the topology may have changed (a connect/disconnect,
//! or periodically). `converge` runs entirely over `World`'s connection
//! graph and never touches the packet list; `emit_bpdus` is the part that
//! does produce on-the-wire packets, for anyone inspecting traffic.

use std::collections::HashMap;

use crate::ids::DeviceId;
use crate::model::device::DeviceKind;
use crate::model::packet::{BpduPayload, Packet, PacketKind, Payload, Stage};
use crate::model::stp::{default_path_cost, BridgeId, PortRole, PortState, StpPort};
use crate::model::world::World;

fn bridge_id_of(world: &World, device: DeviceId) -> Option<BridgeId> {
    let dev = world.devices.get(&device)?;
    let first_mac = dev.interfaces.first()?.mac.as_str();
    Some(BridgeId::new(dev.switch.stp.priority, first_mac))
}

struct Candidate {
    root: BridgeId,
    cost: u32,
    /// The local port this switch would use to reach `root`.
    via_port: Option<String>,
    /// The bridge ID of the neighbor that advertised this candidate.
    via_neighbor: Option<BridgeId>,
}

/// Recomputes root bridge, root ports, and designated/blocking ports for
/// every STP-enabled switch reachable from `world`'s connection graph.
/// Bounded to `3 * switch_count` relaxation rounds, per §4.5 — a correctly
/// formed topology converges well inside that bound; a topology that
/// doesn't is left in its last-computed (safe, all-blocking-until-settled)
/// state rather than looping forever.
pub fn converge(world: &mut World) {
    let switches: Vec<DeviceId> = world
        .devices
        .values()
        .filter(|d| d.kind == DeviceKind::Switch && d.switch.stp.enabled)
        .map(|d| d.id)
        .collect();

    if switches.is_empty() {
        return;
    }

    let mut state: HashMap<DeviceId, Candidate> = switches
        .iter()
        .filter_map(|&id| {
            bridge_id_of(world, id).map(|bid| {
                (
                    id,
                    Candidate { root: bid, cost: 0, via_port: None, via_neighbor: None },
                )
            })
        })
        .collect();

    let bound = 3 * switches.len();
    for _ in 0..bound {
        let mut changed = false;
        for &id in &switches {
            let Some(dev) = world.devices.get(&id) else { continue };
            let my_root = state.get(&id).map(|c| c.root);
            for iface in &dev.interfaces {
                let Some(conn) = iface.connection.and_then(|cid| world.connections.get(&cid)) else { continue };
                let Some((peer, _)) = conn.peer_of(id) else { continue };
                if !switches.contains(&peer) {
                    continue;
                }
                let Some(peer_state) = state.get(&peer) else { continue };
                let link_cost = default_path_cost(conn.bandwidth_mbps);
                let candidate_cost = peer_state.cost + link_cost;
                let candidate_root = peer_state.root;

                let better = match (my_root, state.get(&id)) {
                    (Some(root), Some(cur)) => {
                        (candidate_root, candidate_cost) < (root, cur.cost)
                            || (candidate_root == root && candidate_cost < cur.cost)
                    }
                    _ => true,
                };

                if better {
                    state.insert(
                        id,
                        Candidate {
                            root: candidate_root,
                            cost: candidate_cost,
                            via_port: Some(iface.name.clone()),
                            via_neighbor: Some(peer_state.root),
                        },
                    );
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }

    assign_roles(world, &switches, &state);
}

fn assign_roles(world: &mut World, switches: &[DeviceId], state: &HashMap<DeviceId, Candidate>) {
    // For every switch-to-switch link, whichever endpoint has the better
    // (lower) (root, cost, bridge-id) wins designated; the other blocks
    // unless that port is its root port.
    for &id in switches {
        let Some(candidate) = state.get(&id) else { continue };
        let my_bridge = bridge_id_of(world, id);
        let Some(dev) = world.devices.get_mut(&id) else { continue };

        dev.switch.stp.root_bridge_id = Some(candidate.root);
        dev.switch.stp.root_path_cost = candidate.cost;
        dev.switch.stp.root_port = candidate.via_port.clone();

        let is_root_bridge = my_bridge == Some(candidate.root);
        let interfaces: Vec<(String, u32)> = dev
            .interfaces
            .iter()
            .map(|i| (i.name.clone(), i.speed_mbps))
            .collect();

        for (name, speed) in interfaces {
            let role = if is_root_bridge {
                PortRole::Designated
            } else if Some(&name) == candidate.via_port.as_ref() {
                PortRole::Root
            } else {
                PortRole::Designated
            };

            let port = dev
                .switch
                .stp
                .ports
                .entry(name.clone())
                .or_insert_with(|| StpPort::new(0, default_path_cost(speed)));
            port.path_cost = default_path_cost(speed);
            port.role = role;
            port.state = match role {
                PortRole::Root | PortRole::Designated => PortState::Forwarding,
                PortRole::Alternate | PortRole::Backup | PortRole::Disabled => PortState::Blocking,
            };
        }
    }

    // Second pass: on each switch-to-switch link, demote the losing side's
    // port (the one with the worse root/cost/bridge tuple) to Alternate
    // unless it is that switch's root port.
    for &id in switches {
        let Some(dev) = world.devices.get(&id) else { continue };
        let my_key = state.get(&id).map(|c| (c.root, c.cost));
        let root_port = state.get(&id).and_then(|c| c.via_port.clone());
        let mut demotions = Vec::new();
        for iface in &dev.interfaces {
            if Some(&iface.name) == root_port.as_ref() {
                continue;
            }
            let Some(conn) = iface.connection.and_then(|cid| world.connections.get(&cid)) else { continue };
            let Some((peer, _)) = conn.peer_of(id) else { continue };
            if !switches.contains(&peer) {
                continue;
            }
            let peer_key = state.get(&peer).map(|c| (c.root, c.cost));
            let peer_bridge = bridge_id_of(world, peer);
            let my_bridge = bridge_id_of(world, id);
            if let (Some(mine), Some(theirs)) = (my_key, peer_key) {
                let i_lose = theirs < mine || (theirs == mine && peer_bridge < my_bridge);
                if i_lose {
                    demotions.push(iface.name.clone());
                }
            }
        }
        if demotions.is_empty() {
            continue;
        }
        let Some(dev) = world.devices.get_mut(&id) else { continue };
        for name in demotions {
            if let Some(port) = dev.switch.stp.ports.get_mut(&name) {
                port.role = PortRole::Alternate;
                port.state = PortState::Blocking;
            }
        }
    }
}

/// Emits one BPDU per forwarding/listening switch port, advertising the
/// switch's current root/cost view. Purely observational — `converge`
/// does not consume these, matching the design note that STP state is
/// computed directly over the topology graph rather than by flooding.
pub fn emit_bpdus(world: &mut World) -> Vec<Packet> {
    let mut outputs = Vec::new();
    let switches: Vec<DeviceId> = world
        .devices
        .values()
        .filter(|d| d.kind == DeviceKind::Switch && d.switch.stp.enabled)
        .map(|d| d.id)
        .collect();

    for id in switches {
        let Some(dev) = world.devices.get(&id) else { continue };
        let Some(my_bridge) = bridge_id_of(world, id) else { continue };
        let root = dev.switch.stp.root_bridge_id.unwrap_or(my_bridge);
        let cost = dev.switch.stp.root_path_cost;
        let max_age = dev.switch.stp.max_age;
        let hello_time = dev.switch.stp.hello_time;
        let forward_delay = dev.switch.stp.forward_delay;

        let ports: Vec<(String, String, Option<crate::ids::DeviceId>)> = dev
            .interfaces
            .iter()
            .filter(|i| {
                dev.switch
                    .stp
                    .ports
                    .get(&i.name)
                    .map(|p| p.state.forwards_data())
                    .unwrap_or(false)
            })
            .map(|i| {
                let target = i
                    .connection
                    .and_then(|cid| world.connections.get(&cid))
                    .and_then(|c| c.peer_of(id))
                    .map(|(peer, _)| peer);
                (i.name.clone(), i.mac.clone(), target)
            })
            .collect();

        for (port_name, port_mac, target) in ports {
            let Some(target) = target else { continue };
            let mut bpdu = Packet::new(world.next_packet_id(), PacketKind::Stp, id);
            bpdu.source_mac = port_mac;
            bpdu.dest_mac = crate::addr::STP_MULTICAST_MAC.to_string();
            bpdu.egress_interface = Some(port_name);
            bpdu.target_device = Some(target);
            // Purely observational: BPDUs are exposed for one tick for an
            // inspector to read, never scheduled onto the link or consumed
            // by a peer's L2 engine — convergence already recomputed the
            // whole topology directly above.
            bpdu.stage = Stage::Arrived;
            bpdu.payload = Payload::Bpdu(BpduPayload {
                root_bridge_id: root.to_string_repr(),
                root_path_cost: cost,
                sender_bridge_id: my_bridge.to_string_repr(),
                sender_port_id: "0".to_string(),
                message_age: 0,
                max_age,
                hello_time,
                forward_delay,
                topology_change: false,
            });
            outputs.push(bpdu);
        }
    }
    outputs
}
