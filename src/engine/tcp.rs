//! C8 — TCP state engine: the LISTEN..TIME_WAIT transition table (§4.6).
//!
//! Connection state lives in `Device::tcp`, keyed by the local port plus the
//! remote `(ip, port)` that completed the handshake; a bare listener is a
//! `TcpState::Listen` row with `remote_port == 0`. `handle_incoming` is the
//! table itself: one match arm per `(state, flags)` combination this engine
//! recognizes, returning the reply segment(s) to hand back to L3 for
//! routing.

use std::net::Ipv4Addr;

use crate::errors::{SimError, SimResult};
use crate::ids::DeviceId;
use crate::model::packet::{Packet, PacketKind, Payload, TcpFlag, TcpFlags};
use crate::model::tcp::{TcpConnection, TcpState, TcpTable};
use crate::model::world::World;

const WILDCARD_REMOTE: (Ipv4Addr, u16) = (Ipv4Addr::UNSPECIFIED, 0);

fn initial_seq(table: &TcpTable, deterministic: bool) -> u32 {
    if deterministic {
        // Counter-based ISN so two identically sequenced runs agree,
        // per the deterministic-mode resolution in SPEC_FULL.md.
        1000 + table.all().len() as u32 * 1000
    } else {
        rand::random()
    }
}

/// Opens a passive listener on `port`. Idempotent: re-listening on a port
/// already in `Listen` is a no-op.
pub fn listen(world: &mut World, device: DeviceId, port: u16) -> SimResult<()> {
    let dev = world.device_mut(device)?;
    if dev.tcp.find_listener(port).is_some() {
        return Ok(());
    }
    dev.tcp.insert(TcpConnection {
        local_ip: Ipv4Addr::UNSPECIFIED,
        local_port: port,
        remote_ip: WILDCARD_REMOTE.0,
        remote_port: WILDCARD_REMOTE.1,
        state: TcpState::Listen,
        seq: 0,
        ack: 0,
    });
    Ok(())
}

/// Active open: emits the initial SYN and parks the connection in `SynSent`.
pub fn connect(
    world: &mut World,
    device: DeviceId,
    local_ip: Ipv4Addr,
    local_port: u16,
    remote_ip: Ipv4Addr,
    remote_port: u16,
) -> SimResult<Vec<Packet>> {
    let deterministic = world.config.deterministic;
    let dev = world.device_mut(device)?;
    let iface = dev
        .interfaces
        .iter()
        .find(|i| i.ip == Some(local_ip))
        .ok_or(SimError::DhcpServerNeedsInterfaceIp)?
        .clone();

    let seq = initial_seq(&dev.tcp, deterministic);
    dev.tcp.insert(TcpConnection {
        local_ip,
        local_port,
        remote_ip,
        remote_port,
        state: TcpState::SynSent,
        seq,
        ack: 0,
    });

    let packet = segment(world, device, &iface.mac, local_ip, local_port, remote_ip, remote_port, seq, 0, &[TcpFlag::Syn]);
    Ok(vec![packet])
}

/// Initiates (or continues) a teardown for an established connection.
pub fn close(world: &mut World, device: DeviceId, local_port: u16, remote_ip: Ipv4Addr, remote_port: u16) -> SimResult<Vec<Packet>> {
    let dev = world.device_mut(device)?;
    let idx = dev
        .tcp
        .find(local_port, remote_ip, remote_port)
        .ok_or(SimError::NoListener(local_port))?;

    let (local_ip, seq, ack, local_mac) = {
        let conn = dev.tcp.get_mut(idx).unwrap();
        conn.state = match conn.state {
            TcpState::Established => TcpState::FinWait1,
            TcpState::CloseWait => TcpState::LastAck,
            other => other,
        };
        let mac = dev
            .interfaces
            .iter()
            .find(|i| i.ip == Some(conn.local_ip))
            .map(|i| i.mac.clone())
            .unwrap_or_default();
        (conn.local_ip, conn.seq, conn.ack, mac)
    };

    let packet = segment(world, device, &local_mac, local_ip, local_port, remote_ip, remote_port, seq, ack, &[TcpFlag::Fin, TcpFlag::Ack]);
    Ok(vec![packet])
}

/// Sends `payload_len` bytes of data over an established connection,
/// advancing the local sequence number by that amount (§6 `sendTcpPacket`).
/// No payload is actually carried — only its length, per the data-model's
/// "no payload delivery" non-goal.
pub fn send_tcp_packet(
    world: &mut World,
    device: DeviceId,
    local_port: u16,
    remote_ip: Ipv4Addr,
    remote_port: u16,
    payload_len: u32,
) -> SimResult<Vec<Packet>> {
    let (local_mac, local_ip, seq, ack) = {
        let dev = world.device_mut(device)?;
        let idx = dev
            .tcp
            .find(local_port, remote_ip, remote_port)
            .ok_or(SimError::NoListener(local_port))?;

        let conn = dev.tcp.get(idx).unwrap().clone();
        if conn.state != TcpState::Established {
            return Err(SimError::TcpNotEstablished { local_port, remote_port });
        }

        let local_mac = dev
            .interfaces
            .iter()
            .find(|i| i.ip == Some(conn.local_ip))
            .map(|i| i.mac.clone())
            .unwrap_or_default();
        let seq = conn.seq;
        dev.tcp.get_mut(idx).unwrap().seq = seq.wrapping_add(payload_len);
        (local_mac, conn.local_ip, seq, conn.ack)
    };

    let mut packet = segment(world, device, &local_mac, local_ip, local_port, remote_ip, remote_port, seq, ack, &[TcpFlag::Psh, TcpFlag::Ack]);
    if let Payload::Tcp { payload_len: len, .. } = &mut packet.payload {
        *len = payload_len;
    }
    Ok(vec![packet])
}

/// Handles one inbound segment addressed to this device, applying the state
/// transition table and returning any reply segment(s).
pub fn handle_incoming(world: &mut World, device: DeviceId, packet: Packet) -> Vec<Packet> {
    let Payload::Tcp { src_port, dst_port, flags, seq: remote_seq, ack: remote_ack, payload_len } = packet.payload.clone() else {
        return Vec::new();
    };
    let Some(remote_ip) = packet.source_ip else { return Vec::new() };
    let Some(local_ip) = packet.dest_ip else { return Vec::new() };
    let local_port = dst_port;
    let deterministic = world.config.deterministic;

    // Scope the device borrow so it's released before `segment()` needs
    // `&mut World` again to mint a packet id.
    enum Outcome {
        Reply(String, u32, u32, Vec<TcpFlag>),
        Silent,
    }

    let outcome = {
        let Some(dev) = world.devices.get_mut(&device) else { return Vec::new() };
        let local_mac = dev
            .interfaces
            .iter()
            .find(|i| i.ip == Some(local_ip))
            .map(|i| i.mac.clone())
            .unwrap_or_default();

        if let Some(idx) = dev.tcp.find(local_port, remote_ip, src_port) {
            let conn = dev.tcp.get(idx).unwrap().clone();
            let (next_state, reply_flags, new_seq, new_ack, drop_connection) =
                transition(conn.state, &flags, conn.seq, conn.ack, remote_seq, remote_ack, payload_len);

            if let Some(c) = dev.tcp.get_mut(idx) {
                c.state = next_state;
                c.seq = new_seq;
                c.ack = new_ack;
            }
            if drop_connection {
                dev.tcp.remove(idx);
            }

            match reply_flags {
                Some(f) => Outcome::Reply(local_mac, new_seq, new_ack, f),
                None => Outcome::Silent,
            }
        } else if flags.syn && !flags.ack && dev.tcp.find_listener(local_port).is_some() {
            let seq = initial_seq(&dev.tcp, deterministic);
            let ack = remote_seq.wrapping_add(1);
            dev.tcp.insert(TcpConnection {
                local_ip,
                local_port,
                remote_ip,
                remote_port: src_port,
                state: TcpState::SynRecv,
                seq,
                ack,
            });
            Outcome::Reply(local_mac, seq, ack, vec![TcpFlag::Syn, TcpFlag::Ack])
        } else {
            log::trace!("tcp: device {device} got a segment for no known connection or listener on port {local_port}, sending RST");
            Outcome::Reply(local_mac, 0, remote_seq.wrapping_add(1), vec![TcpFlag::Rst, TcpFlag::Ack])
        }
    };

    match outcome {
        Outcome::Reply(local_mac, seq, ack, flags) => {
            vec![segment(world, device, &local_mac, local_ip, local_port, remote_ip, src_port, seq, ack, &flags)]
        }
        Outcome::Silent => Vec::new(),
    }
}

/// The transition table itself: given the current state and inbound flags,
/// returns `(next_state, reply_flags, new_seq, new_ack, remove_connection)`.
fn transition(
    state: TcpState,
    flags: &TcpFlags,
    seq: u32,
    ack: u32,
    remote_seq: u32,
    remote_ack: u32,
    payload_len: u32,
) -> (TcpState, Option<Vec<TcpFlag>>, u32, u32, bool) {
    match state {
        TcpState::SynSent if flags.syn && flags.ack => {
            let new_ack = remote_seq.wrapping_add(1);
            (TcpState::Established, Some(vec![TcpFlag::Ack]), seq.wrapping_add(1), new_ack, false)
        }
        TcpState::SynSent if flags.syn => {
            let new_ack = remote_seq.wrapping_add(1);
            (TcpState::SynRecv, Some(vec![TcpFlag::Syn, TcpFlag::Ack]), seq, new_ack, false)
        }
        TcpState::SynRecv if flags.ack => (TcpState::Established, None, seq, ack, false),
        TcpState::Established if flags.fin => {
            let new_ack = remote_seq.wrapping_add(1);
            (TcpState::CloseWait, Some(vec![TcpFlag::Ack]), seq, new_ack, false)
        }
        TcpState::Established if flags.psh && payload_len > 0 => {
            let new_ack = remote_seq.wrapping_add(payload_len);
            (TcpState::Established, Some(vec![TcpFlag::Ack]), seq, new_ack, false)
        }
        TcpState::Established if flags.ack => (TcpState::Established, None, seq, ack, false),
        TcpState::FinWait1 if flags.fin && flags.ack => {
            let new_ack = remote_seq.wrapping_add(1);
            (TcpState::TimeWait, Some(vec![TcpFlag::Ack]), seq, new_ack, true)
        }
        TcpState::FinWait1 if flags.fin => {
            let new_ack = remote_seq.wrapping_add(1);
            (TcpState::Closing, Some(vec![TcpFlag::Ack]), seq, new_ack, false)
        }
        TcpState::FinWait1 if flags.ack && remote_ack == seq.wrapping_add(1) => {
            (TcpState::FinWait2, None, seq.wrapping_add(1), ack, false)
        }
        TcpState::FinWait2 if flags.fin => {
            let new_ack = remote_seq.wrapping_add(1);
            (TcpState::TimeWait, Some(vec![TcpFlag::Ack]), seq, new_ack, true)
        }
        TcpState::Closing if flags.ack => (TcpState::TimeWait, None, seq, ack, true),
        TcpState::LastAck if flags.ack => (TcpState::TimeWait, None, seq, ack, true),
        _ => (state, None, seq, ack, false),
    }
}

#[allow(clippy::too_many_arguments)]
fn segment(
    world: &mut World,
    device: DeviceId,
    local_mac: &str,
    local_ip: Ipv4Addr,
    local_port: u16,
    remote_ip: Ipv4Addr,
    remote_port: u16,
    seq: u32,
    ack: u32,
    flags: &[TcpFlag],
) -> Packet {
    let mut packet = Packet::new(world.next_packet_id(), PacketKind::Tcp, device);
    packet.source_mac = local_mac.to_string();
    packet.source_ip = Some(local_ip);
    packet.dest_ip = Some(remote_ip);
    packet.is_locally_generated = true;
    packet.payload = Payload::Tcp {
        src_port: local_port,
        dst_port: remote_port,
        flags: TcpFlags::with(flags),
        seq,
        ack,
        payload_len: 0,
    };
    packet
}
