//! C3 — link-tick processor: advances one `on-link` packet.

use rand::Rng;

use crate::config::SimConfig;
use crate::model::connection::Connection;
use crate::model::packet::{Packet, Stage};

/// Advances `packet` by one tick across `connection` at simulation `speed`.
///
/// Per §4.1: progress increases by `2 * speed` percent per tick, modulated
/// by the connection's bandwidth/latency, and may drop the packet
/// stochastically (disabled in deterministic mode, per SPEC_FULL's
/// resolution of the Open Question on link-loss semantics).
pub fn tick(packet: &mut Packet, connection: &Connection, speed: f64, config: &SimConfig, rng: &mut impl Rng) {
    if !config.deterministic && connection.packet_loss > 0.0 {
        if rng.gen_bool(connection.packet_loss.clamp(0.0, 1.0)) {
            packet.stage = Stage::Dropped;
            return;
        }
    }

    let base_rate = 2.0 * speed;
    let latency_divisor = if config.deterministic {
        1.0
    } else {
        (connection.latency_ms as f64 / 10.0).max(1.0)
    };
    let rate = (base_rate / latency_divisor).max(1.0);

    let progress = match packet.stage {
        Stage::OnLink { progress } => progress,
        _ => return,
    };

    let new_progress = progress + rate.round() as u32;

    if new_progress >= 100 {
        let target = packet.target_device.expect("on-link packet must have a target device");
        packet.last_device = Some(packet.current_device);
        packet.current_device = target;
        packet.target_device = None;
        packet.stage = Stage::AtDevice;
        packet.ingress_interface = connection.interface_of(target).map(String::from);
        packet.egress_interface = None;
        packet.path.push(target);
    } else {
        packet.stage = Stage::OnLink { progress: new_progress };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{DeviceId, PacketId};
    use crate::model::packet::PacketKind;

    fn packet() -> Packet {
        let mut p = Packet::new(PacketId(0), PacketKind::Icmp, DeviceId(0));
        p.target_device = Some(DeviceId(1));
        p.stage = Stage::OnLink { progress: 0 };
        p
    }

    fn conn() -> Connection {
        Connection::new(DeviceId(0), "eth0", 1000, DeviceId(1), "eth0", 1000)
    }

    #[test]
    fn advances_progress_deterministically() {
        let mut p = packet();
        let c = conn();
        let config = SimConfig::default();
        let mut rng = rand::thread_rng();
        tick(&mut p, &c, 1.0, &config, &mut rng);
        assert_eq!(p.stage, Stage::OnLink { progress: 2 });
    }

    #[test]
    fn arrives_and_flips_device() {
        let mut p = packet();
        p.stage = Stage::OnLink { progress: 99 };
        let c = conn();
        let config = SimConfig::default();
        let mut rng = rand::thread_rng();
        tick(&mut p, &c, 1.0, &config, &mut rng);
        assert_eq!(p.stage, Stage::AtDevice);
        assert_eq!(p.current_device, DeviceId(1));
        assert_eq!(p.last_device, Some(DeviceId(0)));
        assert!(p.target_device.is_none());
    }
}
