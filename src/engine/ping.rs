//! `ping` orchestrator (§5, §7): a cooperative task that injects Echo
//! Requests and polls across ticks for the matching reply, never blocking
//! the scheduler's synchronous `tick` call. Mirrors the source's pattern
//! of an external loop driving packet injection/observation rather than
//! the engine itself awaiting anything mid-tick.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::ids::DeviceId;
use crate::model::packet::{IcmpCode, IcmpType, Packet, PacketKind, Payload, Stage};
use crate::model::world::World;

/// Transmitted/received counts and round-trip times, in ticks rather than
/// wall-clock time since the engine itself is tick-counted (§7: "`ping`
/// summarizes transmitted/received counts, loss percentage, and min/avg/max
/// RTT").
#[derive(Debug, Clone, Default)]
pub struct PingStats {
    pub transmitted: u32,
    pub received: u32,
    pub rtts_ticks: Vec<u64>,
}

impl PingStats {
    pub fn loss_percent(&self) -> f64 {
        if self.transmitted == 0 {
            return 0.0;
        }
        100.0 * (1.0 - self.received as f64 / self.transmitted as f64)
    }

    pub fn min_rtt(&self) -> Option<u64> {
        self.rtts_ticks.iter().min().copied()
    }

    pub fn max_rtt(&self) -> Option<u64> {
        self.rtts_ticks.iter().max().copied()
    }

    pub fn avg_rtt(&self) -> Option<f64> {
        if self.rtts_ticks.is_empty() {
            return None;
        }
        Some(self.rtts_ticks.iter().sum::<u64>() as f64 / self.rtts_ticks.len() as f64)
    }

    pub fn summary(&self, dest: Ipv4Addr) -> String {
        let loss = self.loss_percent();
        match (self.min_rtt(), self.avg_rtt(), self.max_rtt()) {
            (Some(min), Some(avg), Some(max)) => format!(
                "ping {dest}: {} transmitted, {} received, {loss:.0}% loss, rtt min/avg/max = {min}/{avg:.1}/{max} ticks",
                self.transmitted, self.received
            ),
            _ => format!(
                "ping {dest}: {} transmitted, {} received, {loss:.0}% loss",
                self.transmitted, self.received
            ),
        }
    }
}

/// One outstanding ICMP echo exchange, keyed by sequence number.
struct Outstanding {
    seq: u32,
    sent_at_tick: u64,
}

pub struct PingSession {
    source: DeviceId,
    source_ip: Ipv4Addr,
    dest_ip: Ipv4Addr,
    count: u32,
    timeout_ticks: u64,
    next_seq: u32,
    stats: PingStats,
}

impl PingSession {
    pub fn new(source: DeviceId, source_ip: Ipv4Addr, dest_ip: Ipv4Addr, count: u32, timeout_ticks: u64) -> Self {
        Self {
            source,
            source_ip,
            dest_ip,
            count,
            timeout_ticks,
            next_seq: 0,
            stats: PingStats::default(),
        }
    }

    /// Injects one Echo Request, returning the outstanding exchange to poll for.
    fn send(&mut self, world: &mut World) -> Outstanding {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.stats.transmitted += 1;

        let mut packet = Packet::new(world.next_packet_id(), PacketKind::Icmp, self.source);
        packet.source_ip = Some(self.source_ip);
        packet.dest_ip = Some(self.dest_ip);
        packet.dest_mac = crate::addr::PLACEHOLDER_MAC.to_string();
        packet.is_locally_generated = true;
        packet.stage = Stage::AtDevice;
        packet.payload = Payload::Icmp { icmp_type: IcmpType::EchoRequest, code: IcmpCode::Na, seq, unreachable: None };
        world.inject(packet);

        Outstanding { seq, sent_at_tick: world.tick_count }
    }

    /// Scans `world.packets` for the reply (or a Destination-Unreachable)
    /// matching `outstanding`, consuming it if found. Returns `Some(true)`
    /// on a successful reply, `Some(false)` on an explicit failure
    /// (unreachable or timeout), `None` while still waiting.
    fn poll(&mut self, world: &mut World, outstanding: &Outstanding) -> Option<bool> {
        let mut found = None;
        world.packets.retain(|p| {
            if found.is_some() {
                return true;
            }
            let matches_reply = p.current_device == self.source
                && p.stage == Stage::Arrived
                && matches!(
                    &p.payload,
                    Payload::Icmp { icmp_type: IcmpType::EchoReply, seq, .. } if *seq == outstanding.seq
                );
            let matches_unreachable = p.current_device == self.source
                && matches!(&p.payload, Payload::Icmp { icmp_type: IcmpType::DestinationUnreachable, .. })
                && p.dest_ip == Some(self.source_ip);

            if matches_reply {
                found = Some(true);
                false
            } else if matches_unreachable {
                found = Some(false);
                false
            } else {
                true
            }
        });

        if let Some(success) = found {
            if success {
                self.stats.received += 1;
                self.stats.rtts_ticks.push(world.tick_count.saturating_sub(outstanding.sent_at_tick));
            }
            return Some(success);
        }

        if world.tick_count.saturating_sub(outstanding.sent_at_tick) >= self.timeout_ticks {
            return Some(false);
        }
        None
    }

    /// Runs the full `count`-echo exchange against a shared, tick-driven
    /// `World`, polling once per `poll_interval` without ever locking the
    /// world for longer than a single send/poll. The caller's own loop
    /// (or another task) is assumed to be calling `World::tick` — this
    /// session never ticks the simulation itself (§5: orchestration must
    /// not block the scheduler).
    pub async fn run(mut self, world: Arc<Mutex<World>>, poll_interval: Duration) -> PingStats {
        for _ in 0..self.count {
            let outstanding = {
                let mut w = world.lock().await;
                self.send(&mut w)
            };

            loop {
                tokio::time::sleep(poll_interval).await;
                let mut w = world.lock().await;
                if self.poll(&mut w, &outstanding).is_some() {
                    break;
                }
            }
        }
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_reports_full_loss_with_no_replies() {
        let stats = PingStats { transmitted: 4, received: 0, rtts_ticks: vec![] };
        assert_eq!(stats.loss_percent(), 100.0);
        assert!(stats.summary(Ipv4Addr::new(10, 0, 0, 1)).contains("100% loss"));
    }

    #[test]
    fn summary_reports_rtt_stats() {
        let stats = PingStats { transmitted: 3, received: 3, rtts_ticks: vec![2, 4, 6] };
        assert_eq!(stats.min_rtt(), Some(2));
        assert_eq!(stats.max_rtt(), Some(6));
        assert_eq!(stats.avg_rtt(), Some(4.0));
    }
}
