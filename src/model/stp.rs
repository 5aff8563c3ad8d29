//! STP configuration and bridge identity (§3 STP config, §4.5).

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BridgeId {
    pub priority: u16,
    pub mac: [u8; 6],
}

impl BridgeId {
    pub fn new(priority: u16, mac_str: &str) -> Self {
        Self {
            priority,
            mac: parse_mac(mac_str),
        }
    }

    pub fn to_string_repr(&self) -> String {
        format!(
            "{:04x}.{}",
            self.priority,
            fmt_mac_lower(self.mac)
        )
    }
}

fn parse_mac(s: &str) -> [u8; 6] {
    let mut out = [0u8; 6];
    for (i, octet) in s.split(':').enumerate().take(6) {
        out[i] = u8::from_str_radix(octet, 16).unwrap_or(0);
    }
    out
}

fn fmt_mac_lower(mac: [u8; 6]) -> String {
    mac.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// Snaps `priority` to the nearest-below multiple of 4096, clamped to
/// 0..=61440, per §6/§8 boundary behavior (33000 -> 32768, 62000 -> 61440).
pub fn snap_bridge_priority(priority: i64) -> u16 {
    let clamped = priority.clamp(0, 61440);
    let snapped = (clamped / 4096) * 4096;
    snapped as u16
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    Blocking,
    Listening,
    Learning,
    Forwarding,
    Disabled,
}

impl PortState {
    pub fn forwards_data(self) -> bool {
        matches!(self, PortState::Forwarding)
    }

    pub fn learns(self) -> bool {
        matches!(self, PortState::Learning | PortState::Forwarding)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortRole {
    Root,
    Designated,
    Alternate,
    Backup,
    Disabled,
}

#[derive(Debug, Clone)]
pub struct StpPort {
    pub state: PortState,
    pub role: PortRole,
    pub path_cost: u32,
    pub port_priority: u8,
    pub port_id: u16,
    pub designated_root: Option<BridgeId>,
    pub designated_cost: u32,
    pub designated_bridge: Option<BridgeId>,
    pub designated_port: u16,
}

impl StpPort {
    pub fn new(port_id: u16, path_cost: u32) -> Self {
        Self {
            state: PortState::Blocking,
            role: PortRole::Disabled,
            path_cost,
            port_priority: 128,
            port_id,
            designated_root: None,
            designated_cost: 0,
            designated_bridge: None,
            designated_port: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StpConfig {
    pub enabled: bool,
    pub priority: u16,
    pub root_bridge_id: Option<BridgeId>,
    pub root_path_cost: u32,
    pub root_port: Option<String>,
    pub max_age: u32,
    pub hello_time: u32,
    pub forward_delay: u32,
    pub ports: HashMap<String, StpPort>,
}

impl Default for StpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            priority: 32768,
            root_bridge_id: None,
            root_path_cost: 0,
            root_port: None,
            max_age: 20,
            hello_time: 2,
            forward_delay: 15,
            ports: HashMap::new(),
        }
    }
}

/// Default STP port path cost by link speed (Mbps), per §4.5.
pub fn default_path_cost(speed_mbps: u32) -> u32 {
    if speed_mbps >= 10_000 {
        2
    } else if speed_mbps >= 1_000 {
        4
    } else if speed_mbps >= 100 {
        19
    } else if speed_mbps >= 10 {
        100
    } else {
        200
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_snapping() {
        assert_eq!(snap_bridge_priority(33000), 32768);
        assert_eq!(snap_bridge_priority(62000), 61440);
        assert_eq!(snap_bridge_priority(-10), 0);
    }

    #[test]
    fn bridge_id_orders_by_priority_then_mac() {
        let a = BridgeId::new(4096, "aa:aa:aa:aa:aa:aa");
        let b = BridgeId::new(32768, "00:00:00:00:00:00");
        assert!(a < b);
        let c = BridgeId::new(4096, "bb:bb:bb:bb:bb:bb");
        assert!(a < c);
    }

    #[test]
    fn path_cost_table() {
        assert_eq!(default_path_cost(10_000), 2);
        assert_eq!(default_path_cost(1_000), 4);
        assert_eq!(default_path_cost(100), 19);
        assert_eq!(default_path_cost(10), 100);
        assert_eq!(default_path_cost(1), 200);
    }
}
