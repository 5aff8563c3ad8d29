//! Firewall rules (§3 Firewall rule, §4.2 step 5).

use std::net::Ipv4Addr;

use crate::addr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Any,
    Tcp,
    Udp,
    Icmp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
    Any,
}

#[derive(Debug, Clone)]
pub struct FirewallRule {
    pub id: u32,
    pub name: String,
    pub action: Action,
    pub protocol: Protocol,
    pub source_ip: String,
    pub source_port: String,
    pub dest_ip: String,
    pub dest_port: String,
    pub direction: Direction,
    pub enabled: bool,
}

fn ip_pattern_matches(pattern: &str, ip: Ipv4Addr) -> bool {
    if pattern == "any" || pattern == "*" {
        return true;
    }
    if pattern.contains('/') {
        return addr::ip_in_cidr(ip, pattern);
    }
    addr::parse_ip(pattern).map(|p| p == ip).unwrap_or(false)
}

fn port_pattern_matches(pattern: &str, port: Option<u16>) -> bool {
    if pattern.is_empty() || pattern == "*" || pattern == "any" {
        return true;
    }
    let Some(port) = port else { return false };
    if let Some((lo, hi)) = pattern.split_once('-') {
        let (lo, hi) = match (lo.trim().parse::<u16>(), hi.trim().parse::<u16>()) {
            (Ok(lo), Ok(hi)) => (lo, hi),
            _ => return false,
        };
        (lo..=hi).contains(&port)
    } else {
        pattern.trim().parse::<u16>().map(|p| p == port).unwrap_or(false)
    }
}

fn protocol_matches(rule_proto: Protocol, packet_proto: Protocol) -> bool {
    matches!(rule_proto, Protocol::Any) || rule_proto == packet_proto
}

impl FirewallRule {
    /// Evaluates this single rule against a packet's 5-tuple.
    pub fn matches(
        &self,
        protocol: Protocol,
        source_ip: Ipv4Addr,
        source_port: Option<u16>,
        dest_ip: Ipv4Addr,
        dest_port: Option<u16>,
    ) -> bool {
        self.enabled
            && protocol_matches(self.protocol, protocol)
            && ip_pattern_matches(&self.source_ip, source_ip)
            && port_pattern_matches(&self.source_port, source_port)
            && ip_pattern_matches(&self.dest_ip, dest_ip)
            && port_pattern_matches(&self.dest_port, dest_port)
    }
}

/// Evaluates an ordered rule list; first match decides. Implicit deny if
/// nothing matches, per §4.2 step 5.
pub fn evaluate(
    rules: &[FirewallRule],
    protocol: Protocol,
    source_ip: Ipv4Addr,
    source_port: Option<u16>,
    dest_ip: Ipv4Addr,
    dest_port: Option<u16>,
) -> Action {
    for rule in rules {
        if rule.matches(protocol, source_ip, source_port, dest_ip, dest_port) {
            return rule.action;
        }
    }
    Action::Deny
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: u32, action: Action, proto: Protocol, enabled: bool) -> FirewallRule {
        FirewallRule {
            id,
            name: format!("r{id}"),
            action,
            protocol: proto,
            source_ip: "any".into(),
            source_port: "*".into(),
            dest_ip: "any".into(),
            dest_port: "*".into(),
            direction: Direction::Any,
            enabled,
        }
    }

    #[test]
    fn first_match_wins_and_implicit_deny() {
        let rules = vec![rule(1, Action::Deny, Protocol::Tcp, true), rule(2, Action::Allow, Protocol::Icmp, true)];
        let ip = Ipv4Addr::new(10, 0, 0, 1);
        assert_eq!(evaluate(&rules, Protocol::Tcp, ip, Some(1234), ip, Some(80)), Action::Deny);
        assert_eq!(evaluate(&rules, Protocol::Udp, ip, None, ip, None), Action::Deny);

        let rules = vec![rule(2, Action::Allow, Protocol::Icmp, true)];
        assert_eq!(evaluate(&rules, Protocol::Icmp, ip, None, ip, None), Action::Allow);

        let rules = vec![rule(1, Action::Deny, Protocol::Tcp, false), rule(2, Action::Allow, Protocol::Icmp, true)];
        assert_eq!(evaluate(&rules, Protocol::Icmp, ip, None, ip, None), Action::Allow);
    }

    #[test]
    fn port_range_pattern() {
        assert!(port_pattern_matches("80-90", Some(85)));
        assert!(!port_pattern_matches("80-90", Some(95)));
        assert!(port_pattern_matches("*", None));
    }
}
